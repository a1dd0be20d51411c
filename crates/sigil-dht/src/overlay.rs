//! The consumed DHT overlay interface.
//!
//! Every operation is blocking-per-call: the overlay client serializes its
//! own I/O internally, and callers treat each call as a suspension point.
//! Background execution, bounded concurrency, and cancellation live one
//! layer up in the keyserver's dispatch module; the C-style
//! `get_async(key, callback)` form is subsumed there.
//!
//! Implementations must enforce the read deadlines
//! ([`sigil_core::constants::DHT_GET_DEADLINE_SECS`] for plain reads) and
//! map a timeout to absence, not an error: in a DHT, transient
//! unreachability is indistinguishable from a missing value.

use sigil_core::error::SigilError;

use crate::value_type::ValueClass;

pub trait Overlay: Send + Sync {
    /// Store `value` under `key` with the given TTL class.
    fn put(&self, key: &[u8], value: &[u8], class: ValueClass) -> Result<(), SigilError>;

    /// Overlay-signed write. `value_id` ties the value to this node's
    /// overlay signer: a later put with the same id replaces the earlier
    /// value instead of accumulating beside it.
    fn put_signed(
        &self,
        key: &[u8],
        value: &[u8],
        value_id: u64,
        class: ValueClass,
    ) -> Result<(), SigilError>;

    /// Overlay-signed write that never expires.
    fn put_signed_permanent(&self, key: &[u8], value: &[u8], value_id: u64)
        -> Result<(), SigilError>;

    /// Fetch one live value, or `None` if the key is absent (or the read
    /// deadline elapsed).
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, SigilError>;

    /// Fetch every live value stored under `key`. The overlay is
    /// append-only at the value-set level, so readers must expect several
    /// values and run their own newest-valid selection.
    fn get_all(&self, key: &[u8]) -> Result<Vec<Vec<u8>>, SigilError>;

    /// Register a custom value class and its expiry. Must run on every
    /// publisher and every receiving node at startup: values of an
    /// unregistered class fall back to the overlay's ~10 minute default
    /// and evaporate.
    fn register_value_type(&self, class_id: u16, name: &str, expiry_secs: u64)
        -> Result<(), SigilError>;

    /// True once the routing table holds at least one good node.
    fn is_ready(&self) -> bool;
}

/// The fixed overlay `value_id` used for every identity and alias write,
/// so one signer occupies exactly one slot per key.
pub const SINGLE_SLOT_VALUE_ID: u64 = 1;
