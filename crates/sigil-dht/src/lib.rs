//! sigil-dht
//!
//! The overlay-facing layer of the keyserver: the [`Overlay`] interface the
//! rest of the system consumes, the TTL/ValueType regime, the chunked
//! storage layer for values larger than a single DHT slot, the in-process
//! overlay used by tests and single-process deployments, and the DHT node
//! identity (post-quantum keypair + self-signed certificate).
//!
//! Kademlia routing, UDP transport, and peer discovery live behind the
//! [`Overlay`] trait and are out of scope here.

pub mod chunk;
pub mod memory;
pub mod node_id;
pub mod overlay;
pub mod value_type;

pub use memory::MemoryOverlay;
pub use node_id::NodeIdentity;
pub use overlay::Overlay;
pub use value_type::{register_standard_value_types, ValueClass};
