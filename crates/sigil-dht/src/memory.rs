//! In-process overlay: the [`Overlay`] implementation behind tests and
//! single-process deployments. Honours the full TTL regime, including the
//! short default expiry for unregistered classes, and carries a virtual
//! clock so expiry behaviour is testable without waiting out real time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use sigil_core::constants::UNREGISTERED_CLASS_TTL_SECS;
use sigil_core::error::SigilError;
use sigil_core::types::{unix_now, Timestamp};

use crate::overlay::Overlay;
use crate::value_type::ValueClass;

struct StoredValue {
    data: Vec<u8>,
    /// Set for overlay-signed writes; later writes with the same id
    /// replace this value.
    value_id: Option<u64>,
    class_id: Option<u16>,
    stored_at: Timestamp,
    permanent: bool,
}

#[derive(Default)]
struct Inner {
    values: HashMap<Vec<u8>, Vec<StoredValue>>,
    /// Registered class expiries, id → seconds.
    classes: HashMap<u16, u64>,
}

/// A process-local value store with DHT expiry semantics.
pub struct MemoryOverlay {
    inner: Mutex<Inner>,
    /// Virtual seconds added to the wall clock (tests advance this).
    clock_offset: AtomicI64,
}

impl MemoryOverlay {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            clock_offset: AtomicI64::new(0),
        }
    }

    fn now(&self) -> Timestamp {
        let offset = self.clock_offset.load(Ordering::Relaxed);
        (unix_now() as i64 + offset).max(0) as u64
    }

    /// Advance the overlay's clock. Expiry is evaluated lazily on read, so
    /// this is enough to make stored values lapse in tests.
    pub fn advance_time(&self, secs: u64) {
        self.clock_offset.fetch_add(secs as i64, Ordering::Relaxed);
    }

    /// Drop every value stored under `key`. Test/tooling hook for
    /// simulating lost chunks and evicted replicas.
    pub fn drop_key(&self, key: &[u8]) {
        let mut inner = self.inner.lock().expect("overlay lock poisoned");
        inner.values.remove(key);
    }

    /// Number of live values under `key`.
    pub fn live_count(&self, key: &[u8]) -> usize {
        let now = self.now();
        let inner = self.inner.lock().expect("overlay lock poisoned");
        inner
            .values
            .get(key)
            .map(|vals| {
                vals.iter()
                    .filter(|v| Self::is_live(v, &inner.classes, now))
                    .count()
            })
            .unwrap_or(0)
    }

    fn is_live(value: &StoredValue, classes: &HashMap<u16, u64>, now: Timestamp) -> bool {
        if value.permanent {
            return true;
        }
        let expiry = value
            .class_id
            .and_then(|id| classes.get(&id).copied())
            .unwrap_or(UNREGISTERED_CLASS_TTL_SECS);
        now < value.stored_at.saturating_add(expiry)
    }

    fn store(&self, key: &[u8], value: StoredValue) {
        let mut inner = self.inner.lock().expect("overlay lock poisoned");
        let slot = inner.values.entry(key.to_vec()).or_default();
        if let Some(id) = value.value_id {
            slot.retain(|v| v.value_id != Some(id));
        }
        slot.push(value);
    }

    fn live_values(&self, key: &[u8]) -> Vec<Vec<u8>> {
        let now = self.now();
        let mut inner = self.inner.lock().expect("overlay lock poisoned");
        let Inner { values, classes } = &mut *inner;
        match values.get_mut(key) {
            Some(vals) => {
                vals.retain(|v| Self::is_live(v, classes, now));
                vals.iter().map(|v| v.data.clone()).collect()
            }
            None => Vec::new(),
        }
    }
}

impl Default for MemoryOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl Overlay for MemoryOverlay {
    fn put(&self, key: &[u8], value: &[u8], class: ValueClass) -> Result<(), SigilError> {
        self.store(
            key,
            StoredValue {
                data: value.to_vec(),
                value_id: None,
                class_id: Some(class.id()),
                stored_at: self.now(),
                permanent: false,
            },
        );
        Ok(())
    }

    fn put_signed(
        &self,
        key: &[u8],
        value: &[u8],
        value_id: u64,
        class: ValueClass,
    ) -> Result<(), SigilError> {
        self.store(
            key,
            StoredValue {
                data: value.to_vec(),
                value_id: Some(value_id),
                class_id: Some(class.id()),
                stored_at: self.now(),
                permanent: false,
            },
        );
        Ok(())
    }

    fn put_signed_permanent(
        &self,
        key: &[u8],
        value: &[u8],
        value_id: u64,
    ) -> Result<(), SigilError> {
        self.store(
            key,
            StoredValue {
                data: value.to_vec(),
                value_id: Some(value_id),
                class_id: None,
                stored_at: self.now(),
                permanent: true,
            },
        );
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, SigilError> {
        Ok(self.live_values(key).into_iter().last())
    }

    fn get_all(&self, key: &[u8]) -> Result<Vec<Vec<u8>>, SigilError> {
        Ok(self.live_values(key))
    }

    fn register_value_type(
        &self,
        class_id: u16,
        _name: &str,
        expiry_secs: u64,
    ) -> Result<(), SigilError> {
        let mut inner = self.inner.lock().expect("overlay lock poisoned");
        inner.classes.insert(class_id, expiry_secs);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        true
    }
}
