//! Stale-while-revalidate identity cache.
//!
//! A bounded-purpose sled store keyed by fingerprint. Reads return any
//! cached entry immediately together with its age; callers older than the
//! freshness window enqueue a background refresh through the dispatcher
//! and subscribers hear about every refreshed entry.

use std::path::Path;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use sigil_core::error::SigilError;
use sigil_core::record::IdentityRecord;
use sigil_core::types::{unix_now, Fingerprint};

#[derive(Serialize, Deserialize)]
struct CacheEntry {
    json: String,
    cached_at: u64,
}

/// Process-global identity cache. Cheap to share behind an `Arc`.
pub struct IdentityCache {
    _db: sled::Db,
    entries: sled::Tree,
    subscribers: Mutex<Vec<Sender<Fingerprint>>>,
}

impl IdentityCache {
    /// Open or create the cache database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SigilError> {
        let db = sled::open(path).map_err(|e| SigilError::Storage(e.to_string()))?;
        let entries = db
            .open_tree("identities")
            .map_err(|e| SigilError::Storage(e.to_string()))?;
        Ok(Self {
            _db: db,
            entries,
            subscribers: Mutex::new(Vec::new()),
        })
    }

    /// Fetch a cached record and its age in seconds.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<(IdentityRecord, u64)> {
        let bytes = self.entries.get(fingerprint.as_bytes()).ok()??;
        let entry: CacheEntry = bincode::deserialize(&bytes).ok()?;
        let record = IdentityRecord::from_json(&entry.json).ok()?;
        let age = unix_now().saturating_sub(entry.cached_at);
        Some((record, age))
    }

    /// Insert or replace the entry for `fingerprint` and notify
    /// subscribers. The per-key write lock is sled's own; nothing else is
    /// held across the insert.
    pub fn insert(&self, fingerprint: &Fingerprint, record: &IdentityRecord) -> Result<(), SigilError> {
        let entry = CacheEntry {
            json: record.to_json()?,
            cached_at: unix_now(),
        };
        let bytes =
            bincode::serialize(&entry).map_err(|e| SigilError::Serialization(e.to_string()))?;
        self.entries
            .insert(fingerprint.as_bytes(), bytes)
            .map_err(|e| SigilError::Storage(e.to_string()))?;

        let mut subs = self.subscribers.lock().expect("cache lock poisoned");
        subs.retain(|tx| tx.send(*fingerprint).is_ok());
        Ok(())
    }

    /// Subscribe to cache-updated events. The receiver yields the
    /// fingerprint of every entry refreshed after this call.
    pub fn subscribe(&self) -> Receiver<Fingerprint> {
        let (tx, rx) = std::sync::mpsc::channel();
        self.subscribers
            .lock()
            .expect("cache lock poisoned")
            .push(tx);
        rx
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
