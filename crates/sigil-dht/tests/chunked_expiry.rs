//! Chunked values and the TTL regime together: a chunked record lives and
//! dies as one unit because the manifest and every chunk carry the same
//! class, and the alias class outlives the identity class.
//!
//! Run with:
//!   cargo test -p sigil-dht --test chunked_expiry

use sigil_core::constants::{
    ALIAS_TTL_SECS, IDENTITY_TTL_SECS, MAX_CHUNK_BYTES, UNREGISTERED_CLASS_TTL_SECS,
};
use sigil_core::error::SigilError;
use sigil_dht::chunk;
use sigil_dht::value_type::register_standard_value_types;
use sigil_dht::{MemoryOverlay, ValueClass};

fn blob(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 239) as u8).collect()
}

#[test]
fn chunked_value_expires_as_a_unit() {
    let overlay = MemoryOverlay::new();
    register_standard_value_types(&overlay).unwrap();

    let data = blob(MAX_CHUNK_BYTES * 3);
    chunk::publish(&overlay, "identity", &data, ValueClass::SevenDay).unwrap();
    assert_eq!(chunk::fetch(&overlay, "identity").unwrap(), data);

    // One second before the class expiry, everything is still there.
    overlay.advance_time(IDENTITY_TTL_SECS - 1);
    assert_eq!(chunk::fetch(&overlay, "identity").unwrap(), data);

    // Past expiry the manifest and chunks lapse together: clean absence,
    // never a partial reassembly.
    overlay.advance_time(2);
    assert!(matches!(
        chunk::fetch(&overlay, "identity"),
        Err(SigilError::NotFound)
    ));
    assert_eq!(chunk::fetch_all(&overlay, "identity").unwrap(), Vec::<Vec<u8>>::new());
}

#[test]
fn alias_outlives_identity_record() {
    let overlay = MemoryOverlay::new();
    register_standard_value_types(&overlay).unwrap();

    chunk::publish(&overlay, "alice:lookup", &[b'a'; 128], ValueClass::YearLong).unwrap();
    chunk::publish(&overlay, "fp:identity", &blob(512), ValueClass::SevenDay).unwrap();

    // A month later the identity has faded; the alias is still resolvable.
    overlay.advance_time(30 * 24 * 3600);
    assert!(matches!(
        chunk::fetch(&overlay, "fp:identity"),
        Err(SigilError::NotFound)
    ));
    assert_eq!(chunk::fetch(&overlay, "alice:lookup").unwrap(), vec![b'a'; 128]);

    // Past the ownership period the alias lapses too.
    overlay.advance_time(ALIAS_TTL_SECS);
    assert!(matches!(
        chunk::fetch(&overlay, "alice:lookup"),
        Err(SigilError::NotFound)
    ));
}

#[test]
fn unregistered_nodes_lose_chunked_values_within_the_default_window() {
    // A receiving node that never registered the class set: the published
    // identity evaporates within minutes regardless of its declared class.
    let overlay = MemoryOverlay::new();

    let data = blob(MAX_CHUNK_BYTES * 2);
    chunk::publish(&overlay, "identity", &data, ValueClass::SevenDay).unwrap();
    assert_eq!(chunk::fetch(&overlay, "identity").unwrap(), data);

    overlay.advance_time(UNREGISTERED_CLASS_TTL_SECS + 1);
    assert!(matches!(
        chunk::fetch(&overlay, "identity"),
        Err(SigilError::NotFound)
    ));
}

#[test]
fn republish_restarts_the_clock() {
    let overlay = MemoryOverlay::new();
    register_standard_value_types(&overlay).unwrap();

    let data = blob(2048);
    chunk::publish(&overlay, "identity", &data, ValueClass::SevenDay).unwrap();

    // Refresh just before expiry, repeatedly: the value never lapses.
    for _ in 0..3 {
        overlay.advance_time(IDENTITY_TTL_SECS - 10);
        chunk::publish(&overlay, "identity", &data, ValueClass::SevenDay).unwrap();
    }
    overlay.advance_time(IDENTITY_TTL_SECS - 10);
    assert_eq!(chunk::fetch(&overlay, "identity").unwrap(), data);

    // The refreshed writes replaced the old slot rather than piling up.
    assert_eq!(overlay.live_count(&chunk::direct_key("identity")), 1);
}
