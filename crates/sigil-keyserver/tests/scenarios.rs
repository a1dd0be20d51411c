//! End-to-end scenarios for the keyserver core.
//!
//! Two "processes" are two `Context`s sharing one overlay, the way two
//! peers share one DHT. The chain is a `StaticVerifier` seeded with the
//! payments each scenario assumes.
//!
//! Run with:
//!   cargo test -p sigil-keyserver --test scenarios

use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use sigil_chain::StaticVerifier;
use sigil_core::constants::{MAX_CHUNK_BYTES, NAME_OWNERSHIP_SECS};
use sigil_core::error::SigilError;
use sigil_core::record::{IdentityRecord, ProfileData};
use sigil_core::types::unix_now;
use sigil_crypto::verify::sign_record;
use sigil_crypto::IdentityKeyPair;
use sigil_dht::chunk;
use sigil_dht::overlay::Overlay;
use sigil_dht::value_type::ValueClass;
use sigil_dht::MemoryOverlay;
use sigil_keyserver::{
    identity_base_key, reverse_lookup_async, Context, ContextConfig, KeyServer, NameRegistry,
    ProfileManager,
};

// ── Fixtures ─────────────────────────────────────────────────────────────────

fn context(overlay: &Arc<MemoryOverlay>) -> Arc<Context<MemoryOverlay>> {
    Context::init(Arc::clone(overlay), ContextConfig::default()).unwrap()
}

fn cached_context(
    overlay: &Arc<MemoryOverlay>,
    dir: &tempfile::TempDir,
    freshness_secs: u64,
) -> Arc<Context<MemoryOverlay>> {
    let config = ContextConfig {
        cache_path: Some(dir.path().join("identity_cache.db")),
        cache_freshness_secs: freshness_secs,
        ..ContextConfig::default()
    };
    Context::init(Arc::clone(overlay), config).unwrap()
}

fn publish_identity(server: &KeyServer<MemoryOverlay>, keys: &IdentityKeyPair) -> IdentityRecord {
    server
        .publish(
            &keys.fingerprint,
            &keys.mldsa_public,
            &keys.mlkem_public,
            keys.mldsa_secret_bytes(),
        )
        .unwrap()
}

// ── S1: publish then lookup from a second process ────────────────────────────

#[test]
fn s1_publish_then_lookup_round_trip() {
    let overlay = Arc::new(MemoryOverlay::new());
    let alice_ctx = context(&overlay);
    let reader_ctx = context(&overlay);

    let alice = IdentityKeyPair::generate();
    let published = publish_identity(&KeyServer::new(alice_ctx), &alice);

    let reader = KeyServer::new(reader_ctx);
    let found = reader.lookup(&alice.fingerprint.to_hex()).unwrap();
    assert!(!found.has_registered_name);
    assert_eq!(found.version, 1);
    // Byte-identical round trip.
    assert_eq!(found, published);
    assert_eq!(found.to_json().unwrap(), published.to_json().unwrap());
}

#[test]
fn publish_rejects_foreign_fingerprint() {
    let overlay = Arc::new(MemoryOverlay::new());
    let server = KeyServer::new(context(&overlay));
    let alice = IdentityKeyPair::generate();
    let mallory = IdentityKeyPair::generate();

    let result = server.publish(
        &mallory.fingerprint,
        &alice.mldsa_public,
        &alice.mlkem_public,
        alice.mldsa_secret_bytes(),
    );
    assert!(matches!(result, Err(SigilError::InvalidFingerprint(_))));
}

// ── S2: name registration and case-insensitive lookup ────────────────────────

#[test]
fn s2_registered_name_resolves_case_insensitively() {
    let overlay = Arc::new(MemoryOverlay::new());
    let ctx = context(&overlay);
    let alice = IdentityKeyPair::generate();
    publish_identity(&KeyServer::new(Arc::clone(&ctx)), &alice);

    let chain = Arc::new(StaticVerifier::new());
    chain.accept("0xdeadbeef", "backbone", "alice");
    let registry = NameRegistry::new(Arc::clone(&ctx), Arc::clone(&chain));
    let record = registry.register(&alice, "alice", "0xdeadbeef", "backbone").unwrap();
    assert!(record.has_registered_name);
    assert_eq!(record.name_version, 1);

    let reader = KeyServer::new(context(&overlay));
    for query in ["alice", "Alice", "ALICE", " Alice "] {
        let found = reader.lookup(query).unwrap();
        assert_eq!(found.fingerprint, alice.fingerprint, "query {query:?}");
        assert_eq!(found.registered_name, "alice");
    }
    assert!(matches!(reader.lookup("bob"), Err(SigilError::NotFound)));
}

#[test]
fn register_requires_verified_payment() {
    let overlay = Arc::new(MemoryOverlay::new());
    let ctx = context(&overlay);
    let alice = IdentityKeyPair::generate();
    publish_identity(&KeyServer::new(Arc::clone(&ctx)), &alice);

    let chain = Arc::new(StaticVerifier::new());
    let registry = NameRegistry::new(Arc::clone(&ctx), Arc::clone(&chain));

    // No payment on chain at all.
    assert!(matches!(
        registry.register(&alice, "alice", "0xnope", "backbone"),
        Err(SigilError::VerificationFailed(_))
    ));

    // Chain endpoint down: transient, caller may retry.
    chain.accept("0xdeadbeef", "backbone", "alice");
    chain.set_offline(true);
    assert!(matches!(
        registry.register(&alice, "alice", "0xdeadbeef", "backbone"),
        Err(SigilError::RpcError(_))
    ));

    chain.set_offline(false);
    assert!(registry.register(&alice, "alice", "0xdeadbeef", "backbone").is_ok());
}

#[test]
fn register_rejects_oversized_tx_fields() {
    let overlay = Arc::new(MemoryOverlay::new());
    let ctx = context(&overlay);
    let alice = IdentityKeyPair::generate();
    let chain = Arc::new(StaticVerifier::new());
    let registry = NameRegistry::new(ctx, chain);

    // Fixed canonical widths bound these fields; oversize input is
    // rejected before any chain or overlay traffic.
    let long_tx = "f".repeat(97);
    assert!(matches!(
        registry.register(&alice, "alice", &long_tx, "backbone"),
        Err(SigilError::InvalidInput(_))
    ));
    let long_network = "n".repeat(17);
    assert!(matches!(
        registry.register(&alice, "alice", "0xdead", &long_network),
        Err(SigilError::InvalidInput(_))
    ));
}

#[test]
fn register_rejects_bad_name_grammar() {
    let overlay = Arc::new(MemoryOverlay::new());
    let ctx = context(&overlay);
    let alice = IdentityKeyPair::generate();
    let chain = Arc::new(StaticVerifier::new());
    let registry = NameRegistry::new(ctx, chain);

    for bad in ["ab", "has space", "ünïcode", "way_too_long_for_a_name", "no!"] {
        assert!(
            matches!(
                registry.register(&alice, bad, "0x1", "backbone"),
                Err(SigilError::InvalidNameFormat(_))
            ),
            "name {bad:?}"
        );
    }
}

// ── S3 / property 4: collision vs renewal ────────────────────────────────────

#[test]
fn s3_second_registrant_gets_name_taken() {
    let overlay = Arc::new(MemoryOverlay::new());
    let ctx = context(&overlay);
    let alice = IdentityKeyPair::generate();
    let mallory = IdentityKeyPair::generate();
    publish_identity(&KeyServer::new(Arc::clone(&ctx)), &alice);
    publish_identity(&KeyServer::new(Arc::clone(&ctx)), &mallory);

    let chain = Arc::new(StaticVerifier::new());
    chain.accept("0xdeadbeef", "backbone", "alice");
    chain.accept("0xmallory", "backbone", "alice");
    let registry = NameRegistry::new(Arc::clone(&ctx), Arc::clone(&chain));

    registry.register(&alice, "alice", "0xdeadbeef", "backbone").unwrap();
    assert!(matches!(
        registry.register(&mallory, "alice", "0xmallory", "backbone"),
        Err(SigilError::NameTaken { .. })
    ));

    // Same fingerprint re-registering is permitted (renewal path).
    chain.accept("0xdeadbeef2", "backbone", "alice");
    assert!(registry.register(&alice, "alice", "0xdeadbeef2", "backbone").is_ok());
}

#[test]
fn renewal_extends_expiry_and_bumps_name_version() {
    let overlay = Arc::new(MemoryOverlay::new());
    let ctx = context(&overlay);
    let alice = IdentityKeyPair::generate();
    let chain = Arc::new(StaticVerifier::new());
    chain.accept("0xreg", "backbone", "alice");
    chain.accept("0xrenew", "backbone", "alice");
    let registry = NameRegistry::new(Arc::clone(&ctx), Arc::clone(&chain));

    let registered = registry.register(&alice, "alice", "0xreg", "backbone").unwrap();
    let renewed = registry.renew(&alice, "0xrenew").unwrap();

    assert_eq!(renewed.name_expires_at, registered.name_expires_at + NAME_OWNERSHIP_SECS);
    assert_eq!(renewed.name_version, 2);
    assert_eq!(renewed.registration_tx_hash, "0xrenew");
    assert!(renewed.version > registered.version);
}

#[test]
fn renew_without_a_name_is_rejected() {
    let overlay = Arc::new(MemoryOverlay::new());
    let ctx = context(&overlay);
    let alice = IdentityKeyPair::generate();
    publish_identity(&KeyServer::new(Arc::clone(&ctx)), &alice);

    let registry = NameRegistry::new(ctx, Arc::new(StaticVerifier::new()));
    assert!(matches!(
        registry.renew(&alice, "0xrenew"),
        Err(SigilError::InvalidInput(_))
    ));
}

// ── S4: profile update invalidates a cached v1 ───────────────────────────────

#[test]
fn s4_profile_update_reaches_a_caching_reader() {
    let overlay = Arc::new(MemoryOverlay::new());
    let alice_ctx = context(&overlay);
    let cache_dir = tempfile::tempdir().unwrap();
    // Zero freshness window: any cached entry older than zero seconds
    // triggers a background refresh.
    let bob_ctx = cached_context(&overlay, &cache_dir, 0);

    let alice = IdentityKeyPair::generate();
    let alice_profiles = ProfileManager::new(Arc::clone(&alice_ctx));
    publish_identity(&KeyServer::new(Arc::clone(&alice_ctx)), &alice);

    // Bob resolves and caches v1.
    let bob_profiles = ProfileManager::new(Arc::clone(&bob_ctx));
    let v1 = bob_profiles.load_identity(&alice.fingerprint, true).unwrap();
    assert_eq!(v1.version, 1);

    // Alice updates her bio; version advances.
    let v2 = alice_profiles
        .update_profile(
            &alice,
            ProfileData {
                bio: "hi".into(),
                ..ProfileData::default()
            },
        )
        .unwrap();
    assert_eq!(v2.version, 2);
    assert!(v2.timestamp > v1.timestamp);

    // Bob still sees the stale entry, but the read enqueues a refresh.
    let events = bob_ctx.cache().unwrap().subscribe();
    std::thread::sleep(Duration::from_millis(1100)); // let the entry age past the window
    let stale = bob_profiles.load_identity(&alice.fingerprint, true).unwrap();
    assert_eq!(stale.version, 1);

    // The refresh lands and fires the cache-updated event.
    let refreshed = events.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(refreshed, alice.fingerprint);
    let fresh = bob_profiles.load_identity(&alice.fingerprint, true).unwrap();
    assert_eq!(fresh.version, 2);
    assert_eq!(fresh.bio, "hi");

    bob_ctx.close();
}

// ── S5 / property 5: expired names are not served ────────────────────────────

#[test]
fn s5_expired_name_falls_back_to_short_fingerprint() {
    let overlay = Arc::new(MemoryOverlay::new());
    let ctx = context(&overlay);
    let alice = IdentityKeyPair::generate();

    // Craft an identity whose name lapsed a year ago and publish it the
    // way the registry would have, alias included.
    let now = unix_now();
    let mut record = IdentityRecord::new(
        alice.fingerprint,
        alice.mldsa_public.clone(),
        alice.mlkem_public.clone(),
        now,
    );
    record.has_registered_name = true;
    record.registered_name = "alice".into();
    record.name_registered_at = now - 2 * NAME_OWNERSHIP_SECS;
    record.name_expires_at = now - NAME_OWNERSHIP_SECS;
    sign_record(&mut record, alice.mldsa_secret_bytes()).unwrap();
    chunk::publish(
        overlay.as_ref(),
        &identity_base_key(&alice.fingerprint),
        record.to_json().unwrap().as_bytes(),
        ValueClass::SevenDay,
    )
    .unwrap();
    chunk::publish(
        overlay.as_ref(),
        "alice:lookup",
        alice.fingerprint.to_hex().as_bytes(),
        ValueClass::YearLong,
    )
    .unwrap();

    assert!(record.is_name_expired(now));

    // The alias still resolves, but the identity no longer owns the name.
    let server = KeyServer::new(Arc::clone(&ctx));
    assert!(matches!(server.lookup("alice"), Err(SigilError::NotFound)));

    // Display paths show the abbreviated fingerprint.
    let profiles = ProfileManager::new(ctx);
    let display = profiles.get_display_name(&alice.fingerprint);
    assert_eq!(display, alice.fingerprint.short());
    assert!(display.ends_with("..."));
}

// ── Property 6: newest-valid selection ───────────────────────────────────────

#[test]
fn newest_valid_selection_skips_corrupted_middle_record() {
    let overlay = Arc::new(MemoryOverlay::new());
    let ctx = context(&overlay);
    let alice = IdentityKeyPair::generate();
    let base_key = identity_base_key(&alice.fingerprint);
    let now = unix_now();

    let make = |timestamp: u64, corrupt: bool| {
        let mut record = IdentityRecord::new(
            alice.fingerprint,
            alice.mldsa_public.clone(),
            alice.mlkem_public.clone(),
            timestamp,
        );
        record.bio = format!("state at {timestamp}");
        sign_record(&mut record, alice.mldsa_secret_bytes()).unwrap();
        if corrupt {
            record.signature.0[17] ^= 0xff;
        }
        // Plain puts accumulate: three replicas of the same key, the way a
        // real overlay returns drifted value sets.
        overlay
            .put(
                &chunk::direct_key(&base_key),
                record.to_json().unwrap().as_bytes(),
                ValueClass::SevenDay,
            )
            .unwrap();
        record
    };

    let t1 = make(now - 20, false);
    let _t2 = make(now - 10, true); // corrupted signature
    let t3 = make(now, false);

    let server = KeyServer::new(Arc::clone(&ctx));
    let found = server.lookup(&alice.fingerprint.to_hex()).unwrap();
    assert_eq!(found.timestamp, t3.timestamp);
    assert_eq!(found.bio, t3.bio);

    // Only t1 valid: drop everything, republish t1-valid + two corrupted.
    overlay.drop_key(&chunk::direct_key(&base_key));
    let t1b = make(t1.timestamp, false);
    let _ = make(now - 10, true);
    let _ = make(now, true);
    let found = server.lookup(&alice.fingerprint.to_hex()).unwrap();
    assert_eq!(found.timestamp, t1b.timestamp);
}

#[test]
fn all_invalid_records_surface_as_invariant_violation() {
    let overlay = Arc::new(MemoryOverlay::new());
    let ctx = context(&overlay);
    let alice = IdentityKeyPair::generate();
    let base_key = identity_base_key(&alice.fingerprint);

    let mut record = IdentityRecord::new(
        alice.fingerprint,
        alice.mldsa_public.clone(),
        alice.mlkem_public.clone(),
        unix_now(),
    );
    sign_record(&mut record, alice.mldsa_secret_bytes()).unwrap();
    record.bio = "mutated after signing".into();
    overlay
        .put(
            &chunk::direct_key(&base_key),
            record.to_json().unwrap().as_bytes(),
            ValueClass::SevenDay,
        )
        .unwrap();

    let server = KeyServer::new(ctx);
    assert!(matches!(
        server.lookup(&alice.fingerprint.to_hex()),
        Err(SigilError::InvariantViolation(_))
    ));
}

// ── S6 / property 7: chunked avatar round trip ───────────────────────────────

#[test]
fn s6_large_avatar_round_trips_through_the_chunked_layer() {
    let overlay = Arc::new(MemoryOverlay::new());
    let ctx = context(&overlay);
    let alice = IdentityKeyPair::generate();
    let profiles = ProfileManager::new(Arc::clone(&ctx));

    // ~200 KB avatar: the record JSON spans several chunks.
    let avatar: String = std::iter::repeat("QUJDRA==").take(25_000).collect();
    assert!(avatar.len() > 5 * MAX_CHUNK_BYTES);
    let published = profiles
        .update_profile(
            &alice,
            ProfileData {
                avatar_base64: avatar.clone(),
                ..ProfileData::default()
            },
        )
        .unwrap();

    let reader = KeyServer::new(context(&overlay));
    let found = reader.lookup(&alice.fingerprint.to_hex()).unwrap();
    assert_eq!(found, published);
    assert_eq!(found.avatar_base64, avatar);

    // Dropping any one chunk breaks reassembly.
    let base_key = identity_base_key(&alice.fingerprint);
    overlay.drop_key(&chunk::chunk_key(&base_key, 1));
    assert!(matches!(
        reader.lookup(&alice.fingerprint.to_hex()),
        Err(SigilError::IncompleteChunks { .. })
    ));
}

// ── Update / reverse lookup ──────────────────────────────────────────────────

#[test]
fn update_carries_name_and_profile_forward() {
    let overlay = Arc::new(MemoryOverlay::new());
    let ctx = context(&overlay);
    let alice = IdentityKeyPair::generate();
    let server = KeyServer::new(Arc::clone(&ctx));
    publish_identity(&server, &alice);

    let chain = Arc::new(StaticVerifier::new());
    chain.accept("0xreg", "backbone", "alice");
    NameRegistry::new(Arc::clone(&ctx), chain)
        .register(&alice, "alice", "0xreg", "backbone")
        .unwrap();

    let updated = server
        .update(
            &alice.fingerprint,
            &alice.mldsa_public,
            &alice.mlkem_public,
            alice.mldsa_secret_bytes(),
        )
        .unwrap();
    assert!(updated.has_registered_name);
    assert_eq!(updated.registered_name, "alice");
}

#[test]
fn reverse_lookup_never_fails() {
    let overlay = Arc::new(MemoryOverlay::new());
    let ctx = context(&overlay);
    let server = KeyServer::new(Arc::clone(&ctx));

    let nobody = IdentityKeyPair::generate();
    assert_eq!(server.reverse_lookup(&nobody.fingerprint), nobody.fingerprint.short());

    let alice = IdentityKeyPair::generate();
    publish_identity(&server, &alice);
    let chain = Arc::new(StaticVerifier::new());
    chain.accept("0xreg", "backbone", "alice");
    NameRegistry::new(Arc::clone(&ctx), chain)
        .register(&alice, "alice", "0xreg", "backbone")
        .unwrap();
    assert_eq!(server.reverse_lookup(&alice.fingerprint), "alice");
}

// ── Property 9: cancellation ─────────────────────────────────────────────────

/// Overlay wrapper that makes every read slow enough to cancel.
struct SlowOverlay {
    inner: MemoryOverlay,
    delay: Duration,
}

impl Overlay for SlowOverlay {
    fn put(&self, key: &[u8], value: &[u8], class: ValueClass) -> Result<(), SigilError> {
        self.inner.put(key, value, class)
    }
    fn put_signed(
        &self,
        key: &[u8],
        value: &[u8],
        value_id: u64,
        class: ValueClass,
    ) -> Result<(), SigilError> {
        self.inner.put_signed(key, value, value_id, class)
    }
    fn put_signed_permanent(
        &self,
        key: &[u8],
        value: &[u8],
        value_id: u64,
    ) -> Result<(), SigilError> {
        self.inner.put_signed_permanent(key, value, value_id)
    }
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, SigilError> {
        std::thread::sleep(self.delay);
        self.inner.get(key)
    }
    fn get_all(&self, key: &[u8]) -> Result<Vec<Vec<u8>>, SigilError> {
        std::thread::sleep(self.delay);
        self.inner.get_all(key)
    }
    fn register_value_type(
        &self,
        class_id: u16,
        name: &str,
        expiry_secs: u64,
    ) -> Result<(), SigilError> {
        self.inner.register_value_type(class_id, name, expiry_secs)
    }
    fn is_ready(&self) -> bool {
        true
    }
}

#[test]
fn cancelled_reverse_lookup_fires_callback_once_with_none() {
    let overlay = Arc::new(SlowOverlay {
        inner: MemoryOverlay::new(),
        delay: Duration::from_millis(300),
    });
    let ctx = Context::init(overlay, ContextConfig::default()).unwrap();
    let alice = IdentityKeyPair::generate();

    let (tx, rx) = mpsc::channel();
    let token = reverse_lookup_async(&ctx, alice.fingerprint, move |result| {
        tx.send(result).unwrap();
    });
    // Cancel while the worker is still inside the slow DHT read.
    token.cancel();
    token.cancel(); // double-cancel is a no-op

    let delivered = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(delivered, None);
    // Exactly once: nothing else arrives.
    assert!(rx.recv_timeout(Duration::from_millis(500)).is_err());

    ctx.close();
}

#[test]
fn uncancelled_reverse_lookup_delivers_some_off_thread() {
    let overlay = Arc::new(MemoryOverlay::new());
    let ctx = context(&overlay);
    let alice = IdentityKeyPair::generate();
    publish_identity(&KeyServer::new(Arc::clone(&ctx)), &alice);

    let caller = std::thread::current().id();
    let (tx, rx) = mpsc::channel();
    let _token = reverse_lookup_async(&ctx, alice.fingerprint, move |result| {
        tx.send((result, std::thread::current().id())).unwrap();
    });
    let (delivered, worker) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(delivered, Some(alice.fingerprint.short()));
    assert_ne!(worker, caller, "callback must never run on the caller thread");

    ctx.close();
}
