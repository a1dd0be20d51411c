//! ─── Sigil Protocol Constants ───────────────────────────────────────────────
//!
//! "Identity you can verify; presence that fades."
//!
//! Key and signature sizes follow NIST FIPS 204 (ML-DSA-87) and FIPS 203
//! (ML-KEM-1024). Record field widths are fixed so that the canonical
//! signing message has one byte layout on every platform.

// ── Post-quantum primitive sizes ─────────────────────────────────────────────

/// ML-DSA-87 public key size in bytes (FIPS 204).
pub const MLDSA_PUBLIC_KEY_BYTES: usize = 2592;

/// ML-DSA-87 secret key size in bytes (FIPS 204).
pub const MLDSA_SECRET_KEY_BYTES: usize = 4896;

/// ML-DSA-87 detached signature size in bytes (FIPS 204).
pub const MLDSA_SIGNATURE_BYTES: usize = 4627;

/// ML-KEM-1024 public key size in bytes (FIPS 203).
pub const MLKEM_PUBLIC_KEY_BYTES: usize = 1568;

/// ML-KEM-1024 secret key size in bytes (FIPS 203).
pub const MLKEM_SECRET_KEY_BYTES: usize = 3168;

// ── Fingerprint ──────────────────────────────────────────────────────────────

/// Raw fingerprint digest size: SHA3-512 output.
pub const FINGERPRINT_BYTES: usize = 64;

/// External fingerprint form: 128 lowercase hex characters.
pub const FINGERPRINT_HEX_LEN: usize = 128;

/// Number of leading hex characters shown when no registered name exists.
pub const SHORT_FINGERPRINT_HEX: usize = 16;

// ── Registered names ─────────────────────────────────────────────────────────

/// Minimum registered-name length (characters).
pub const NAME_MIN_LEN: usize = 3;

/// Maximum registered-name length (characters).
pub const NAME_MAX_LEN: usize = 20;

/// Name ownership period granted per registration transaction.
pub const NAME_OWNERSHIP_SECS: u64 = 365 * 24 * 3600;

// ── Canonical record field widths (bytes) ────────────────────────────────────

/// Fingerprint field: ASCII hex, exactly 128 bytes.
pub const FIELD_FINGERPRINT: usize = FINGERPRINT_HEX_LEN;

/// Registered-name field, NUL-padded.
pub const FIELD_NAME: usize = 32;

/// Registration transaction hash field (hex), NUL-padded.
pub const FIELD_TX_HASH: usize = 96;

/// Registration network identifier field, NUL-padded.
pub const FIELD_NETWORK: usize = 16;

/// One wallet address field, NUL-padded.
pub const FIELD_WALLET: usize = 128;

/// Number of wallet slots carried in the record.
pub const WALLET_SLOTS: usize = 4;

/// One social-handle field, NUL-padded.
pub const FIELD_SOCIAL: usize = 64;

/// Number of social-handle slots carried in the record.
pub const SOCIAL_SLOTS: usize = 4;

/// Bio field, NUL-padded.
pub const FIELD_BIO: usize = 256;

/// IPFS CID field for the profile picture, NUL-padded.
pub const FIELD_IPFS: usize = 64;

/// Inline avatar field (base64 text), NUL-padded. 256 KiB upper bound.
pub const FIELD_AVATAR: usize = 256 * 1024;

// ── DHT key namespaces ───────────────────────────────────────────────────────

/// Suffix appended to a fingerprint to form the identity-record base key.
pub const IDENTITY_KEY_SUFFIX: &str = ":identity";

/// Suffix appended to a lowercase name to form the alias base key.
pub const LOOKUP_KEY_SUFFIX: &str = ":lookup";

// ── TTL regime ───────────────────────────────────────────────────────────────

/// Identity records, profiles: refreshed on activity, fade when inactive.
pub const IDENTITY_TTL_SECS: u64 = 7 * 24 * 3600;

/// Medium-term caches.
pub const MEDIUM_TTL_SECS: u64 = 30 * 24 * 3600;

/// Name aliases: one ownership period.
pub const ALIAS_TTL_SECS: u64 = NAME_OWNERSHIP_SECS;

/// Overlay default expiry applied to values of unregistered classes.
pub const UNREGISTERED_CLASS_TTL_SECS: u64 = 10 * 60;

// ── Chunked storage ──────────────────────────────────────────────────────────

/// Maximum payload carried by a single DHT value.
pub const MAX_CHUNK_BYTES: usize = 32 * 1024;

// ── Deadlines and pacing ─────────────────────────────────────────────────────

/// Deadline for a small single-value DHT read.
pub const DHT_GET_DEADLINE_SECS: u64 = 5;

/// Deadline for a chunked (large) DHT read.
pub const DHT_CHUNKED_GET_DEADLINE_SECS: u64 = 30;

/// Bound on concurrent background lookups (mobile-safe).
pub const MAX_CONCURRENT_LOOKUPS: usize = 8;

/// Minimum interval between chain RPC calls to one endpoint.
pub const CHAIN_RPC_MIN_INTERVAL_SECS: u64 = 1;

/// Cache entries older than this trigger a background refresh on read.
pub const CACHE_FRESHNESS_SECS: u64 = 5 * 60;

/// Default poll interval for key listeners.
pub const LISTENER_POLL_SECS: u64 = 30;
