use thiserror::Error;

/// The cryptographic invariant that failed on a verified read.
///
/// An invariant failure is never transient: the offending record is
/// discarded and the error surfaces to the caller unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invariant {
    /// SHA3-512(mldsa_pubkey) != fingerprint.
    SelfCertification,
    /// ML-DSA-87 signature does not verify over the canonical message.
    Signature,
    /// Alias resolved, but the identity does not own the queried name.
    AliasBinding,
}

impl std::fmt::Display for Invariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Invariant::SelfCertification => write!(f, "self-certification"),
            Invariant::Signature => write!(f, "signature"),
            Invariant::AliasBinding => write!(f, "alias binding"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SigilError {
    // ── Resolution ───────────────────────────────────────────────────────────
    #[error("not found")]
    NotFound,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    #[error("invalid name format: {0}")]
    InvalidNameFormat(String),

    #[error("name already registered to another identity: {name}")]
    NameTaken { name: String },

    // ── Verification ─────────────────────────────────────────────────────────
    #[error("invariant violation: {0}")]
    InvariantViolation(Invariant),

    #[error("registration transaction rejected: {0}")]
    VerificationFailed(String),

    #[error("chain RPC error: {0}")]
    RpcError(String),

    // ── Overlay ──────────────────────────────────────────────────────────────
    #[error("DHT error: {0}")]
    DhtError(String),

    #[error("incomplete chunked value: {present} of {total} chunks usable")]
    IncompleteChunks { present: usize, total: usize },

    #[error("invalid chunk manifest: {0}")]
    InvalidManifest(String),

    // ── Local faults ─────────────────────────────────────────────────────────
    #[error("signing failed: {0}")]
    SignFailed(String),

    #[error("parse failed: {0}")]
    ParseFailed(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),

    // ── Control flow ─────────────────────────────────────────────────────────
    #[error("operation cancelled")]
    Cancelled,
}

impl SigilError {
    /// True for failures a caller may retry (transient overlay / RPC faults).
    /// Invariant violations and parse failures are never retriable.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            SigilError::DhtError(_) | SigilError::IncompleteChunks { .. } | SigilError::RpcError(_)
        )
    }
}
