use pqcrypto_mldsa::mldsa87;
use pqcrypto_traits::sign::{DetachedSignature, PublicKey, SecretKey};
use thiserror::Error;

use sigil_core::types::{MlDsaPublicKey, MlDsaSignature};

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid public key length: expected {expected}, got {got}")]
    InvalidPublicKeyLength { expected: usize, got: usize },
    #[error("invalid secret key length: expected {expected}, got {got}")]
    InvalidSecretKeyLength { expected: usize, got: usize },
}

/// Generate a fresh ML-DSA-87 keypair as raw bytes.
pub fn generate_keypair() -> (MlDsaPublicKey, Vec<u8>) {
    let (pk, sk) = mldsa87::keypair();
    (
        MlDsaPublicKey(pk.as_bytes().to_vec()),
        sk.as_bytes().to_vec(),
    )
}

/// Sign `message` with an ML-DSA-87 secret key. Returns a detached signature.
pub fn sign(secret_key_bytes: &[u8], message: &[u8]) -> Result<MlDsaSignature, SignatureError> {
    let sk = mldsa87::SecretKey::from_bytes(secret_key_bytes).map_err(|_| {
        SignatureError::InvalidSecretKeyLength {
            expected: mldsa87::secret_key_bytes(),
            got: secret_key_bytes.len(),
        }
    })?;
    let sig = mldsa87::detached_sign(message, &sk);
    Ok(MlDsaSignature(sig.as_bytes().to_vec()))
}

/// Verify a detached ML-DSA-87 signature.
pub fn verify_signature(
    public_key: &MlDsaPublicKey,
    message: &[u8],
    signature: &MlDsaSignature,
) -> Result<(), SignatureError> {
    let pk = mldsa87::PublicKey::from_bytes(&public_key.0).map_err(|_| {
        SignatureError::InvalidPublicKeyLength {
            expected: mldsa87::public_key_bytes(),
            got: public_key.0.len(),
        }
    })?;
    let sig = mldsa87::DetachedSignature::from_bytes(&signature.0)
        .map_err(|_| SignatureError::InvalidSignature)?;
    mldsa87::verify_detached_signature(&sig, message, &pk)
        .map_err(|_| SignatureError::InvalidSignature)
}
