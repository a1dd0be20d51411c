use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::{Digest, Sha3_512, Shake256};

use sigil_core::types::Fingerprint;

/// Compute SHA3-512 of arbitrary bytes → 64-byte array.
pub fn sha3_512(data: &[u8]) -> [u8; 64] {
    let mut out = [0u8; 64];
    out.copy_from_slice(&Sha3_512::digest(data));
    out
}

/// SHAKE256 with a caller-chosen output length.
pub fn shake256(data: &[u8], output_len: usize) -> Vec<u8> {
    let mut hasher = Shake256::default();
    hasher.update(data);
    let mut out = vec![0u8; output_len];
    hasher.finalize_xof().read(&mut out);
    out
}

/// Derive the self-certifying fingerprint from a raw ML-DSA-87 public key.
pub fn fingerprint_from_pubkey(pubkey_bytes: &[u8]) -> Fingerprint {
    Fingerprint::from_bytes(sha3_512(pubkey_bytes))
}
