//! Canonical signing-bytes serializer.
//!
//! The signed message is the concatenation of every record field except
//! `signature`, each at a fixed width: strings NUL-padded into their field,
//! integers big-endian. The output length is the compile-time constant
//! [`CANONICAL_MESSAGE_LEN`]; any layout drift is caught by the length
//! check at the end of [`canonical_signing_bytes`].

use crate::constants::{
    FIELD_AVATAR, FIELD_BIO, FIELD_FINGERPRINT, FIELD_IPFS, FIELD_NAME, FIELD_NETWORK,
    FIELD_SOCIAL, FIELD_TX_HASH, FIELD_WALLET, MLDSA_PUBLIC_KEY_BYTES, MLKEM_PUBLIC_KEY_BYTES,
    SOCIAL_SLOTS, WALLET_SLOTS,
};
use crate::error::SigilError;
use crate::record::IdentityRecord;

/// Exact length of the canonical signing message.
pub const CANONICAL_MESSAGE_LEN: usize = FIELD_FINGERPRINT       // fingerprint hex
    + MLDSA_PUBLIC_KEY_BYTES                                     // mldsa_pubkey
    + MLKEM_PUBLIC_KEY_BYTES                                     // mlkem_pubkey
    + 1                                                          // has_registered_name
    + FIELD_NAME                                                 // registered_name
    + 8                                                          // name_registered_at
    + 8                                                          // name_expires_at
    + FIELD_TX_HASH                                              // registration_tx_hash
    + FIELD_NETWORK                                              // registration_network
    + 4                                                          // name_version
    + WALLET_SLOTS * FIELD_WALLET                                // wallets
    + SOCIAL_SLOTS * FIELD_SOCIAL                                // socials
    + FIELD_BIO                                                  // bio
    + FIELD_IPFS                                                 // profile_picture_ipfs
    + FIELD_AVATAR                                               // avatar_base64
    + 8                                                          // timestamp
    + 4; // version

struct CanonicalWriter {
    buf: Vec<u8>,
}

impl CanonicalWriter {
    fn with_capacity(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap),
        }
    }

    /// Exact-width binary field: the input must already be `width` bytes.
    fn put_exact(&mut self, label: &str, bytes: &[u8], width: usize) -> Result<(), SigilError> {
        if bytes.len() != width {
            return Err(SigilError::InvalidInput(format!(
                "{label}: expected {width} bytes, got {}",
                bytes.len()
            )));
        }
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// NUL-padded string field.
    fn put_padded(&mut self, label: &str, s: &str, width: usize) -> Result<(), SigilError> {
        let bytes = s.as_bytes();
        if bytes.len() > width {
            return Err(SigilError::InvalidInput(format!(
                "{label}: {} bytes exceeds field width {width}",
                bytes.len()
            )));
        }
        self.buf.extend_from_slice(bytes);
        self.buf.resize(self.buf.len() + (width - bytes.len()), 0);
        Ok(())
    }

    fn put_bool(&mut self, v: bool) {
        self.buf.push(v as u8);
    }

    fn put_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }
}

/// Serialize the record into the canonical signing message.
///
/// Field order here IS the wire contract. Changing it, or any width in
/// `constants`, invalidates every existing signature.
pub fn canonical_signing_bytes(record: &IdentityRecord) -> Result<Vec<u8>, SigilError> {
    let mut w = CanonicalWriter::with_capacity(CANONICAL_MESSAGE_LEN);

    w.put_padded("fingerprint", &record.fingerprint.to_hex(), FIELD_FINGERPRINT)?;
    w.put_exact("mldsa_pubkey", &record.mldsa_pubkey.0, MLDSA_PUBLIC_KEY_BYTES)?;
    w.put_exact("mlkem_pubkey", &record.mlkem_pubkey.0, MLKEM_PUBLIC_KEY_BYTES)?;
    w.put_bool(record.has_registered_name);
    w.put_padded("registered_name", &record.registered_name, FIELD_NAME)?;
    w.put_u64(record.name_registered_at);
    w.put_u64(record.name_expires_at);
    w.put_padded("registration_tx_hash", &record.registration_tx_hash, FIELD_TX_HASH)?;
    w.put_padded("registration_network", &record.registration_network, FIELD_NETWORK)?;
    w.put_u32(record.name_version);
    for (slot, addr) in record.wallets.slots().into_iter().enumerate() {
        w.put_padded(&format!("wallet[{slot}]"), addr, FIELD_WALLET)?;
    }
    for (slot, handle) in record.socials.slots().into_iter().enumerate() {
        w.put_padded(&format!("social[{slot}]"), handle, FIELD_SOCIAL)?;
    }
    w.put_padded("bio", &record.bio, FIELD_BIO)?;
    w.put_padded("profile_picture_ipfs", &record.profile_picture_ipfs, FIELD_IPFS)?;
    w.put_padded("avatar_base64", &record.avatar_base64, FIELD_AVATAR)?;
    w.put_u64(record.timestamp);
    w.put_u32(record.version);

    if w.buf.len() != CANONICAL_MESSAGE_LEN {
        return Err(SigilError::Serialization(format!(
            "canonical layout drift: wrote {} bytes, expected {}",
            w.buf.len(),
            CANONICAL_MESSAGE_LEN
        )));
    }
    Ok(w.buf)
}
