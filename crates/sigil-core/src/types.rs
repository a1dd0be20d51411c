use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::constants::{
    FINGERPRINT_BYTES, FINGERPRINT_HEX_LEN, MLDSA_PUBLIC_KEY_BYTES, MLDSA_SIGNATURE_BYTES,
    MLKEM_PUBLIC_KEY_BYTES, NAME_MAX_LEN, NAME_MIN_LEN, SHORT_FINGERPRINT_HEX,
};
use crate::error::SigilError;

/// Unix timestamp (seconds, UTC).
pub type Timestamp = u64;

/// Monotonic per-identity record version.
pub type RecordVersion = u32;

/// Current wall-clock time as a [`Timestamp`].
pub fn unix_now() -> Timestamp {
    chrono::Utc::now().timestamp().max(0) as u64
}

// ── Fingerprint ──────────────────────────────────────────────────────────────

/// 64-byte self-certifying identity key: SHA3-512 of the ML-DSA-87 public
/// key. External form is 128 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(pub [u8; FINGERPRINT_BYTES]);

impl Fingerprint {
    pub fn from_bytes(b: [u8; FINGERPRINT_BYTES]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_BYTES] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse the 128-character lowercase hex form. Uppercase digits are
    /// rejected: all external fingerprints are lowercase at ingestion.
    pub fn from_hex(s: &str) -> Result<Self, SigilError> {
        if s.len() != FINGERPRINT_HEX_LEN {
            return Err(SigilError::InvalidFingerprint(format!(
                "expected {} hex chars, got {}",
                FINGERPRINT_HEX_LEN,
                s.len()
            )));
        }
        if s.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(SigilError::InvalidFingerprint(
                "uppercase hex digits".into(),
            ));
        }
        let bytes = hex::decode(s)
            .map_err(|e| SigilError::InvalidFingerprint(format!("not hex: {e}")))?;
        let mut arr = [0u8; FINGERPRINT_BYTES];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Abbreviated display form used when an identity has no registered
    /// name: first 16 hex characters followed by `...`.
    pub fn short(&self) -> String {
        format!("{}...", &self.to_hex()[..SHORT_FINGERPRINT_HEX])
    }

    /// True if `s` has the shape of a full fingerprint (as opposed to a
    /// registered name): 128 hex digits.
    pub fn looks_like_hex(s: &str) -> bool {
        s.len() == FINGERPRINT_HEX_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({}…)", &self.to_hex()[..SHORT_FINGERPRINT_HEX])
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Fingerprint::from_hex(&s).map_err(D::Error::custom)
    }
}

// ── RegisteredName ───────────────────────────────────────────────────────────

/// A validated registered name: 3–20 characters of `[a-z0-9_]`.
///
/// Two constructors cover the two ingestion paths:
/// - [`RegisteredName::parse`] trims and lowercases user input first;
/// - [`RegisteredName::new`] is strict and rejects anything outside the
///   grammar, including uppercase; used when reading names out of records,
///   where mixed case marks the record invalid.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegisteredName(String);

impl RegisteredName {
    pub fn new(s: &str) -> Result<Self, SigilError> {
        if s.len() < NAME_MIN_LEN || s.len() > NAME_MAX_LEN {
            return Err(SigilError::InvalidNameFormat(format!(
                "length must be {}-{} characters, got {}",
                NAME_MIN_LEN,
                NAME_MAX_LEN,
                s.len()
            )));
        }
        if !s
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
        {
            return Err(SigilError::InvalidNameFormat(format!(
                "{s:?} contains characters outside [a-z0-9_]"
            )));
        }
        Ok(Self(s.to_string()))
    }

    /// Normalize raw user input (trim whitespace, lowercase) and validate.
    pub fn parse(raw: &str) -> Result<Self, SigilError> {
        Self::new(&raw.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegisteredName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for RegisteredName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RegisteredName({})", self.0)
    }
}

// ── Hex-encoded binary fields ────────────────────────────────────────────────

fn serialize_hex<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&hex::encode(bytes))
}

fn deserialize_hex<'de, D: Deserializer<'de>>(d: D, want: usize) -> Result<Vec<u8>, D::Error> {
    let s = String::deserialize(d)?;
    let bytes = hex::decode(&s).map_err(D::Error::custom)?;
    if bytes.len() != want {
        return Err(D::Error::custom(format!(
            "byte-length mismatch: expected {want}, got {}",
            bytes.len()
        )));
    }
    Ok(bytes)
}

/// ML-DSA-87 public key (2592 bytes per NIST FIPS 204).
#[derive(Clone, PartialEq, Eq)]
pub struct MlDsaPublicKey(pub Vec<u8>);

impl fmt::Debug for MlDsaPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MlDsaPublicKey({}b)", self.0.len())
    }
}

impl Serialize for MlDsaPublicKey {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        serialize_hex(&self.0, s)
    }
}

impl<'de> Deserialize<'de> for MlDsaPublicKey {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        Ok(Self(deserialize_hex(d, MLDSA_PUBLIC_KEY_BYTES)?))
    }
}

/// ML-DSA-87 detached signature (4627 bytes per NIST FIPS 204).
///
/// An unsigned record carries an empty signature; the JSON form accepts
/// both so `to_json_unsigned` output round-trips.
#[derive(Clone, PartialEq, Eq)]
pub struct MlDsaSignature(pub Vec<u8>);

impl MlDsaSignature {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for MlDsaSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MlDsaSignature({}b)", self.0.len())
    }
}

impl Serialize for MlDsaSignature {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        serialize_hex(&self.0, s)
    }
}

impl<'de> Deserialize<'de> for MlDsaSignature {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        let bytes = hex::decode(&s).map_err(D::Error::custom)?;
        if !bytes.is_empty() && bytes.len() != MLDSA_SIGNATURE_BYTES {
            return Err(D::Error::custom(format!(
                "signature byte-length mismatch: expected {MLDSA_SIGNATURE_BYTES} or 0, got {}",
                bytes.len()
            )));
        }
        Ok(Self(bytes))
    }
}

/// ML-KEM-1024 public key (1568 bytes per NIST FIPS 203). Transported in
/// the identity record so peers can encapsulate to the owner; never used
/// for verification inside this subsystem.
#[derive(Clone, PartialEq, Eq)]
pub struct MlKemPublicKey(pub Vec<u8>);

impl fmt::Debug for MlKemPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MlKemPublicKey({}b)", self.0.len())
    }
}

impl Serialize for MlKemPublicKey {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        serialize_hex(&self.0, s)
    }
}

impl<'de> Deserialize<'de> for MlKemPublicKey {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        Ok(Self(deserialize_hex(d, MLKEM_PUBLIC_KEY_BYTES)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_hex_round_trip() {
        let fp = Fingerprint::from_bytes([0xab; FINGERPRINT_BYTES]);
        let hex = fp.to_hex();
        assert_eq!(hex.len(), FINGERPRINT_HEX_LEN);
        assert_eq!(Fingerprint::from_hex(&hex).unwrap(), fp);
    }

    #[test]
    fn fingerprint_rejects_uppercase() {
        let hex = "AB".repeat(FINGERPRINT_BYTES);
        assert!(Fingerprint::from_hex(&hex).is_err());
    }

    #[test]
    fn fingerprint_rejects_wrong_length() {
        assert!(Fingerprint::from_hex("abcd").is_err());
    }

    #[test]
    fn name_grammar() {
        assert!(RegisteredName::new("alice").is_ok());
        assert!(RegisteredName::new("a_1").is_ok());
        assert!(RegisteredName::new("ab").is_err());
        assert!(RegisteredName::new("Alice").is_err());
        assert!(RegisteredName::new("alice!").is_err());
        assert!(RegisteredName::new(&"a".repeat(21)).is_err());
    }

    #[test]
    fn name_parse_normalizes() {
        let n = RegisteredName::parse("  Alice ").unwrap();
        assert_eq!(n.as_str(), "alice");
    }

    #[test]
    fn short_form() {
        let fp = Fingerprint::from_bytes([0x12; FINGERPRINT_BYTES]);
        assert_eq!(fp.short(), "1212121212121212...");
    }
}
