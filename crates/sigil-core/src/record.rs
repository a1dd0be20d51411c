//! The identity record: the signed data structure binding a fingerprint,
//! the owner's post-quantum keys, an optional registered name, and a
//! short-lived profile.
//!
//! Two serializations exist. The external form is JSON with every binary
//! field hex-encoded ([`IdentityRecord::to_json`]). The signature never
//! covers the JSON text: it covers the fixed-layout canonical message
//! produced by [`crate::codec::canonical_signing_bytes`], so the signed
//! bytes are identical on every platform regardless of transport.

use serde::{Deserialize, Serialize};

use crate::constants::{
    FIELD_AVATAR, FIELD_BIO, FIELD_IPFS, FIELD_NETWORK, FIELD_SOCIAL, FIELD_TX_HASH, FIELD_WALLET,
};
use crate::error::SigilError;
use crate::types::{
    Fingerprint, MlDsaPublicKey, MlDsaSignature, MlKemPublicKey, RecordVersion, RegisteredName,
    Timestamp,
};

// ── Profile sub-structures ───────────────────────────────────────────────────

/// Per-chain wallet addresses carried in the profile. Fixed slot set: the
/// canonical message reserves one field per slot whether or not it is set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSet {
    pub backbone: String,
    pub btc: String,
    pub eth: String,
    pub sol: String,
}

impl WalletSet {
    /// Slot order is part of the canonical layout. Never reorder.
    pub fn slots(&self) -> [&str; 4] {
        [&self.backbone, &self.btc, &self.eth, &self.sol]
    }
}

/// Per-platform social handles. Same fixed-slot discipline as [`WalletSet`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialHandles {
    pub x: String,
    pub github: String,
    pub telegram: String,
    pub matrix: String,
}

impl SocialHandles {
    /// Slot order is part of the canonical layout. Never reorder.
    pub fn slots(&self) -> [&str; 4] {
        [&self.x, &self.github, &self.telegram, &self.matrix]
    }
}

/// The mutable profile subset of an identity record. Applying it replaces
/// these fields wholesale, bumps the version, and requires a re-sign.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileData {
    pub wallets: WalletSet,
    pub socials: SocialHandles,
    pub bio: String,
    pub profile_picture_ipfs: String,
    pub avatar_base64: String,
}

impl ProfileData {
    /// Reject fields that would not fit their fixed canonical width.
    /// Oversize input is an error at the API boundary, never a silent cut.
    pub fn validate(&self) -> Result<(), SigilError> {
        for (label, value, max) in [
            ("wallets.backbone", self.wallets.backbone.as_str(), FIELD_WALLET),
            ("wallets.btc", self.wallets.btc.as_str(), FIELD_WALLET),
            ("wallets.eth", self.wallets.eth.as_str(), FIELD_WALLET),
            ("wallets.sol", self.wallets.sol.as_str(), FIELD_WALLET),
            ("socials.x", self.socials.x.as_str(), FIELD_SOCIAL),
            ("socials.github", self.socials.github.as_str(), FIELD_SOCIAL),
            ("socials.telegram", self.socials.telegram.as_str(), FIELD_SOCIAL),
            ("socials.matrix", self.socials.matrix.as_str(), FIELD_SOCIAL),
            ("bio", self.bio.as_str(), FIELD_BIO),
            ("profile_picture_ipfs", self.profile_picture_ipfs.as_str(), FIELD_IPFS),
            ("avatar_base64", self.avatar_base64.as_str(), FIELD_AVATAR),
        ] {
            if value.len() > max {
                return Err(SigilError::InvalidInput(format!(
                    "{label} exceeds {max} bytes (got {})",
                    value.len()
                )));
            }
        }
        Ok(())
    }
}

// ── IdentityRecord ───────────────────────────────────────────────────────────

/// A complete identity record as stored under `{fingerprint}:identity`.
///
/// Single-writer: only the holder of the matching ML-DSA-87 secret key can
/// produce a valid update. Every mutation increments `version`, stamps
/// `timestamp`, and re-signs; readers select the newest record passing
/// self-certification and signature checks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub fingerprint: Fingerprint,
    pub mldsa_pubkey: MlDsaPublicKey,
    pub mlkem_pubkey: MlKemPublicKey,

    pub has_registered_name: bool,
    /// Lowercase, empty unless `has_registered_name`. A mixed-case name in
    /// a stored record marks the whole record invalid.
    pub registered_name: String,
    pub name_registered_at: Timestamp,
    pub name_expires_at: Timestamp,
    /// On-chain transaction hash proving the registration payment.
    pub registration_tx_hash: String,
    /// Chain identifier the registration transaction lives on.
    pub registration_network: String,
    pub name_version: u32,

    pub wallets: WalletSet,
    pub socials: SocialHandles,
    pub bio: String,
    pub profile_picture_ipfs: String,
    pub avatar_base64: String,

    /// Last update time; decides newest-valid selection.
    pub timestamp: Timestamp,
    /// Monotonic per identity; informational only, never a tie-breaker.
    pub version: RecordVersion,

    /// ML-DSA-87 signature over the canonical message (all fields above).
    pub signature: MlDsaSignature,
}

impl IdentityRecord {
    /// Fresh unsigned record with no name and an empty profile.
    pub fn new(
        fingerprint: Fingerprint,
        mldsa_pubkey: MlDsaPublicKey,
        mlkem_pubkey: MlKemPublicKey,
        now: Timestamp,
    ) -> Self {
        Self {
            fingerprint,
            mldsa_pubkey,
            mlkem_pubkey,
            has_registered_name: false,
            registered_name: String::new(),
            name_registered_at: 0,
            name_expires_at: 0,
            registration_tx_hash: String::new(),
            registration_network: String::new(),
            name_version: 0,
            wallets: WalletSet::default(),
            socials: SocialHandles::default(),
            bio: String::new(),
            profile_picture_ipfs: String::new(),
            avatar_base64: String::new(),
            timestamp: now,
            version: 1,
            signature: MlDsaSignature::empty(),
        }
    }

    /// Structural validation of field bounds and the name grammar.
    pub fn validate(&self) -> Result<(), SigilError> {
        if self.has_registered_name {
            // Strict: rejects uppercase, so a mixed-case stored name fails here.
            RegisteredName::new(&self.registered_name)?;
        } else if !self.registered_name.is_empty() {
            return Err(SigilError::InvalidInput(
                "registered_name set without has_registered_name".into(),
            ));
        }
        if self.registration_tx_hash.len() > FIELD_TX_HASH {
            return Err(SigilError::InvalidInput(format!(
                "registration_tx_hash exceeds {FIELD_TX_HASH} bytes"
            )));
        }
        if self.registration_network.len() > FIELD_NETWORK {
            return Err(SigilError::InvalidInput(format!(
                "registration_network exceeds {FIELD_NETWORK} bytes"
            )));
        }
        self.profile().validate()
    }

    /// The mutable profile subset as one value.
    pub fn profile(&self) -> ProfileData {
        ProfileData {
            wallets: self.wallets.clone(),
            socials: self.socials.clone(),
            bio: self.bio.clone(),
            profile_picture_ipfs: self.profile_picture_ipfs.clone(),
            avatar_base64: self.avatar_base64.clone(),
        }
    }

    /// Replace the profile fields. Caller must bump and re-sign afterwards.
    pub fn apply_profile(&mut self, profile: ProfileData) {
        self.wallets = profile.wallets;
        self.socials = profile.socials;
        self.bio = profile.bio;
        self.profile_picture_ipfs = profile.profile_picture_ipfs;
        self.avatar_base64 = profile.avatar_base64;
    }

    /// Advance version and timestamp ahead of re-signing. The timestamp is
    /// forced past the previous one so newest-valid selection always moves
    /// forward even within one wall-clock second.
    pub fn bump(&mut self, now: Timestamp) {
        self.version = self.version.saturating_add(1);
        self.timestamp = now.max(self.timestamp + 1);
    }

    /// True while the record holds an unexpired name claim.
    pub fn owns_name(&self, now: Timestamp) -> bool {
        self.has_registered_name && now < self.name_expires_at
    }

    /// Name-expiry check: a record with a lapsed name must not be served
    /// as owning it.
    pub fn is_name_expired(&self, now: Timestamp) -> bool {
        self.has_registered_name && now >= self.name_expires_at
    }

    /// Display string: the registered name while owned, otherwise the
    /// abbreviated fingerprint.
    pub fn display_name(&self, now: Timestamp) -> String {
        if self.owns_name(now) {
            self.registered_name.clone()
        } else {
            self.fingerprint.short()
        }
    }

    // ── JSON forms ───────────────────────────────────────────────────────────

    pub fn to_json(&self) -> Result<String, SigilError> {
        serde_json::to_string(self).map_err(|e| SigilError::Serialization(e.to_string()))
    }

    /// JSON with the signature cleared. Diagnostic / forward-compat form
    /// only; the signature always covers the canonical binary message.
    pub fn to_json_unsigned(&self) -> Result<String, SigilError> {
        let mut unsigned = self.clone();
        unsigned.signature = MlDsaSignature::empty();
        unsigned.to_json()
    }

    /// Parse and structurally validate the external JSON form. Signature
    /// and self-certification checks are separate (the verifier's job).
    pub fn from_json(json: &str) -> Result<Self, SigilError> {
        let record: IdentityRecord =
            serde_json::from_str(json).map_err(|e| SigilError::ParseFailed(e.to_string()))?;
        record
            .validate()
            .map_err(|e| SigilError::ParseFailed(e.to_string()))?;
        Ok(record)
    }

    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, SigilError> {
        let s = std::str::from_utf8(bytes)
            .map_err(|e| SigilError::ParseFailed(format!("record is not UTF-8: {e}")))?;
        Self::from_json(s)
    }

    /// The canonical message the signature covers.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, SigilError> {
        crate::codec::canonical_signing_bytes(self)
    }
}
