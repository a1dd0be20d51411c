//! DHT node identity: the per-process signing keypair and self-signed
//! certificate the overlay authenticates nodes with. Created once at
//! install, loaded on every start. Unrelated to any user identity key.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use sigil_core::constants::{
    MLDSA_PUBLIC_KEY_BYTES, MLDSA_SECRET_KEY_BYTES, MLDSA_SIGNATURE_BYTES,
};
use sigil_core::error::SigilError;
use sigil_core::types::{unix_now, MlDsaPublicKey, MlDsaSignature, Timestamp};
use sigil_crypto::mldsa;

/// Self-signed certificates are reissued with the key; ten years outlives
/// any realistic install.
const CERT_VALIDITY_SECS: u64 = 10 * 365 * 24 * 3600;

const CERT_BODY_LEN: usize = MLDSA_PUBLIC_KEY_BYTES + 8 + 8;
const CERT_LEN: usize = CERT_BODY_LEN + MLDSA_SIGNATURE_BYTES;

// ── Certificate ──────────────────────────────────────────────────────────────

/// Self-signed node certificate: `pubkey ‖ issued_at ‖ expires_at` signed
/// by the node key itself.
#[derive(Clone, Debug)]
pub struct NodeCertificate {
    pub public_key: MlDsaPublicKey,
    pub issued_at: Timestamp,
    pub expires_at: Timestamp,
    pub signature: MlDsaSignature,
}

impl NodeCertificate {
    fn body(public_key: &MlDsaPublicKey, issued_at: Timestamp, expires_at: Timestamp) -> Vec<u8> {
        let mut body = Vec::with_capacity(CERT_BODY_LEN);
        body.extend_from_slice(&public_key.0);
        body.extend_from_slice(&issued_at.to_be_bytes());
        body.extend_from_slice(&expires_at.to_be_bytes());
        body
    }

    fn issue(public_key: MlDsaPublicKey, secret_key: &[u8]) -> Result<Self, SigilError> {
        let issued_at = unix_now();
        let expires_at = issued_at + CERT_VALIDITY_SECS;
        let body = Self::body(&public_key, issued_at, expires_at);
        let signature =
            mldsa::sign(secret_key, &body).map_err(|e| SigilError::SignFailed(e.to_string()))?;
        Ok(Self {
            public_key,
            issued_at,
            expires_at,
            signature,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Self::body(&self.public_key, self.issued_at, self.expires_at);
        out.extend_from_slice(&self.signature.0);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, SigilError> {
        if bytes.len() != CERT_LEN {
            return Err(SigilError::ParseFailed(format!(
                "node certificate: expected {CERT_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let public_key = MlDsaPublicKey(bytes[..MLDSA_PUBLIC_KEY_BYTES].to_vec());
        let issued_at = u64::from_be_bytes(
            bytes[MLDSA_PUBLIC_KEY_BYTES..MLDSA_PUBLIC_KEY_BYTES + 8]
                .try_into()
                .expect("fixed slice"),
        );
        let expires_at = u64::from_be_bytes(
            bytes[MLDSA_PUBLIC_KEY_BYTES + 8..CERT_BODY_LEN]
                .try_into()
                .expect("fixed slice"),
        );
        let signature = MlDsaSignature(bytes[CERT_BODY_LEN..].to_vec());
        Ok(Self {
            public_key,
            issued_at,
            expires_at,
            signature,
        })
    }

    /// Structural self-verification: the signature must cover the body
    /// under the embedded key, and the validity window must contain now.
    pub fn verify(&self) -> Result<(), SigilError> {
        let body = Self::body(&self.public_key, self.issued_at, self.expires_at);
        mldsa::verify_signature(&self.public_key, &body, &self.signature)
            .map_err(|_| SigilError::ParseFailed("node certificate signature invalid".into()))?;
        let now = unix_now();
        if now < self.issued_at || now >= self.expires_at {
            return Err(SigilError::ParseFailed(
                "node certificate outside validity window".into(),
            ));
        }
        Ok(())
    }
}

// ── NodeIdentity ─────────────────────────────────────────────────────────────

/// The running process's overlay identity.
pub struct NodeIdentity {
    pub public_key: MlDsaPublicKey,
    pub certificate: NodeCertificate,
    secret_key: Vec<u8>,
}

impl NodeIdentity {
    fn paths(dir: &Path, node_name: &str) -> (PathBuf, PathBuf, PathBuf) {
        (
            dir.join(format!("{node_name}.dsa")),
            dir.join(format!("{node_name}.pub")),
            dir.join(format!("{node_name}.cert")),
        )
    }

    fn generate() -> Result<Self, SigilError> {
        let (public_key, secret_key) = mldsa::generate_keypair();
        let certificate = NodeCertificate::issue(public_key.clone(), &secret_key)?;
        Ok(Self {
            public_key,
            certificate,
            secret_key,
        })
    }

    fn try_load(dir: &Path, node_name: &str) -> Result<Self, SigilError> {
        let (dsa_path, pub_path, cert_path) = Self::paths(dir, node_name);
        let read = |p: &Path| {
            fs::read(p).map_err(|e| SigilError::Storage(format!("{}: {e}", p.display())))
        };
        let secret_key = read(&dsa_path)?;
        let pub_bytes = read(&pub_path)?;
        let cert_bytes = read(&cert_path)?;

        if secret_key.len() != MLDSA_SECRET_KEY_BYTES {
            return Err(SigilError::ParseFailed(format!(
                "{}: wrong secret key length {}",
                dsa_path.display(),
                secret_key.len()
            )));
        }
        if pub_bytes.len() != MLDSA_PUBLIC_KEY_BYTES {
            return Err(SigilError::ParseFailed(format!(
                "{}: wrong public key length {}",
                pub_path.display(),
                pub_bytes.len()
            )));
        }
        let public_key = MlDsaPublicKey(pub_bytes);
        let certificate = NodeCertificate::decode(&cert_bytes)?;
        if certificate.public_key != public_key {
            return Err(SigilError::ParseFailed(
                "node certificate does not match public key file".into(),
            ));
        }
        certificate.verify()?;
        Ok(Self {
            public_key,
            certificate,
            secret_key,
        })
    }

    fn persist(&self, dir: &Path, node_name: &str) -> Result<(), SigilError> {
        fs::create_dir_all(dir).map_err(|e| SigilError::Storage(e.to_string()))?;
        let (dsa_path, pub_path, cert_path) = Self::paths(dir, node_name);
        let write = |p: &Path, bytes: &[u8]| {
            fs::write(p, bytes).map_err(|e| SigilError::Storage(format!("{}: {e}", p.display())))
        };
        write(&dsa_path, &self.secret_key)?;
        write(&pub_path, &self.public_key.0)?;
        write(&cert_path, &self.certificate.encode())
    }

    /// Load the node identity from `dir`, regenerating it if any file is
    /// missing or corrupt. Regeneration changes the node's overlay
    /// identity and resets whatever reputation it had.
    pub fn load_or_create(dir: &Path, node_name: &str) -> Result<Self, SigilError> {
        match Self::try_load(dir, node_name) {
            Ok(identity) => {
                info!(node = node_name, "loaded node identity");
                Ok(identity)
            }
            Err(e) => {
                warn!(
                    node = node_name,
                    error = %e,
                    "node identity missing or corrupt — regenerating (overlay reputation resets)"
                );
                let identity = Self::generate()?;
                identity.persist(dir, node_name)?;
                Ok(identity)
            }
        }
    }

    pub fn secret_key_bytes(&self) -> &[u8] {
        &self.secret_key
    }
}

impl Drop for NodeIdentity {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.secret_key.zeroize();
    }
}

impl std::fmt::Debug for NodeIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "NodeIdentity {{ public_key: {:?}, issued_at: {} }}",
            self.public_key, self.certificate.issued_at
        )
    }
}
