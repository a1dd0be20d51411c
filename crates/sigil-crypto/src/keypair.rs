use pqcrypto_mldsa::mldsa87;
use pqcrypto_mlkem::mlkem1024;
use pqcrypto_traits::kem::{PublicKey as KemPublicKey, SecretKey as KemSecretKey};
use pqcrypto_traits::sign::{PublicKey, SecretKey};

use sigil_core::types::{Fingerprint, MlDsaPublicKey, MlDsaSignature, MlKemPublicKey};

use crate::hash::fingerprint_from_pubkey;
use crate::mldsa::SignatureError;

/// A user identity keypair: ML-DSA-87 signing keys, ML-KEM-1024 contact
/// keys, and the fingerprint derived from the signing public key.
///
/// Secret key bytes are wiped on drop.
pub struct IdentityKeyPair {
    pub fingerprint: Fingerprint,
    pub mldsa_public: MlDsaPublicKey,
    pub mlkem_public: MlKemPublicKey,
    mldsa_secret: Vec<u8>,
    mlkem_secret: Vec<u8>,
}

impl IdentityKeyPair {
    /// Generate fresh ML-DSA-87 + ML-KEM-1024 keypairs.
    pub fn generate() -> Self {
        let (dsa_pk, dsa_sk) = mldsa87::keypair();
        let (kem_pk, kem_sk) = mlkem1024::keypair();
        let dsa_pk_bytes = dsa_pk.as_bytes().to_vec();
        let fingerprint = fingerprint_from_pubkey(&dsa_pk_bytes);
        Self {
            fingerprint,
            mldsa_public: MlDsaPublicKey(dsa_pk_bytes),
            mlkem_public: MlKemPublicKey(kem_pk.as_bytes().to_vec()),
            mldsa_secret: dsa_sk.as_bytes().to_vec(),
            mlkem_secret: kem_sk.as_bytes().to_vec(),
        }
    }

    /// Restore a keypair from raw key bytes (e.g. loaded from the keystore).
    /// The fingerprint is re-derived, never trusted from disk.
    pub fn from_raw(
        dsa_pk: Vec<u8>,
        dsa_sk: Vec<u8>,
        kem_pk: Vec<u8>,
        kem_sk: Vec<u8>,
    ) -> Self {
        let fingerprint = fingerprint_from_pubkey(&dsa_pk);
        Self {
            fingerprint,
            mldsa_public: MlDsaPublicKey(dsa_pk),
            mlkem_public: MlKemPublicKey(kem_pk),
            mldsa_secret: dsa_sk,
            mlkem_secret: kem_sk,
        }
    }

    /// Sign `message` using this keypair's ML-DSA-87 secret key.
    pub fn sign(&self, message: &[u8]) -> Result<MlDsaSignature, SignatureError> {
        crate::mldsa::sign(&self.mldsa_secret, message)
    }

    pub fn mldsa_secret_bytes(&self) -> &[u8] {
        &self.mldsa_secret
    }

    pub fn mlkem_secret_bytes(&self) -> &[u8] {
        &self.mlkem_secret
    }
}

impl Drop for IdentityKeyPair {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.mldsa_secret.zeroize();
        self.mlkem_secret.zeroize();
    }
}

impl std::fmt::Debug for IdentityKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "IdentityKeyPair {{ fingerprint: {:?} }}", self.fingerprint)
    }
}
