//! User identity keystore.
//!
//! Layout under `{data_dir}/keys/`:
//!   identity.dsa      — ML-DSA-87 secret key (4896 B)
//!   identity.dsa.pub  — ML-DSA-87 public key (2592 B)
//!   identity.kem      — ML-KEM-1024 secret key (3168 B)
//!   identity.kem.pub  — ML-KEM-1024 public key (1568 B)
//!   fingerprint.txt   — 128 lowercase hex chars, for external tooling
//!
//! The fingerprint file is informational: the fingerprint is always
//! re-derived from the signing key on load.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _};
use tracing::info;

use sigil_core::constants::{
    MLDSA_PUBLIC_KEY_BYTES, MLDSA_SECRET_KEY_BYTES, MLKEM_PUBLIC_KEY_BYTES,
    MLKEM_SECRET_KEY_BYTES,
};
use sigil_crypto::IdentityKeyPair;

fn paths(keys_dir: &Path) -> [PathBuf; 5] {
    [
        keys_dir.join("identity.dsa"),
        keys_dir.join("identity.dsa.pub"),
        keys_dir.join("identity.kem"),
        keys_dir.join("identity.kem.pub"),
        keys_dir.join("fingerprint.txt"),
    ]
}

pub fn exists(keys_dir: &Path) -> bool {
    paths(keys_dir).iter().all(|p| p.exists())
}

/// Generate a fresh user identity and persist it. Refuses to overwrite an
/// existing keystore; losing these keys means losing the identity.
pub fn create(keys_dir: &Path) -> anyhow::Result<IdentityKeyPair> {
    if exists(keys_dir) {
        bail!(
            "keystore already exists at {} — refusing to overwrite",
            keys_dir.display()
        );
    }
    fs::create_dir_all(keys_dir)
        .with_context(|| format!("creating keys dir {}", keys_dir.display()))?;

    let keys = IdentityKeyPair::generate();
    let [dsa, dsa_pub, kem, kem_pub, fp_txt] = paths(keys_dir);
    fs::write(&dsa, keys.mldsa_secret_bytes()).context("writing identity.dsa")?;
    fs::write(&dsa_pub, &keys.mldsa_public.0).context("writing identity.dsa.pub")?;
    fs::write(&kem, keys.mlkem_secret_bytes()).context("writing identity.kem")?;
    fs::write(&kem_pub, &keys.mlkem_public.0).context("writing identity.kem.pub")?;
    fs::write(&fp_txt, format!("{}\n", keys.fingerprint.to_hex()))
        .context("writing fingerprint.txt")?;

    info!(fingerprint = %keys.fingerprint, "created user identity");
    Ok(keys)
}

/// Load the user identity from disk, validating key lengths.
pub fn load(keys_dir: &Path) -> anyhow::Result<IdentityKeyPair> {
    let [dsa, dsa_pub, kem, kem_pub, _] = paths(keys_dir);
    let read = |p: &Path, want: usize, label: &str| -> anyhow::Result<Vec<u8>> {
        let bytes = fs::read(p).with_context(|| format!("reading {}", p.display()))?;
        if bytes.len() != want {
            bail!("{label}: expected {want} bytes, got {}", bytes.len());
        }
        Ok(bytes)
    };

    let dsa_sk = read(&dsa, MLDSA_SECRET_KEY_BYTES, "identity.dsa")?;
    let dsa_pk = read(&dsa_pub, MLDSA_PUBLIC_KEY_BYTES, "identity.dsa.pub")?;
    let kem_sk = read(&kem, MLKEM_SECRET_KEY_BYTES, "identity.kem")?;
    let kem_pk = read(&kem_pub, MLKEM_PUBLIC_KEY_BYTES, "identity.kem.pub")?;

    Ok(IdentityKeyPair::from_raw(dsa_pk, dsa_sk, kem_pk, kem_sk))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let keys_dir = dir.path().join("keys");
        let created = create(&keys_dir).unwrap();
        assert!(exists(&keys_dir));
        let loaded = load(&keys_dir).unwrap();
        assert_eq!(loaded.fingerprint, created.fingerprint);
        assert_eq!(loaded.mlkem_public, created.mlkem_public);
    }

    #[test]
    fn create_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let keys_dir = dir.path().join("keys");
        create(&keys_dir).unwrap();
        assert!(create(&keys_dir).is_err());
    }

    #[test]
    fn fingerprint_file_matches_derived() {
        let dir = tempfile::tempdir().unwrap();
        let keys_dir = dir.path().join("keys");
        let keys = create(&keys_dir).unwrap();
        let txt = fs::read_to_string(keys_dir.join("fingerprint.txt")).unwrap();
        assert_eq!(txt.trim(), keys.fingerprint.to_hex());
    }
}
