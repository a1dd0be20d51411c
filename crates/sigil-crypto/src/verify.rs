//! Record-level signing and verification: the self-certification and
//! signature checks every trust-sensitive read must pass.

use sigil_core::error::{Invariant, SigilError};
use sigil_core::record::IdentityRecord;

use crate::hash::fingerprint_from_pubkey;
use crate::mldsa;

/// Sign `record` in place: serialize the canonical message and attach an
/// ML-DSA-87 signature. The record's version/timestamp must already be
/// final; any later mutation invalidates the signature.
pub fn sign_record(record: &mut IdentityRecord, secret_key: &[u8]) -> Result<(), SigilError> {
    let message = record.signing_bytes()?;
    record.signature =
        mldsa::sign(secret_key, &message).map_err(|e| SigilError::SignFailed(e.to_string()))?;
    Ok(())
}

/// Verify a record against its own embedded key material: SHA3-512 of the
/// signing key must equal the fingerprint, and the signature must verify
/// over the canonical message.
///
/// An invariant failure is terminal for this record; callers discard it
/// and never retry.
pub fn verify_record(record: &IdentityRecord) -> Result<(), SigilError> {
    if fingerprint_from_pubkey(&record.mldsa_pubkey.0) != record.fingerprint {
        return Err(SigilError::InvariantViolation(Invariant::SelfCertification));
    }
    let message = record.signing_bytes()?;
    mldsa::verify_signature(&record.mldsa_pubkey, &message, &record.signature)
        .map_err(|_| SigilError::InvariantViolation(Invariant::Signature))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypair::IdentityKeyPair;
    use sigil_core::error::Invariant;
    use sigil_core::types::Fingerprint;

    fn signed_record(kp: &IdentityKeyPair) -> IdentityRecord {
        let mut record = IdentityRecord::new(
            kp.fingerprint,
            kp.mldsa_public.clone(),
            kp.mlkem_public.clone(),
            1_700_000_000,
        );
        sign_record(&mut record, kp.mldsa_secret_bytes()).unwrap();
        record
    }

    #[test]
    fn signed_record_verifies() {
        let kp = IdentityKeyPair::generate();
        let record = signed_record(&kp);
        assert!(verify_record(&record).is_ok());
    }

    #[test]
    fn any_field_mutation_breaks_i2() {
        let kp = IdentityKeyPair::generate();

        let mut record = signed_record(&kp);
        record.bio = "tampered".into();
        assert!(matches!(
            verify_record(&record),
            Err(SigilError::InvariantViolation(Invariant::Signature))
        ));

        let mut record = signed_record(&kp);
        record.timestamp += 1;
        assert!(verify_record(&record).is_err());

        let mut record = signed_record(&kp);
        record.version += 1;
        assert!(verify_record(&record).is_err());
    }

    #[test]
    fn signature_mutation_breaks_i2() {
        let kp = IdentityKeyPair::generate();
        let mut record = signed_record(&kp);
        record.signature.0[0] ^= 0xff;
        assert!(matches!(
            verify_record(&record),
            Err(SigilError::InvariantViolation(Invariant::Signature))
        ));
    }

    #[test]
    fn foreign_fingerprint_breaks_i1() {
        let kp = IdentityKeyPair::generate();
        let mut record = signed_record(&kp);
        record.fingerprint = Fingerprint::from_bytes([0u8; 64]);
        assert!(matches!(
            verify_record(&record),
            Err(SigilError::InvariantViolation(Invariant::SelfCertification))
        ));
    }

    #[test]
    fn substituted_key_breaks_i1() {
        // Mallory re-signs Alice's record with her own key; the fingerprint
        // no longer matches the embedded pubkey.
        let alice = IdentityKeyPair::generate();
        let mallory = IdentityKeyPair::generate();
        let mut record = signed_record(&alice);
        record.mldsa_pubkey = mallory.mldsa_public.clone();
        sign_record(&mut record, mallory.mldsa_secret_bytes()).unwrap();
        assert!(matches!(
            verify_record(&record),
            Err(SigilError::InvariantViolation(Invariant::SelfCertification))
        ));
    }
}
