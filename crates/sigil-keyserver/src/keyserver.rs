//! The keyserver: publish, lookup, update, and reverse-lookup over the
//! two DHT namespaces.
//!
//! Identity records live under `{fingerprint}:identity`, name aliases
//! under `{lower(name)}:lookup`. Every trust-sensitive read runs the full
//! verification ladder: parse, self-certification, signature, then
//! newest-valid selection by timestamp, plus, for name queries, the
//! alias-binding check on top.

use std::sync::Arc;

use tracing::{debug, warn};

use sigil_core::constants::{FINGERPRINT_HEX_LEN, IDENTITY_KEY_SUFFIX, LOOKUP_KEY_SUFFIX};
use sigil_core::error::SigilError;
use sigil_core::record::IdentityRecord;
use sigil_core::types::{unix_now, Fingerprint, MlDsaPublicKey, MlKemPublicKey, RegisteredName};
use sigil_crypto::hash::fingerprint_from_pubkey;
use sigil_crypto::verify::{sign_record, verify_record};
use sigil_dht::chunk;
use sigil_dht::overlay::Overlay;
use sigil_dht::value_type::ValueClass;

use crate::context::Context;

// ── Key namespaces ───────────────────────────────────────────────────────────

pub fn identity_base_key(fingerprint: &Fingerprint) -> String {
    format!("{}{}", fingerprint.to_hex(), IDENTITY_KEY_SUFFIX)
}

pub fn alias_base_key(name: &RegisteredName) -> String {
    format!("{}{}", name.as_str(), LOOKUP_KEY_SUFFIX)
}

// ── Record-set resolution ────────────────────────────────────────────────────

/// Select the newest usable record from a DHT value set.
///
/// Values that fail to parse, belong to a different fingerprint, or (when
/// verifying) fail the cryptographic checks are discarded one by one; a
/// bad value never aborts the read. Whole records are the unit: fields
/// are never mixed across candidates.
fn select_newest_valid(
    blobs: Vec<Vec<u8>>,
    expected: &Fingerprint,
    verify: bool,
) -> Result<IdentityRecord, SigilError> {
    let mut best: Option<IdentityRecord> = None;
    let mut first_violation: Option<SigilError> = None;

    for blob in blobs {
        let record = match IdentityRecord::from_json_bytes(&blob) {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, "discarding unparseable identity value");
                continue;
            }
        };
        if record.fingerprint != *expected {
            warn!(
                got = %record.fingerprint,
                "discarding identity value stored under a foreign key"
            );
            continue;
        }
        if verify {
            if let Err(e) = verify_record(&record) {
                debug!(error = %e, timestamp = record.timestamp, "discarding unverifiable record");
                first_violation.get_or_insert(e);
                continue;
            }
        }
        if best.as_ref().map(|b| record.timestamp > b.timestamp).unwrap_or(true) {
            best = Some(record);
        }
    }

    match (best, first_violation) {
        (Some(record), _) => Ok(record),
        // Values existed but none survived verification: surface the
        // invariant violation rather than pretending the key is empty.
        (None, Some(violation)) => Err(violation),
        (None, None) => Err(SigilError::NotFound),
    }
}

/// Fetch and resolve the identity record set for `fingerprint`.
///
/// Verified reads warm the SWR cache; display-only parses never enter it.
pub(crate) fn fetch_identity<O: Overlay + 'static>(
    ctx: &Context<O>,
    fingerprint: &Fingerprint,
    verify: bool,
) -> Result<IdentityRecord, SigilError> {
    let blobs = chunk::fetch_all(ctx.overlay(), &identity_base_key(fingerprint))?;
    if blobs.is_empty() {
        return Err(SigilError::NotFound);
    }
    let record = select_newest_valid(blobs, fingerprint, verify)?;
    if verify {
        if let Some(cache) = ctx.cache() {
            // A cache write failure never fails the read itself.
            if let Err(e) = cache.insert(fingerprint, &record) {
                warn!(error = %e, "identity cache write failed");
            }
        }
    }
    Ok(record)
}

/// Serialize and publish an identity record under the 7-day class, then
/// refresh the cache. The short TTL is deliberate: identities that stop
/// republishing fade from the overlay.
pub(crate) fn publish_record<O: Overlay + 'static>(
    ctx: &Context<O>,
    record: &IdentityRecord,
) -> Result<(), SigilError> {
    if !ctx.overlay().is_ready() {
        return Err(SigilError::DhtError("overlay has no good nodes yet".into()));
    }
    let json = record.to_json()?;
    chunk::publish(
        ctx.overlay(),
        &identity_base_key(&record.fingerprint),
        json.as_bytes(),
        ValueClass::SevenDay,
    )?;
    if let Some(cache) = ctx.cache() {
        cache.insert(&record.fingerprint, record)?;
    }
    debug!(
        fingerprint = %record.fingerprint,
        version = record.version,
        "published identity record"
    );
    Ok(())
}

/// Resolve a name alias to a fingerprint. The alias value must be exactly
/// the 128-byte lowercase-hex fingerprint; anything else is absence.
pub(crate) fn resolve_name<O: Overlay + 'static>(
    ctx: &Context<O>,
    name: &RegisteredName,
) -> Result<Fingerprint, SigilError> {
    let bytes = chunk::fetch(ctx.overlay(), &alias_base_key(name))?;
    if bytes.len() != FINGERPRINT_HEX_LEN {
        debug!(name = %name, len = bytes.len(), "alias value has wrong length");
        return Err(SigilError::NotFound);
    }
    let hex = std::str::from_utf8(&bytes).map_err(|_| SigilError::NotFound)?;
    Fingerprint::from_hex(hex).map_err(|_| SigilError::NotFound)
}

// ── KeyServer ────────────────────────────────────────────────────────────────

/// The public keyserver surface, composed around a shared [`Context`].
pub struct KeyServer<O: Overlay> {
    ctx: Arc<Context<O>>,
}

impl<O: Overlay + 'static> KeyServer<O> {
    pub fn new(ctx: Arc<Context<O>>) -> Self {
        Self { ctx }
    }

    /// First publication of an identity: no name, empty profile,
    /// version 1. The fingerprint must be the SHA3-512 of the signing key
    /// being published; anything else is rejected before touching the
    /// overlay.
    pub fn publish(
        &self,
        fingerprint: &Fingerprint,
        mldsa_pubkey: &MlDsaPublicKey,
        mlkem_pubkey: &MlKemPublicKey,
        signer_sk: &[u8],
    ) -> Result<IdentityRecord, SigilError> {
        if fingerprint_from_pubkey(&mldsa_pubkey.0) != *fingerprint {
            return Err(SigilError::InvalidFingerprint(
                "fingerprint is not SHA3-512 of the signing key".into(),
            ));
        }
        let mut record = IdentityRecord::new(
            *fingerprint,
            mldsa_pubkey.clone(),
            mlkem_pubkey.clone(),
            unix_now(),
        );
        sign_record(&mut record, signer_sk)?;
        publish_record(&self.ctx, &record)?;
        Ok(record)
    }

    /// Resolve a name or fingerprint to a verified identity record.
    ///
    /// A 128-hex-digit input is a fingerprint; everything else is
    /// normalized and resolved through the alias namespace, and the
    /// resulting identity must actually own the queried name. A lapsed or
    /// mismatched binding reads as absence, not as an error.
    pub fn lookup(&self, name_or_fingerprint: &str) -> Result<IdentityRecord, SigilError> {
        let query = name_or_fingerprint.trim().to_lowercase();

        if Fingerprint::looks_like_hex(&query) {
            let fingerprint = Fingerprint::from_hex(&query)?;
            return fetch_identity(&self.ctx, &fingerprint, true);
        }

        let name = RegisteredName::new(&query)?;
        let fingerprint = resolve_name(&self.ctx, &name)?;
        let record = fetch_identity(&self.ctx, &fingerprint, true)?;
        if !record.owns_name(unix_now()) || record.registered_name != name.as_str() {
            debug!(name = %name, fingerprint = %fingerprint, "stale alias binding");
            return Err(SigilError::NotFound);
        }
        Ok(record)
    }

    /// Republish an identity with (possibly) fresh key material. The new
    /// signing key must still hash to the same fingerprint; fingerprints
    /// are immutable, so only the KEM key is really replaceable. Carries
    /// over the name binding and profile of the previous record when one
    /// exists.
    pub fn update(
        &self,
        fingerprint: &Fingerprint,
        mldsa_pubkey: &MlDsaPublicKey,
        mlkem_pubkey: &MlKemPublicKey,
        signer_sk: &[u8],
    ) -> Result<IdentityRecord, SigilError> {
        if fingerprint_from_pubkey(&mldsa_pubkey.0) != *fingerprint {
            return Err(SigilError::InvalidFingerprint(
                "fingerprint is not SHA3-512 of the signing key".into(),
            ));
        }
        let mut record = match fetch_identity(&self.ctx, fingerprint, true) {
            Ok(existing) => existing,
            // No prior record is fine: update degrades to a first publish.
            Err(SigilError::NotFound) => IdentityRecord::new(
                *fingerprint,
                mldsa_pubkey.clone(),
                mlkem_pubkey.clone(),
                unix_now(),
            ),
            Err(e) => return Err(e),
        };
        record.mldsa_pubkey = mldsa_pubkey.clone();
        record.mlkem_pubkey = mlkem_pubkey.clone();
        record.bump(unix_now());
        sign_record(&mut record, signer_sk)?;
        publish_record(&self.ctx, &record)?;
        Ok(record)
    }

    /// Display string for a fingerprint: the registered name while owned,
    /// otherwise the abbreviated fingerprint. Never fails: display paths
    /// skip verification and absence falls back to the short form.
    pub fn reverse_lookup(&self, fingerprint: &Fingerprint) -> String {
        match fetch_identity(&self.ctx, fingerprint, false) {
            Ok(record) => record.display_name(unix_now()),
            Err(_) => fingerprint.short(),
        }
    }

    pub fn context(&self) -> &Arc<Context<O>> {
        &self.ctx
    }
}
