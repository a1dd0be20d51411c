//! The name registry: binding human-readable names to fingerprints,
//! gated by an on-chain payment.
//!
//! Names are first-writer-wins, arbitrated by the registration
//! transaction; there is no consensus beyond that. Ownership lasts one
//! period (365 days) and must be renewed with a fresh payment. The alias
//! record carries the year-long TTL class; the identity record keeps the
//! 7-day class so inactive identities still fade.

use std::sync::Arc;

use tracing::info;

use sigil_chain::verifier::{RegistrationCheck, TxOutcome};
use sigil_core::constants::{FIELD_NETWORK, FIELD_TX_HASH, NAME_OWNERSHIP_SECS};
use sigil_core::error::SigilError;
use sigil_core::record::IdentityRecord;
use sigil_core::types::{unix_now, RegisteredName, Timestamp};
use sigil_crypto::keypair::IdentityKeyPair;
use sigil_crypto::verify::sign_record;
use sigil_dht::chunk;
use sigil_dht::overlay::Overlay;
use sigil_dht::value_type::ValueClass;

use crate::context::Context;
use crate::keyserver::{alias_base_key, fetch_identity, publish_record, resolve_name};

pub struct NameRegistry<O: Overlay, V: RegistrationCheck> {
    ctx: Arc<Context<O>>,
    verifier: Arc<V>,
}

impl<O: Overlay + 'static, V: RegistrationCheck> NameRegistry<O, V> {
    pub fn new(ctx: Arc<Context<O>>, verifier: Arc<V>) -> Self {
        Self { ctx, verifier }
    }

    fn check_tx(&self, tx_hash: &str, network: &str, name: &str) -> Result<(), SigilError> {
        if tx_hash.is_empty() || tx_hash.len() > FIELD_TX_HASH {
            return Err(SigilError::InvalidInput(format!(
                "transaction hash must be 1-{FIELD_TX_HASH} bytes"
            )));
        }
        if network.is_empty() || network.len() > FIELD_NETWORK {
            return Err(SigilError::InvalidInput(format!(
                "network identifier must be 1-{FIELD_NETWORK} bytes"
            )));
        }
        match self.verifier.verify_registration_tx(tx_hash, network, name) {
            TxOutcome::Accepted => Ok(()),
            TxOutcome::ValidationFailed(reason) => Err(SigilError::VerificationFailed(reason)),
            TxOutcome::RpcError(reason) => Err(SigilError::RpcError(reason)),
        }
    }

    /// Register `raw_name` to the caller's identity.
    ///
    /// The payment check runs before the collision probe. A name resolving
    /// to the caller's own fingerprint is a permitted re-registration; any
    /// other resolution is `NameTaken`.
    pub fn register(
        &self,
        keys: &IdentityKeyPair,
        raw_name: &str,
        tx_hash: &str,
        network: &str,
    ) -> Result<IdentityRecord, SigilError> {
        let name = RegisteredName::parse(raw_name)?;
        self.check_tx(tx_hash, network, name.as_str())?;

        match resolve_name(&self.ctx, &name) {
            Ok(owner) if owner != keys.fingerprint => {
                return Err(SigilError::NameTaken {
                    name: name.as_str().to_string(),
                });
            }
            Ok(_) | Err(SigilError::NotFound) => {}
            Err(e) => return Err(e),
        }

        let now = unix_now();
        let mut record = self.load_or_shell(keys, now)?;
        record.has_registered_name = true;
        record.registered_name = name.as_str().to_string();
        record.name_registered_at = now;
        record.name_expires_at = now + NAME_OWNERSHIP_SECS;
        record.registration_tx_hash = tx_hash.to_string();
        record.registration_network = network.to_string();
        record.name_version = 1;
        record.bump(now);
        sign_record(&mut record, keys.mldsa_secret_bytes())?;

        publish_record(&self.ctx, &record)?;
        self.write_alias(&name, keys)?;

        info!(name = %name, fingerprint = %keys.fingerprint, "name registered");
        Ok(record)
    }

    /// Extend an existing name binding by one ownership period against a
    /// fresh payment on the originally registered network.
    pub fn renew(&self, keys: &IdentityKeyPair, tx_hash: &str) -> Result<IdentityRecord, SigilError> {
        let mut record = fetch_identity(&self.ctx, &keys.fingerprint, true)?;
        if !record.has_registered_name {
            return Err(SigilError::InvalidInput(
                "identity has no registered name to renew".into(),
            ));
        }
        let name = RegisteredName::new(&record.registered_name)?;
        let network = record.registration_network.clone();
        self.check_tx(tx_hash, &network, name.as_str())?;

        record.name_expires_at += NAME_OWNERSHIP_SECS;
        record.registration_tx_hash = tx_hash.to_string();
        record.name_version += 1;
        record.bump(unix_now());
        sign_record(&mut record, keys.mldsa_secret_bytes())?;

        publish_record(&self.ctx, &record)?;
        // Restart the alias TTL so the mapping outlives the extension.
        self.write_alias(&name, keys)?;

        info!(name = %name, expires_at = record.name_expires_at, "name renewed");
        Ok(record)
    }

    /// True once the record's name claim has lapsed. Readers must refuse
    /// to serve an expired name as a display.
    pub fn is_expired(record: &IdentityRecord, now: Timestamp) -> bool {
        record.is_name_expired(now)
    }

    fn load_or_shell(
        &self,
        keys: &IdentityKeyPair,
        now: Timestamp,
    ) -> Result<IdentityRecord, SigilError> {
        match fetch_identity(&self.ctx, &keys.fingerprint, true) {
            Ok(existing) => Ok(existing),
            Err(SigilError::NotFound) => Ok(IdentityRecord::new(
                keys.fingerprint,
                keys.mldsa_public.clone(),
                keys.mlkem_public.clone(),
                now,
            )),
            Err(e) => Err(e),
        }
    }

    fn write_alias(&self, name: &RegisteredName, keys: &IdentityKeyPair) -> Result<(), SigilError> {
        chunk::publish(
            self.ctx.overlay(),
            &alias_base_key(name),
            keys.fingerprint.to_hex().as_bytes(),
            ValueClass::YearLong,
        )
    }
}
