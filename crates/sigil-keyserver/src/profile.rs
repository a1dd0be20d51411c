//! The profile manager: the mutable, short-lived face of an identity.
//!
//! Profile data (wallets, socials, bio, avatar) rides inside the identity
//! record under the 7-day class. Its freshness bound is the "death
//! privacy" property: an identity that stops updating disappears within a
//! week. Reads go through the stale-while-revalidate cache when one is
//! attached.

use std::sync::Arc;

use tracing::debug;

use sigil_core::error::SigilError;
use sigil_core::record::{IdentityRecord, ProfileData};
use sigil_core::types::{unix_now, Fingerprint};
use sigil_crypto::keypair::IdentityKeyPair;
use sigil_crypto::verify::{sign_record, verify_record};
use sigil_dht::overlay::Overlay;

use crate::context::Context;
use crate::keyserver::{fetch_identity, publish_record};

pub struct ProfileManager<O: Overlay> {
    ctx: Arc<Context<O>>,
}

impl<O: Overlay + 'static> ProfileManager<O> {
    pub fn new(ctx: Arc<Context<O>>) -> Self {
        Self { ctx }
    }

    /// Replace the profile fields of the caller's identity and republish.
    ///
    /// Works before any name registration: a missing record becomes an
    /// empty shell, so the first-ever profile publish is also the first
    /// publish of the identity.
    pub fn update_profile(
        &self,
        keys: &IdentityKeyPair,
        profile: ProfileData,
    ) -> Result<IdentityRecord, SigilError> {
        profile.validate()?;
        let now = unix_now();
        let mut record = match fetch_identity(&self.ctx, &keys.fingerprint, true) {
            Ok(existing) => existing,
            Err(SigilError::NotFound) => IdentityRecord::new(
                keys.fingerprint,
                keys.mldsa_public.clone(),
                keys.mlkem_public.clone(),
                now,
            ),
            Err(e) => return Err(e),
        };
        record.apply_profile(profile);
        record.bump(now);
        sign_record(&mut record, keys.mldsa_secret_bytes())?;
        publish_record(&self.ctx, &record)?;
        Ok(record)
    }

    /// Load an identity record, through the cache when one is attached.
    ///
    /// `verify = false` is for local display paths: the record is parsed
    /// but the cryptographic checks are skipped. `verify = true` is for
    /// trust-sensitive paths (contact resolution): the returned record has
    /// passed self-certification and signature verification, whether it
    /// came from the cache or the overlay.
    pub fn load_identity(
        &self,
        fingerprint: &Fingerprint,
        verify: bool,
    ) -> Result<IdentityRecord, SigilError> {
        if let Some(cache) = self.ctx.cache() {
            if let Some((record, age)) = cache.get(fingerprint) {
                if age > self.ctx.config().cache_freshness_secs {
                    self.spawn_refresh(*fingerprint);
                }
                if verify {
                    verify_record(&record)?;
                }
                return Ok(record);
            }
        }

        // Cache miss: verified fetches warm the cache on their way back.
        fetch_identity(&self.ctx, fingerprint, verify)
    }

    /// Display name for a fingerprint: registered name while owned,
    /// abbreviated fingerprint otherwise. Never fails.
    pub fn get_display_name(&self, fingerprint: &Fingerprint) -> String {
        match self.load_identity(fingerprint, false) {
            Ok(record) => record.display_name(unix_now()),
            Err(_) => fingerprint.short(),
        }
    }

    /// Enqueue a background cache refresh. Serving the stale entry
    /// continues meanwhile; subscribers hear about the refresh through the
    /// cache's event channel.
    fn spawn_refresh(&self, fingerprint: Fingerprint) {
        let ctx = Arc::clone(&self.ctx);
        let submitted = self.ctx.dispatcher().submit(Box::new(move || {
            // The verified fetch writes the cache and fires the event itself.
            if let Err(e) = fetch_identity(&ctx, &fingerprint, true) {
                debug!(fingerprint = %fingerprint, error = %e, "cache refresh failed");
            }
        }));
        if let Err(_job) = submitted {
            debug!(fingerprint = %fingerprint, "dispatcher closed; skipping cache refresh");
        }
    }
}
