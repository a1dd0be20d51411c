//! The explicit context handle every keyserver operation runs against.
//!
//! One `Context` per process, created by [`Context::init`] and torn down
//! by [`Context::close`]. It owns the overlay handle, the optional SWR
//! cache, and the dispatcher's bounded worker pool; there is no hidden
//! process-wide state anywhere in this crate.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use sigil_core::constants::{CACHE_FRESHNESS_SECS, LISTENER_POLL_SECS, MAX_CONCURRENT_LOOKUPS};
use sigil_core::error::SigilError;
use sigil_dht::overlay::Overlay;
use sigil_dht::value_type::register_standard_value_types;

use crate::cache::IdentityCache;
use crate::listener::Dispatcher;

#[derive(Clone, Debug)]
pub struct ContextConfig {
    /// Location of the sled SWR cache; `None` disables caching.
    pub cache_path: Option<PathBuf>,
    /// Bound on concurrent background lookups.
    pub max_concurrent_lookups: usize,
    /// Cached entries older than this trigger a background refresh.
    pub cache_freshness_secs: u64,
    /// Poll interval for key listeners.
    pub listener_poll_secs: u64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            cache_path: None,
            max_concurrent_lookups: MAX_CONCURRENT_LOOKUPS,
            cache_freshness_secs: CACHE_FRESHNESS_SECS,
            listener_poll_secs: LISTENER_POLL_SECS,
        }
    }
}

pub struct Context<O: Overlay> {
    overlay: Arc<O>,
    cache: Option<Arc<IdentityCache>>,
    dispatcher: Dispatcher,
    config: ContextConfig,
}

impl<O: Overlay + 'static> Context<O> {
    /// Initialise the keyserver context.
    ///
    /// Registers the standard value classes on the overlay before anything
    /// is published. A client that skips this publishes data that
    /// evaporates within the overlay's ~10 minute default window.
    pub fn init(overlay: Arc<O>, config: ContextConfig) -> Result<Arc<Self>, SigilError> {
        register_standard_value_types(overlay.as_ref())?;

        let cache = match &config.cache_path {
            Some(path) => Some(Arc::new(IdentityCache::open(path)?)),
            None => None,
        };
        let dispatcher = Dispatcher::new(config.max_concurrent_lookups)?;

        info!(
            cache = cache.is_some(),
            workers = config.max_concurrent_lookups,
            "keyserver context initialised"
        );
        Ok(Arc::new(Self {
            overlay,
            cache,
            dispatcher,
            config,
        }))
    }

    /// Cancel every active listener and stop accepting background work.
    /// In-flight DHT calls run to completion; their callbacks are
    /// suppressed. Idempotent.
    pub fn close(&self) {
        self.dispatcher.close();
        info!("keyserver context closed");
    }

    pub fn overlay(&self) -> &O {
        &self.overlay
    }

    pub fn cache(&self) -> Option<&Arc<IdentityCache>> {
        self.cache.as_ref()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }
}
