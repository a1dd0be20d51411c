//! sigil-keyserver
//!
//! The client-facing core of the Sigil identity system: publish, resolve,
//! and update post-quantum identities over the two DHT namespaces
//! (`{fingerprint}:identity` and `{lower(name)}:lookup`), register and
//! renew on-chain-paid names, manage profiles, cache identities with
//! stale-while-revalidate, and run background lookups and listeners with
//! cooperative cancellation.

pub mod cache;
pub mod context;
pub mod keyserver;
pub mod listener;
pub mod profile;
pub mod registry;

pub use cache::IdentityCache;
pub use context::{Context, ContextConfig};
pub use keyserver::{alias_base_key, identity_base_key, KeyServer};
pub use listener::{
    listen_all_contacts, listen_identity, reverse_lookup_async, reverse_lookup_bulk, CancelToken,
    Dispatcher,
};
pub use profile::ProfileManager;
pub use registry::NameRegistry;
