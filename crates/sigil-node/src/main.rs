//! sigil-node — the Sigil keyserver node and client CLI.
//!
//! Startup sequence:
//!   1. Load (or create) the DHT node identity
//!   2. Register the standard value classes on the overlay
//!   3. Open the identity cache
//!   4. Run the requested client operation
//!
//! Usage:
//!   sigil-node init
//!   sigil-node node-id
//!   sigil-node publish
//!   sigil-node lookup <name-or-fingerprint>
//!   sigil-node register <name> --tx <hash> --network <net>
//!   sigil-node renew --tx <hash>
//!   sigil-node update-profile [--bio <text>] [--x <handle>] ...
//!   sigil-node display-name <fingerprint-hex>

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context as _};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use sigil_chain::{ChainVerifier, NetworkConfig};
use sigil_core::record::ProfileData;
use sigil_core::types::Fingerprint;
use sigil_dht::{MemoryOverlay, NodeIdentity};
use sigil_keyserver::{Context, ContextConfig, KeyServer, NameRegistry, ProfileManager};

mod keystore;

// ── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "sigil-node",
    version,
    about = "Sigil keyserver — post-quantum identities on a DHT"
)]
struct Args {
    /// Directory for keys, node identity, and the identity cache.
    #[arg(long, global = true, default_value = "~/.sigil")]
    data_dir: PathBuf,

    /// Chain RPC endpoint used to verify registration payments.
    #[arg(long, global = true, default_value = "http://127.0.0.1:8545")]
    chain_rpc: String,

    /// Registrar address registration payments must be sent to.
    #[arg(long, global = true, default_value = "bb1qregistrar")]
    registrar: String,

    /// Registration fee in the chain's base unit.
    #[arg(long, global = true, default_value_t = 1_000_000)]
    fee: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the node identity and the user identity keystore.
    Init,

    /// Print the DHT node identity.
    NodeId,

    /// Publish the local identity record (no name, empty profile).
    Publish,

    /// Resolve a name or fingerprint to a verified identity record.
    Lookup {
        /// Registered name or 128-hex-char fingerprint.
        query: String,
    },

    /// Register a name to the local identity (requires an on-chain payment).
    Register {
        /// Name to register (3-20 chars of [a-z0-9_]).
        name: String,
        /// Hash of the registration payment transaction.
        #[arg(long)]
        tx: String,
        /// Chain the payment lives on.
        #[arg(long, default_value = "backbone")]
        network: String,
    },

    /// Renew the local identity's registered name for another year.
    Renew {
        /// Hash of the renewal payment transaction.
        #[arg(long)]
        tx: String,
    },

    /// Replace the local identity's profile and republish.
    UpdateProfile {
        #[arg(long)]
        bio: Option<String>,
        #[arg(long)]
        x: Option<String>,
        #[arg(long)]
        github: Option<String>,
        #[arg(long)]
        telegram: Option<String>,
        #[arg(long)]
        matrix: Option<String>,
        /// IPFS CID of the profile picture.
        #[arg(long)]
        picture: Option<String>,
        /// Path to an avatar file, embedded base64.
        #[arg(long)]
        avatar: Option<PathBuf>,
    },

    /// Print the display name for a fingerprint.
    DisplayName {
        /// Fingerprint (128 hex chars).
        fingerprint: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sigil=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let data_dir = expand_tilde(&args.data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data dir {}", data_dir.display()))?;
    let keys_dir = data_dir.join("keys");

    // ── Node identity ─────────────────────────────────────────────────────────
    let node_identity = NodeIdentity::load_or_create(&data_dir.join("dht"), "node")
        .map_err(|e| anyhow::anyhow!("node identity: {e}"))?;

    if let Command::Init = args.command {
        if keystore::exists(&keys_dir) {
            bail!("already initialised at {}", data_dir.display());
        }
        let keys = keystore::create(&keys_dir)?;
        println!("fingerprint: {}", keys.fingerprint);
        return Ok(());
    }

    // ── Overlay + context ─────────────────────────────────────────────────────
    // In-process overlay: a development harness, not a network. Wire a real
    // Kademlia client behind the Overlay trait for deployment.
    warn!("using the in-process overlay — data does not leave this process");
    let overlay = Arc::new(MemoryOverlay::new());
    let config = ContextConfig {
        cache_path: Some(data_dir.join("cache").join("identity_cache.db")),
        ..ContextConfig::default()
    };
    let ctx = Context::init(overlay, config).map_err(|e| anyhow::anyhow!("context: {e}"))?;
    info!("keyserver ready");

    let result = run(&args, &ctx, &node_identity, &keys_dir);
    ctx.close();
    result
}

fn run(
    args: &Args,
    ctx: &Arc<Context<MemoryOverlay>>,
    node_identity: &NodeIdentity,
    keys_dir: &Path,
) -> anyhow::Result<()> {
    let server = KeyServer::new(Arc::clone(ctx));

    match &args.command {
        Command::Init => unreachable!("handled before context setup"),

        Command::NodeId => {
            println!("public key:  {}", hex::encode(&node_identity.public_key.0));
            println!("cert issued: {}", node_identity.certificate.issued_at);
            println!("cert expires: {}", node_identity.certificate.expires_at);
        }

        Command::Publish => {
            let keys = keystore::load(keys_dir)?;
            let record = server
                .publish(
                    &keys.fingerprint,
                    &keys.mldsa_public,
                    &keys.mlkem_public,
                    keys.mldsa_secret_bytes(),
                )
                .map_err(|e| anyhow::anyhow!("publish: {e}"))?;
            println!("published {} (version {})", record.fingerprint, record.version);
        }

        Command::Lookup { query } => {
            let record = server
                .lookup(query)
                .map_err(|e| anyhow::anyhow!("lookup: {e}"))?;
            println!("{}", record.to_json_unsigned().map_err(|e| anyhow::anyhow!("{e}"))?);
        }

        Command::Register { name, tx, network } => {
            let keys = keystore::load(keys_dir)?;
            let registry = NameRegistry::new(Arc::clone(ctx), Arc::new(chain_verifier(args)));
            let record = registry
                .register(&keys, name, tx, network)
                .map_err(|e| anyhow::anyhow!("register: {e}"))?;
            println!(
                "registered {:?} until {}",
                record.registered_name, record.name_expires_at
            );
        }

        Command::Renew { tx } => {
            let keys = keystore::load(keys_dir)?;
            let registry = NameRegistry::new(Arc::clone(ctx), Arc::new(chain_verifier(args)));
            let record = registry
                .renew(&keys, tx)
                .map_err(|e| anyhow::anyhow!("renew: {e}"))?;
            println!(
                "renewed {:?} until {} (name version {})",
                record.registered_name, record.name_expires_at, record.name_version
            );
        }

        Command::UpdateProfile {
            bio,
            x,
            github,
            telegram,
            matrix,
            picture,
            avatar,
        } => {
            let keys = keystore::load(keys_dir)?;
            let profiles = ProfileManager::new(Arc::clone(ctx));

            // Start from the current profile so unset flags keep their value.
            let mut profile = profiles
                .load_identity(&keys.fingerprint, false)
                .map(|r| r.profile())
                .unwrap_or_else(|_| ProfileData::default());
            if let Some(v) = bio {
                profile.bio = v.clone();
            }
            if let Some(v) = x {
                profile.socials.x = v.clone();
            }
            if let Some(v) = github {
                profile.socials.github = v.clone();
            }
            if let Some(v) = telegram {
                profile.socials.telegram = v.clone();
            }
            if let Some(v) = matrix {
                profile.socials.matrix = v.clone();
            }
            if let Some(v) = picture {
                profile.profile_picture_ipfs = v.clone();
            }
            if let Some(path) = avatar {
                let bytes = std::fs::read(path)
                    .with_context(|| format!("reading avatar {}", path.display()))?;
                profile.avatar_base64 = BASE64.encode(&bytes);
            }

            let record = profiles
                .update_profile(&keys, profile)
                .map_err(|e| anyhow::anyhow!("update-profile: {e}"))?;
            println!("profile updated (version {})", record.version);
        }

        Command::DisplayName { fingerprint } => {
            let fingerprint = Fingerprint::from_hex(fingerprint.trim())
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            println!("{}", server.reverse_lookup(&fingerprint));
        }
    }
    Ok(())
}

fn chain_verifier(args: &Args) -> ChainVerifier {
    let mut networks = HashMap::new();
    networks.insert(
        "backbone".to_string(),
        NetworkConfig {
            rpc_url: args.chain_rpc.clone(),
            registrar_address: args.registrar.clone(),
            registration_fee: args.fee,
        },
    );
    ChainVerifier::new(networks)
}

/// Expand a leading `~` to the user's home directory (`HOME` or `USERPROFILE`).
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::expand_tilde;
    use std::path::Path;

    #[test]
    fn tilde_expansion() {
        std::env::set_var("HOME", "/home/tester");
        assert_eq!(
            expand_tilde(Path::new("~/.sigil")),
            Path::new("/home/tester/.sigil")
        );
        assert_eq!(expand_tilde(Path::new("/abs/path")), Path::new("/abs/path"));
    }
}
