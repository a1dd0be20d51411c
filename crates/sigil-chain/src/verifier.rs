//! Registration-transaction verification.
//!
//! A name binding is gated on a payment recorded on one of the configured
//! chains. The verifier fetches the transaction over JSON-RPC 2.0 (raw
//! HTTP POST with serde_json rather than a full RPC client, to keep the
//! dependency surface lean) and checks three things: the recipient is the
//! registrar address, the amount covers the registration fee, and the memo
//! carries the lowercase name being bought.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tracing::debug;

use sigil_core::constants::CHAIN_RPC_MIN_INTERVAL_SECS;

use crate::rate::RateGate;

/// Result of checking one registration transaction.
///
/// `ValidationFailed` is a user error (wrong amount, memo, or recipient);
/// `RpcError` is transient and the caller may retry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxOutcome {
    Accepted,
    ValidationFailed(String),
    RpcError(String),
}

/// The one question this crate answers, as a trait so tests and offline
/// tooling can substitute their own arbiter.
pub trait RegistrationCheck: Send + Sync {
    fn verify_registration_tx(&self, tx_hash: &str, network: &str, name: &str) -> TxOutcome;
}

// ── Production verifier ──────────────────────────────────────────────────────

/// Per-network chain parameters.
#[derive(Clone, Debug)]
pub struct NetworkConfig {
    pub rpc_url: String,
    /// Address registration payments must be sent to.
    pub registrar_address: String,
    /// Minimum payment amount, in the chain's base unit.
    pub registration_fee: u64,
}

pub struct ChainVerifier {
    networks: HashMap<String, NetworkConfig>,
    client: reqwest::blocking::Client,
    gate: RateGate,
}

impl ChainVerifier {
    pub fn new(networks: HashMap<String, NetworkConfig>) -> Self {
        Self {
            networks,
            client: reqwest::blocking::Client::new(),
            gate: RateGate::new(Duration::from_secs(CHAIN_RPC_MIN_INTERVAL_SECS)),
        }
    }

    /// Call a JSON-RPC method and return the `result` field.
    fn call(
        &self,
        url: &str,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, String> {
        self.gate.wait(url);
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });
        let resp = self
            .client
            .post(url)
            .json(&body)
            .send()
            .map_err(|e| format!("connecting to {url}: {e}"))?;
        let json: serde_json::Value = resp.json().map_err(|e| format!("parsing response: {e}"))?;
        if let Some(err) = json.get("error") {
            return Err(format!("RPC error: {err}"));
        }
        Ok(json["result"].clone())
    }
}

impl RegistrationCheck for ChainVerifier {
    fn verify_registration_tx(&self, tx_hash: &str, network: &str, name: &str) -> TxOutcome {
        let config = match self.networks.get(network) {
            Some(c) => c,
            None => {
                return TxOutcome::ValidationFailed(format!("unknown network {network:?}"));
            }
        };

        let tx = match self.call(
            &config.rpc_url,
            "chain_getTransaction",
            serde_json::json!([tx_hash]),
        ) {
            Ok(result) => result,
            Err(e) => return TxOutcome::RpcError(e),
        };
        if tx.is_null() {
            return TxOutcome::ValidationFailed(format!("transaction {tx_hash} not found"));
        }

        let recipient = tx["recipient"].as_str().unwrap_or_default();
        if recipient != config.registrar_address {
            return TxOutcome::ValidationFailed(format!(
                "recipient {recipient} is not the registrar"
            ));
        }

        let amount = tx["amount"].as_u64().unwrap_or(0);
        if amount < config.registration_fee {
            return TxOutcome::ValidationFailed(format!(
                "amount {amount} below registration fee {}",
                config.registration_fee
            ));
        }

        let memo = tx["memo"].as_str().unwrap_or_default();
        if memo != name {
            return TxOutcome::ValidationFailed(format!(
                "memo {memo:?} does not carry the registered name"
            ));
        }

        debug!(tx_hash, network, name, "registration transaction accepted");
        TxOutcome::Accepted
    }
}

// ── Test double ──────────────────────────────────────────────────────────────

/// In-memory arbiter: accepts exactly the `(tx_hash, network, name)`
/// triples it has been told about. Flip `set_offline` to simulate a chain
/// endpoint outage.
#[derive(Default)]
pub struct StaticVerifier {
    accepted: Mutex<Vec<(String, String, String)>>,
    offline: Mutex<bool>,
}

impl StaticVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept(&self, tx_hash: &str, network: &str, name: &str) {
        self.accepted.lock().expect("verifier lock poisoned").push((
            tx_hash.to_string(),
            network.to_string(),
            name.to_string(),
        ));
    }

    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock().expect("verifier lock poisoned") = offline;
    }
}

impl RegistrationCheck for StaticVerifier {
    fn verify_registration_tx(&self, tx_hash: &str, network: &str, name: &str) -> TxOutcome {
        if *self.offline.lock().expect("verifier lock poisoned") {
            return TxOutcome::RpcError("chain endpoint offline".into());
        }
        let known = self.accepted.lock().expect("verifier lock poisoned");
        if known
            .iter()
            .any(|(t, c, n)| t == tx_hash && c == network && n == name)
        {
            TxOutcome::Accepted
        } else {
            TxOutcome::ValidationFailed("no matching registration payment".into())
        }
    }
}
