//! sigil-chain
//!
//! The on-chain side of name registration: a JSON-RPC client that checks a
//! registration payment's recipient, amount, and memo, and the process-wide
//! rate gate in front of it. The chain itself is an external collaborator;
//! this crate only asks it one question.

pub mod rate;
pub mod verifier;

pub use rate::RateGate;
pub use verifier::{ChainVerifier, NetworkConfig, RegistrationCheck, StaticVerifier, TxOutcome};
