pub mod hash;
pub mod keypair;
pub mod mldsa;
pub mod verify;

pub use hash::{fingerprint_from_pubkey, sha3_512, shake256};
pub use keypair::IdentityKeyPair;
pub use mldsa::{sign, verify_signature, SignatureError};
pub use verify::{sign_record, verify_record};
