pub mod codec;
pub mod constants;
pub mod error;
pub mod record;
pub mod types;

pub use codec::{canonical_signing_bytes, CANONICAL_MESSAGE_LEN};
pub use constants::*;
pub use error::{Invariant, SigilError};
pub use record::{IdentityRecord, ProfileData, SocialHandles, WalletSet};
pub use types::*;
