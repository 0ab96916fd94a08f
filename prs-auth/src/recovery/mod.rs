//! Account recovery tokens.
//!
//! A recovery token links an old account identity to a new one. It is
//! signed by the server, presented in the `recoveryJwt` header slot of a
//! client assertion, and redeemed once for a KYC certificate bound to the
//! presenting key.

mod error;
mod token;

pub use error::RecoveryError;
pub use token::{RecoveryClaims, RecoveryOutcome, RecoveryTokens, RECOVERY_SUBJECT};
