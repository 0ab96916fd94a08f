//! Recovery error types.

use crate::cert::CertError;
use crate::identity::KeyError;
use crate::jws::TokenError;
use crate::replay::ReplayCacheFull;

/// Errors from issuing or redeeming a recovery token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum RecoveryError {
    /// An account id is empty or blank.
    #[error("account id is required")]
    MissingAccountId,

    /// Server key material could not be loaded. Fatal.
    #[error("server key unavailable: {0}")]
    KeyLoad(#[from] KeyError),

    #[error("malformed recovery token: {0}")]
    Malformed(#[from] TokenError),

    #[error("invalid recovery token signature")]
    BadSignature,

    /// `sub` is not `RecoveryToken` or `iss` is not this server.
    #[error("not a recovery token")]
    NotRecoveryToken,

    #[error("recovery token expired")]
    Expired,

    /// The token was issued for a different new account.
    #[error("claiming account id mismatch")]
    ClaimMismatch,

    #[error("recovery token already redeemed")]
    AlreadyRedeemed,

    /// No room to record the token as redeemed. Retry later.
    #[error(transparent)]
    ReplayCacheFull(#[from] ReplayCacheFull),

    /// Issuing the replacement KYC certificate failed.
    #[error(transparent)]
    Certificate(#[from] CertError),
}
