//! Assertion validation error types.

use crate::jws::TokenError;

/// Errors from validating a client-signed assertion.
///
/// Every variant is a client error. `BadSignature` and
/// `PayloadBindingMismatch` are cryptographic failures; the rest are
/// malformed input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum AssertionError {
    /// The token is not a well-formed ES256 compact JWS.
    #[error("malformed assertion: {0}")]
    MalformedAssertion(#[from] TokenError),

    /// The header has no embedded `jwk`.
    #[error("assertion header has no jwk")]
    MissingKey,

    /// The embedded key is not an EC P-256 public key.
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    /// The signature does not verify under the embedded key.
    #[error("invalid assertion signature")]
    BadSignature,

    /// `payload.hash` does not match the request parameters.
    #[error("payload hash does not match request parameters")]
    PayloadBindingMismatch,
}
