//! Certificate error types.

use crate::identity::KeyError;
use crate::jws::TokenError;

/// Errors from issuing or verifying a certificate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum CertError {
    /// Server key material could not be loaded. Fatal.
    #[error("server key unavailable: {0}")]
    KeyLoad(#[from] KeyError),

    /// The nested certificate is not a well-formed token.
    #[error("malformed certificate: {0}")]
    Malformed(#[from] TokenError),

    /// The certificate names a signing key other than the server's.
    #[error("certificate signed by unknown key")]
    UnknownSigner,

    /// The certificate signature does not verify under the server key.
    #[error("invalid certificate signature")]
    BadSignature,

    /// The certificate was issued by someone else.
    #[error("unexpected certificate issuer")]
    WrongIssuer,

    /// A certificate of one class was placed in another class's slot.
    #[error("certificate class mismatch in {slot}")]
    ClassMismatch { slot: &'static str },

    /// `cnf.jwk` is not the key that signed the outer assertion.
    #[error("certificate is bound to a different key")]
    IdentityMismatch,

    /// `now >= exp`.
    #[error("certificate expired")]
    CertificateExpired,
}
