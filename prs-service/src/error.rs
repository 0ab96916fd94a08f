//! Service errors and their classification.

use prs_auth::{
    AssertionError, CertError, EnrollmentError, HashError, KeyError, RecoveryError,
};
use prs_core::{Role, ValidationError};

use crate::mail::MailError;
use crate::store::StoreError;

/// How a failure is reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Bad input or failed proof: do not retry with the same material.
    Client,
    /// Nonce window, OTP or certificate lifetime elapsed: retry with fresh
    /// material.
    Expired,
    /// Server-side failure (key material, storage, hashing).
    Fatal,
    /// Downstream failure the caller may retry.
    Retryable,
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ServiceError {
    #[error(transparent)]
    Assertion(#[from] AssertionError),

    #[error(transparent)]
    Certificate(#[from] CertError),

    #[error(transparent)]
    Enrollment(#[from] EnrollmentError),

    #[error(transparent)]
    Recovery(#[from] RecoveryError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0} required")]
    Forbidden(Role),

    #[error("no OTP request for this key")]
    OtpNotFound,

    #[error("OTP not validated for this key")]
    OtpNotValidated,

    #[error("account not found")]
    AccountNotFound,

    #[error("recovery token missing")]
    MissingRecoveryToken,

    #[error("too many OTP requests")]
    RateLimited,

    #[error("failed to send OTP: {0}")]
    FailedToSendOtp(#[from] MailError),

    #[error("hash engine: {0}")]
    Hash(#[from] HashError),

    #[error("record store: {0}")]
    Store(#[from] StoreError),

    #[error("server key material: {0}")]
    KeyLoad(#[from] KeyError),
}

impl ServiceError {
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            ServiceError::Certificate(err) => cert_class(err),
            ServiceError::Enrollment(EnrollmentError::NonceExpired) => ErrorClass::Expired,
            ServiceError::Enrollment(EnrollmentError::ReplayCacheFull(_)) => ErrorClass::Retryable,
            ServiceError::Recovery(err) => match err {
                RecoveryError::Expired => ErrorClass::Expired,
                RecoveryError::KeyLoad(_) => ErrorClass::Fatal,
                RecoveryError::ReplayCacheFull(_) => ErrorClass::Retryable,
                RecoveryError::Certificate(err) => cert_class(err),
                _ => ErrorClass::Client,
            },
            ServiceError::RateLimited | ServiceError::FailedToSendOtp(_) => ErrorClass::Retryable,
            ServiceError::Hash(_) | ServiceError::Store(_) | ServiceError::KeyLoad(_) => {
                ErrorClass::Fatal
            }
            _ => ErrorClass::Client,
        }
    }

    /// Log the failure at the level its class calls for and hand it back.
    ///
    /// Messages carry error kinds only, never secrets or identifiers.
    pub(crate) fn traced(self, operation: &'static str) -> Self {
        match self.class() {
            ErrorClass::Fatal => {
                tracing::error!(operation, error = %self, "Request failed")
            }
            ErrorClass::Retryable => {
                tracing::warn!(operation, error = %self, "Request failed, retryable")
            }
            ErrorClass::Client | ErrorClass::Expired => {
                tracing::warn!(operation, error = %self, class = ?self.class(), "Request rejected")
            }
        }
        self
    }
}

fn cert_class(err: &CertError) -> ErrorClass {
    match err {
        CertError::CertificateExpired => ErrorClass::Expired,
        CertError::KeyLoad(_) => ErrorClass::Fatal,
        _ => ErrorClass::Client,
    }
}
