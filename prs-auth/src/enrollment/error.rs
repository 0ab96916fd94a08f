//! Enrollment error types.

use crate::replay::ReplayCacheFull;

/// Errors from the enrollment nonce and proof-of-work protocol.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum EnrollmentError {
    /// The nonce belongs to no accepted window. Recoverable: request a
    /// fresh nonce and solve again.
    #[error("registration time elapsed")]
    NonceExpired,

    /// The submitted hash does not match the solution or misses the
    /// difficulty target.
    #[error("proof of work insufficient")]
    ProofOfWorkInsufficient,

    /// This solution has already been redeemed.
    #[error("proof of work already used")]
    ProofReplayed,

    /// No room to record the solution as spent. Retry later.
    #[error(transparent)]
    ReplayCacheFull(#[from] ReplayCacheFull),

    /// `now` is too close to the representable time range to compute windows.
    #[error("clock out of range")]
    ClockOutOfRange,
}
