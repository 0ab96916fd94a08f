//! Stateless device enrollment.
//!
//! The flow is:
//! 1. Client asks for a nonce; server returns the nonce of the current
//!    15-minute window ([`EnrollmentVerifier::issue_nonce`])
//! 2. Client solves a proof of work over it ([`solve`])
//! 3. Client submits `initiationNonce`, `powNonce`, `powHash` in an
//!    assertion bound to those three values
//! 4. Server recomputes the nonce for the accepted windows, checks the
//!    work, marks the solution used, and issues a device certificate
//!
//! # Security
//!
//! - No pending-enrollment rows: correctness depends only on the clock,
//!   the shared salt and the submitted work
//! - A solved proof is accepted once per process (replay cache)
//! - Nonce comparison is constant time

mod error;
mod nonce;
mod pow;

pub use error::EnrollmentError;
pub use nonce::{window_start, NonceIssuer, WINDOW_SECONDS};
pub use pow::{meets_difficulty, pow_hash, solve, EnrollmentVerifier, ProofOfWork};
