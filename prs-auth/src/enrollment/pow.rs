//! Proof of work over enrollment nonces.
//!
//! The client searches for `powNonce` such that
//! `powHash = SHA256hex(initiationNonce || powNonce)` starts with
//! `difficulty` zero hex digits, and submits all three values.

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use subtle::ConstantTimeEq;

use crate::config::AuthConfig;
use crate::hash;
use crate::replay::ReplayCache;

use super::nonce::NonceIssuer;
use super::EnrollmentError;

/// Domain separation prefix for replay-cache keys.
const REPLAY_DOMAIN: &[u8] = b"PRS-POW-v1:";

/// A client's proof-of-work submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofOfWork<'a> {
    pub initiation_nonce: &'a str,
    pub pow_nonce: &'a str,
    pub pow_hash: &'a str,
}

/// `SHA256hex(initiation_nonce || pow_nonce)`.
#[must_use]
pub fn pow_hash(initiation_nonce: &str, pow_nonce: &str) -> String {
    hash::sha256_hex(format!("{}{}", initiation_nonce, pow_nonce))
}

/// Whether `hash_hex` starts with `difficulty` zero hex digits.
#[must_use]
pub fn meets_difficulty(hash_hex: &str, difficulty: u32) -> bool {
    let difficulty = difficulty as usize;
    hash_hex.len() >= difficulty && hash_hex.bytes().take(difficulty).all(|b| b == b'0')
}

/// Client side: find a `powNonce` for `initiation_nonce`.
///
/// Returns `(pow_nonce, pow_hash)`. Expected work is `16^difficulty` hashes.
/// The search starts at a random counter: every client in a window shares
/// the nonce, and each solution is accepted only once.
#[must_use]
pub fn solve(initiation_nonce: &str, difficulty: u32) -> (String, String) {
    let mut counter = u64::from(OsRng.next_u32());
    loop {
        let candidate = counter.to_string();
        let hash = pow_hash(initiation_nonce, &candidate);
        if meets_difficulty(&hash, difficulty) {
            return (candidate, hash);
        }
        counter = counter.wrapping_add(1);
    }
}

/// Server side of the enrollment protocol.
#[derive(Debug, Clone)]
pub struct EnrollmentVerifier {
    nonces: NonceIssuer,
    difficulty: u32,
}

impl EnrollmentVerifier {
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            nonces: NonceIssuer::new(config.salt.clone(), config.nonce_skew_windows),
            difficulty: config.pow_difficulty,
        }
    }

    /// Issue the nonce for the current window.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentError::ClockOutOfRange` for unrepresentable clocks.
    pub fn issue_nonce(&self, now: DateTime<Utc>) -> Result<String, EnrollmentError> {
        self.nonces.issue(now)
    }

    #[must_use]
    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// Check a proof-of-work submission and mark it used.
    ///
    /// # Errors
    ///
    /// - `NonceExpired` if the nonce is from no accepted window
    /// - `ProofOfWorkInsufficient` if the hash is wrong or too easy
    /// - `ProofReplayed` if this solution was already accepted
    /// - `ReplayCacheFull` if the solution cannot be recorded as spent
    pub fn verify_proof_of_work(
        &self,
        proof: &ProofOfWork<'_>,
        now: DateTime<Utc>,
        replay_cache: &impl ReplayCache,
    ) -> Result<(), EnrollmentError> {
        if !self.nonces.is_current(proof.initiation_nonce, now)? {
            return Err(EnrollmentError::NonceExpired);
        }

        let expected = pow_hash(proof.initiation_nonce, proof.pow_nonce);
        let submitted = proof.pow_hash.to_ascii_lowercase();
        if !bool::from(expected.as_bytes().ct_eq(submitted.as_bytes())) {
            return Err(EnrollmentError::ProofOfWorkInsufficient);
        }
        if !meets_difficulty(&expected, self.difficulty) {
            return Err(EnrollmentError::ProofOfWorkInsufficient);
        }

        let mut key_input = REPLAY_DOMAIN.to_vec();
        key_input.extend_from_slice(expected.as_bytes());
        if !replay_cache.check_and_insert(&hash::sha256(key_input))? {
            return Err(EnrollmentError::ProofReplayed);
        }

        Ok(())
    }
}
