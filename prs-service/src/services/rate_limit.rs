//! Per-key rate limiting for OTP sends.
//!
//! Each send triggers an SMS or email, so the quota is keyed on the
//! caller's public key hash (or account id) rather than global.

use governor::{clock::DefaultClock, state::keyed::DefaultKeyedStateStore, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::ServiceError;

type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Idle keys are pruned every this many checks.
const PRUNE_EVERY: u64 = 1024;

#[derive(Clone)]
pub struct OtpRateLimiter {
    limiter: Arc<KeyedLimiter>,
    checks: Arc<AtomicU64>,
}

impl OtpRateLimiter {
    /// `per_minute` sends per key, all of which may be used at once.
    pub fn new(per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN);
        Self::with_quota(Quota::per_minute(per_minute))
    }

    /// One send per `period`, with `burst` sends available up front.
    pub fn with_period(period: Duration, burst: u32) -> Self {
        let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
            .allow_burst(burst);
        Self::with_quota(quota)
    }

    fn with_quota(quota: Quota) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
            checks: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Forget keys whose quota has fully refilled.
    pub fn prune(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    /// Number of keys currently tracked.
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.limiter.len()
    }

    /// Returns `ServiceError::RateLimited` once `key` has used its quota.
    pub fn check(&self, key: &str) -> Result<(), ServiceError> {
        if self.checks.fetch_add(1, Ordering::Relaxed) % PRUNE_EVERY == PRUNE_EVERY - 1 {
            self.prune();
        }
        match self.limiter.check_key(&key.to_string()) {
            Ok(()) => Ok(()),
            Err(_) => {
                tracing::warn!("Rate limit exceeded for OTP send");
                Err(ServiceError::RateLimited)
            }
        }
    }
}

impl Default for OtpRateLimiter {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_OTP_SENDS_PER_MINUTE)
    }
}
