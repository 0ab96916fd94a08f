//! Time-quantized enrollment nonces.
//!
//! `nonce = Base64(SHA256("YYYY-MM-DDTHH:MM:SS" of the window start || salt))`
//! with 15-minute windows in UTC. Nothing is stored: both sides recompute
//! the value from the clock and the shared salt.

use chrono::{DateTime, Utc};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::hash;

use super::EnrollmentError;

/// Window length in seconds.
pub const WINDOW_SECONDS: i64 = 15 * 60;

/// Start of the 15-minute window containing `now`: minute floored to a
/// multiple of 15, seconds and sub-seconds zeroed.
///
/// # Errors
///
/// Returns `EnrollmentError::ClockOutOfRange` for unrepresentable results.
pub fn window_start(now: DateTime<Utc>) -> Result<DateTime<Utc>, EnrollmentError> {
    let secs = now.timestamp();
    DateTime::from_timestamp(secs - secs.rem_euclid(WINDOW_SECONDS), 0)
        .ok_or(EnrollmentError::ClockOutOfRange)
}

/// Issues and recognizes enrollment nonces.
#[derive(Clone)]
pub struct NonceIssuer {
    salt: Zeroizing<String>,
    skew_windows: u32,
}

impl NonceIssuer {
    /// `skew_windows` earlier windows are accepted besides the current one.
    #[must_use]
    pub fn new(salt: Zeroizing<String>, skew_windows: u32) -> Self {
        Self { salt, skew_windows }
    }

    /// The nonce for the window containing `now`.
    ///
    /// Two calls within the same window return identical values.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentError::ClockOutOfRange` for unrepresentable clocks.
    pub fn issue(&self, now: DateTime<Utc>) -> Result<String, EnrollmentError> {
        Ok(self.nonce_for_window(window_start(now)?))
    }

    /// Whether `nonce` belongs to the current window or one of the
    /// accepted earlier windows.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentError::ClockOutOfRange` for unrepresentable clocks.
    pub fn is_current(&self, nonce: &str, now: DateTime<Utc>) -> Result<bool, EnrollmentError> {
        let current = window_start(now)?;
        let mut matched = subtle::Choice::from(0u8);
        for back in 0..=i64::from(self.skew_windows) {
            let start = DateTime::from_timestamp(current.timestamp() - back * WINDOW_SECONDS, 0)
                .ok_or(EnrollmentError::ClockOutOfRange)?;
            let candidate = self.nonce_for_window(start);
            matched |= candidate.as_bytes().ct_eq(nonce.as_bytes());
        }
        Ok(matched.into())
    }

    fn nonce_for_window(&self, start: DateTime<Utc>) -> String {
        let mut input = Zeroizing::new(start.format("%Y-%m-%dT%H:%M:%S").to_string());
        input.push_str(&self.salt);
        hash::sha256_base64(input.as_bytes())
    }
}

impl std::fmt::Debug for NonceIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceIssuer")
            .field("skew_windows", &self.skew_windows)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn issuer() -> NonceIssuer {
        NonceIssuer::new(Zeroizing::new("test-salt".into()), 1)
    }

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, h, m, s).unwrap()
    }

    #[test]
    fn test_window_start_floors_to_quarter_hour() {
        assert_eq!(window_start(at(10, 14, 59)).unwrap(), at(10, 0, 0));
        assert_eq!(window_start(at(10, 15, 0)).unwrap(), at(10, 15, 0));
        assert_eq!(window_start(at(10, 59, 59)).unwrap(), at(10, 45, 0));
    }

    #[test]
    fn test_window_start_drops_subseconds() {
        let now = at(10, 31, 2) + Duration::milliseconds(789);
        assert_eq!(window_start(now).unwrap(), at(10, 30, 0));
    }

    #[test]
    fn test_nonce_matches_documented_formula() {
        let expected = hash::sha256_base64("2025-01-15T10:15:00test-salt");
        assert_eq!(issuer().issue(at(10, 22, 41)).unwrap(), expected);
    }

    #[test]
    fn test_same_window_same_nonce() {
        let nonces = issuer();
        assert_eq!(
            nonces.issue(at(10, 15, 0)).unwrap(),
            nonces.issue(at(10, 29, 59)).unwrap()
        );
    }

    #[test]
    fn test_adjacent_windows_differ() {
        let nonces = issuer();
        assert_ne!(
            nonces.issue(at(10, 14, 59)).unwrap(),
            nonces.issue(at(10, 15, 0)).unwrap()
        );
    }

    #[test]
    fn test_salt_changes_nonce() {
        let other = NonceIssuer::new(Zeroizing::new("other-salt".into()), 1);
        assert_ne!(
            issuer().issue(at(10, 0, 0)).unwrap(),
            other.issue(at(10, 0, 0)).unwrap()
        );
    }

    #[test]
    fn test_previous_window_accepted_once() {
        let nonces = issuer();
        let nonce = nonces.issue(at(10, 14, 0)).unwrap();

        assert!(nonces.is_current(&nonce, at(10, 14, 59)).unwrap());
        assert!(nonces.is_current(&nonce, at(10, 15, 0)).unwrap());
        assert!(nonces.is_current(&nonce, at(10, 29, 59)).unwrap());
        assert!(!nonces.is_current(&nonce, at(10, 30, 0)).unwrap());
    }

    #[test]
    fn test_zero_skew_accepts_current_window_only() {
        let nonces = NonceIssuer::new(Zeroizing::new("test-salt".into()), 0);
        let nonce = nonces.issue(at(10, 14, 0)).unwrap();

        assert!(nonces.is_current(&nonce, at(10, 14, 59)).unwrap());
        assert!(!nonces.is_current(&nonce, at(10, 15, 0)).unwrap());
    }

    #[test]
    fn test_future_nonce_rejected() {
        let nonces = issuer();
        let nonce = nonces.issue(at(10, 30, 0)).unwrap();

        assert!(!nonces.is_current(&nonce, at(10, 29, 59)).unwrap());
    }

    #[test]
    fn test_debug_hides_salt() {
        assert!(!format!("{:?}", issuer()).contains("test-salt"));
    }
}
