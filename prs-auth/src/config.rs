//! Protocol parameters shared by issuers and verifiers.

use chrono::Duration;
use zeroize::Zeroizing;

/// Default `iss` claim.
pub const DEFAULT_ISSUER: &str = "https://webank.com";

/// Default certificate and recovery token lifetime.
pub const DEFAULT_TOKEN_TTL_SECONDS: i64 = 3600;

/// Default proof-of-work difficulty in leading zero hex digits.
pub const DEFAULT_POW_DIFFICULTY: u32 = 3;

/// Default number of earlier nonce windows accepted besides the current one.
pub const DEFAULT_NONCE_SKEW_WINDOWS: u32 = 1;

/// Immutable protocol configuration, built once at startup and passed to
/// every issuer and verifier constructor.
#[derive(Clone)]
pub struct AuthConfig {
    /// `iss` claim written into and required on server tokens.
    pub issuer: String,
    /// Lifetime of certificates.
    pub certificate_ttl: Duration,
    /// Lifetime of recovery tokens.
    pub recovery_ttl: Duration,
    /// Server salt for enrollment nonces and SMS OTP hashes.
    pub salt: Zeroizing<String>,
    /// Leading zero hex digits a proof-of-work hash must have.
    pub pow_difficulty: u32,
    /// Earlier 15-minute nonce windows accepted for clock skew.
    pub nonce_skew_windows: u32,
}

impl AuthConfig {
    /// Configuration with defaults for everything but the salt.
    #[must_use]
    pub fn new(salt: impl Into<String>) -> Self {
        Self {
            issuer: DEFAULT_ISSUER.to_string(),
            certificate_ttl: Duration::seconds(DEFAULT_TOKEN_TTL_SECONDS),
            recovery_ttl: Duration::seconds(DEFAULT_TOKEN_TTL_SECONDS),
            salt: Zeroizing::new(salt.into()),
            pow_difficulty: DEFAULT_POW_DIFFICULTY,
            nonce_skew_windows: DEFAULT_NONCE_SKEW_WINDOWS,
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("issuer", &self.issuer)
            .field("certificate_ttl", &self.certificate_ttl)
            .field("recovery_ttl", &self.recovery_ttl)
            .field("salt", &"<redacted>")
            .field("pow_difficulty", &self.pow_difficulty)
            .field("nonce_skew_windows", &self.nonce_skew_windows)
            .finish()
    }
}
