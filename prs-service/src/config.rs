//! Service configuration from `PRS_*` environment variables.

use std::path::PathBuf;

use chrono::Duration;
use prs_auth::config::{
    DEFAULT_ISSUER, DEFAULT_NONCE_SKEW_WINDOWS, DEFAULT_POW_DIFFICULTY, DEFAULT_TOKEN_TTL_SECONDS,
};
use prs_auth::{AuthConfig, KeyError, ServerKeys};
use zeroize::Zeroizing;

pub const ENV_SERVER_PRIVATE_KEY: &str = "PRS_SERVER_PRIVATE_KEY";
pub const ENV_SERVER_PUBLIC_KEY: &str = "PRS_SERVER_PUBLIC_KEY";
pub const ENV_JWT_ISSUER: &str = "PRS_JWT_ISSUER";
pub const ENV_CERT_TTL_SECONDS: &str = "PRS_CERT_TTL_SECONDS";
pub const ENV_RECOVERY_TTL_SECONDS: &str = "PRS_RECOVERY_TTL_SECONDS";
pub const ENV_OTP_SALT: &str = "PRS_OTP_SALT";
pub const ENV_POW_DIFFICULTY: &str = "PRS_POW_DIFFICULTY";
pub const ENV_NONCE_SKEW_WINDOWS: &str = "PRS_NONCE_SKEW_WINDOWS";
pub const ENV_DATABASE_URL: &str = "PRS_DATABASE_URL";
pub const ENV_OTP_SENDS_PER_MINUTE: &str = "PRS_OTP_SENDS_PER_MINUTE";

pub const DEFAULT_OTP_SENDS_PER_MINUTE: u32 = 3;

/// Longest certificate or recovery token lifetime accepted: one year.
pub const MAX_TTL_SECONDS: i64 = 366 * 24 * 60 * 60;

/// Nonce windows accepted before the current one, at most.
pub const MAX_NONCE_SKEW_WINDOWS: u32 = 4;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Everything the service reads at startup.
#[derive(Clone)]
pub struct PrsConfig {
    pub server_private_key: Option<Zeroizing<String>>,
    pub server_public_key: Option<String>,
    pub issuer: String,
    pub certificate_ttl_seconds: i64,
    pub recovery_ttl_seconds: i64,
    pub otp_salt: Zeroizing<String>,
    pub pow_difficulty: u32,
    pub nonce_skew_windows: u32,
    pub database_url: Option<String>,
    pub otp_sends_per_minute: u32,
}

impl PrsConfig {
    /// Read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let otp_salt = get(ENV_OTP_SALT).ok_or(ConfigError::Missing(ENV_OTP_SALT))?;

        let config = Self {
            server_private_key: get(ENV_SERVER_PRIVATE_KEY).map(Zeroizing::new),
            server_public_key: get(ENV_SERVER_PUBLIC_KEY),
            issuer: get(ENV_JWT_ISSUER).unwrap_or_else(|| DEFAULT_ISSUER.to_string()),
            certificate_ttl_seconds: parse_or(&get, ENV_CERT_TTL_SECONDS, DEFAULT_TOKEN_TTL_SECONDS)?,
            recovery_ttl_seconds: parse_or(&get, ENV_RECOVERY_TTL_SECONDS, DEFAULT_TOKEN_TTL_SECONDS)?,
            otp_salt: Zeroizing::new(otp_salt),
            pow_difficulty: parse_or(&get, ENV_POW_DIFFICULTY, DEFAULT_POW_DIFFICULTY)?,
            nonce_skew_windows: parse_or(&get, ENV_NONCE_SKEW_WINDOWS, DEFAULT_NONCE_SKEW_WINDOWS)?,
            database_url: get(ENV_DATABASE_URL),
            otp_sends_per_minute: parse_or(&get, ENV_OTP_SENDS_PER_MINUTE, DEFAULT_OTP_SENDS_PER_MINUTE)?,
        };

        for (var, ttl) in [
            (ENV_CERT_TTL_SECONDS, config.certificate_ttl_seconds),
            (ENV_RECOVERY_TTL_SECONDS, config.recovery_ttl_seconds),
        ] {
            if !(1..=MAX_TTL_SECONDS).contains(&ttl) {
                return Err(ConfigError::Invalid {
                    var,
                    reason: format!("must be between 1 and {}", MAX_TTL_SECONDS),
                });
            }
        }
        if config.nonce_skew_windows > MAX_NONCE_SKEW_WINDOWS {
            return Err(ConfigError::Invalid {
                var: ENV_NONCE_SKEW_WINDOWS,
                reason: format!("at most {}", MAX_NONCE_SKEW_WINDOWS),
            });
        }
        // 64 hex digits is the whole digest.
        if config.pow_difficulty > 64 {
            return Err(ConfigError::Invalid {
                var: ENV_POW_DIFFICULTY,
                reason: "at most 64".into(),
            });
        }

        Ok(config)
    }

    /// Protocol parameters for issuers and verifiers.
    #[must_use]
    pub fn auth_config(&self) -> AuthConfig {
        let mut auth = AuthConfig::new(self.otp_salt.as_str());
        auth.issuer = self.issuer.clone();
        auth.certificate_ttl = Duration::seconds(self.certificate_ttl_seconds);
        auth.recovery_ttl = Duration::seconds(self.recovery_ttl_seconds);
        auth.pow_difficulty = self.pow_difficulty;
        auth.nonce_skew_windows = self.nonce_skew_windows;
        auth
    }

    /// Load the configured server key pair.
    ///
    /// Missing variables are key-load failures, not configuration errors:
    /// commands that never sign run without keys.
    pub fn server_keys(&self) -> Result<ServerKeys, KeyError> {
        let private = self
            .server_private_key
            .as_ref()
            .ok_or_else(|| KeyError::KeyLoad(format!("{} is not set", ENV_SERVER_PRIVATE_KEY)))?;
        let public = self
            .server_public_key
            .as_ref()
            .ok_or_else(|| KeyError::KeyLoad(format!("{} is not set", ENV_SERVER_PUBLIC_KEY)))?;
        ServerKeys::from_jwk_json(private, public)
    }
}

impl std::fmt::Debug for PrsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrsConfig")
            .field(
                "server_private_key",
                &self.server_private_key.as_ref().map(|_| "<redacted>"),
            )
            .field("server_public_key", &self.server_public_key.is_some())
            .field("issuer", &self.issuer)
            .field("certificate_ttl_seconds", &self.certificate_ttl_seconds)
            .field("recovery_ttl_seconds", &self.recovery_ttl_seconds)
            .field("otp_salt", &"<redacted>")
            .field("pow_difficulty", &self.pow_difficulty)
            .field("nonce_skew_windows", &self.nonce_skew_windows)
            .field("database_url", &self.database_url)
            .field("otp_sends_per_minute", &self.otp_sends_per_minute)
            .finish()
    }
}

fn parse_or<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match get(var) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Default database location under the platform data directory.
pub fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("prs")
        .join("prs.db")
}
