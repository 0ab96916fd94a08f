//! One-time password records and their status machine.
//!
//! ```text
//! send ──▶ PENDING ──validate(ok)──▶ COMPLETE
//!             │
//!             └──validate(wrong code | expired)──▶ INCOMPLETE ──send──▶ PENDING
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How long a code stays redeemable after it was sent.
pub const OTP_TTL_SECONDS: i64 = 300;

#[must_use]
pub fn otp_ttl() -> Duration {
    Duration::seconds(OTP_TTL_SECONDS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OtpStatus {
    /// Sent, not yet validated.
    Pending,
    /// Validated with the correct code in time.
    Complete,
    /// Wrong code or expired. A new send re-arms it.
    Incomplete,
}

impl OtpStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpStatus::Pending => "PENDING",
            OtpStatus::Complete => "COMPLETE",
            OtpStatus::Incomplete => "INCOMPLETE",
        }
    }
}

impl fmt::Display for OtpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for OtpStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OtpStatus::Pending),
            "COMPLETE" => Ok(OtpStatus::Complete),
            "INCOMPLETE" => Ok(OtpStatus::Incomplete),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// SMS OTP state for one client key.
///
/// `public_key_hash` is unique: a new send overwrites code, hash and status
/// of the existing record instead of adding a second one.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpRecord {
    pub id: Uuid,
    pub phone_number: String,
    pub public_key_hash: String,
    /// Plain code, kept only until the delivery gateway picks it up.
    pub otp_code: String,
    pub otp_hash: String,
    pub status: OtpStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OtpRecord {
    /// A fresh `PENDING` record.
    #[must_use]
    pub fn pending(
        phone_number: impl Into<String>,
        public_key_hash: impl Into<String>,
        otp_code: impl Into<String>,
        otp_hash: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            phone_number: phone_number.into(),
            public_key_hash: public_key_hash.into(),
            otp_code: otp_code.into(),
            otp_hash: otp_hash.into(),
            status: OtpStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Expired strictly after `created_at + 5 min`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.created_at + otp_ttl()
    }
}

impl fmt::Debug for OtpRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtpRecord")
            .field("id", &self.id)
            .field("public_key_hash", &self.public_key_hash)
            .field("status", &self.status)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish_non_exhaustive()
    }
}

/// Email OTP state, embedded in the account record. Only the slow hash of
/// the code is kept.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailOtp {
    /// Argon2 PHC string.
    pub hash: String,
    pub expires_at: DateTime<Utc>,
}

impl EmailOtp {
    #[must_use]
    pub fn new(hash: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            hash: hash.into(),
            expires_at: now + otp_ttl(),
        }
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

impl fmt::Debug for EmailOtp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailOtp")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}
