//! SMS OTP engine.
//!
//! One record per caller key. The stored hash binds the code to the
//! caller's public key, the phone number and the server salt, so a code
//! read off the SMS channel is useless to any other key.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use prs_auth::hash::{canonical_json, sha256_base64};
use prs_auth::{ClientKey, HashError};
use prs_core::{mask, otp_ttl, OtpRecord, OtpStatus, PhoneNumber};
use rand::rngs::OsRng;
use rand::Rng;
use serde::Serialize;
use serde_json::{json, Value};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use super::rate_limit::OtpRateLimiter;
use crate::auth::{Authenticator, Operation};
use crate::error::ServiceError;
use crate::store::RecordStore;

/// Returned to the caller of `otp/send`. The code itself travels by SMS only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpSent {
    pub otp_hash: String,
    pub expires_at: DateTime<Utc>,
}

/// Result of `otp/validate`. None of these are errors: the caller gets a
/// message either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpOutcome {
    Validated,
    Invalid,
    Expired,
}

impl OtpOutcome {
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            OtpOutcome::Validated => "Otp Validated Successfully",
            OtpOutcome::Invalid => "Invalid OTP",
            OtpOutcome::Expired => "OTP expired. Request a new one.",
        }
    }

    #[must_use]
    pub fn is_validated(self) -> bool {
        self == OtpOutcome::Validated
    }
}

/// A code waiting for the SMS gateway to deliver it.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOtp {
    pub phone_number: String,
    pub otp_code: String,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for PendingOtp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingOtp")
            .field("phone_number", &mask::phone(&self.phone_number))
            .field("otp_code", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Five random digits, never with a leading zero.
#[must_use]
pub fn generate_sms_code() -> String {
    OsRng.gen_range(10_000..100_000u32).to_string()
}

/// `Base64(SHA-256(canonical {otp, devicePub, phoneNumber, salt}))`.
pub fn sms_otp_hash(
    otp: &str,
    client: &ClientKey,
    phone_number: &str,
    salt: &str,
) -> Result<String, HashError> {
    let device_pub: Value =
        serde_json::from_str(&client.canonical_json()).map_err(|_| HashError::HashFailed)?;
    let document = json!({
        "otp": otp,
        "devicePub": device_pub,
        "phoneNumber": phone_number,
        "salt": salt,
    });
    Ok(sha256_base64(canonical_json(&document)))
}

pub struct OtpEngine<S> {
    store: Arc<S>,
    authenticator: Arc<Authenticator>,
    salt: Zeroizing<String>,
    limiter: OtpRateLimiter,
}

impl<S: RecordStore> OtpEngine<S> {
    pub fn new(
        store: Arc<S>,
        authenticator: Arc<Authenticator>,
        salt: Zeroizing<String>,
        limiter: OtpRateLimiter,
    ) -> Self {
        Self {
            store,
            authenticator,
            salt,
            limiter,
        }
    }

    /// `otp/send`: arm a fresh code for the caller's key.
    ///
    /// A second send replaces the first record, so earlier codes stop
    /// validating and the five minutes start over.
    pub async fn send(
        &self,
        token: &str,
        phone_number: &str,
        now: DateTime<Utc>,
    ) -> Result<OtpSent, ServiceError> {
        let op = Operation::OtpSend;
        self.send_inner(token, phone_number, now)
            .await
            .map_err(|e| e.traced(op.path()))
    }

    async fn send_inner(
        &self,
        token: &str,
        phone_number: &str,
        now: DateTime<Utc>,
    ) -> Result<OtpSent, ServiceError> {
        let caller = self
            .authenticator
            .authorize(Operation::OtpSend, token, &[phone_number], now)?;
        let phone = PhoneNumber::parse(phone_number)?;
        let key_hash = caller.client().public_key_hash();
        self.limiter.check(&key_hash)?;

        let code = Zeroizing::new(generate_sms_code());
        let otp_hash = sms_otp_hash(&code, caller.client(), phone.as_str(), &self.salt)?;
        let record = OtpRecord::pending(phone.as_str(), &key_hash, code.as_str(), &otp_hash, now);
        self.store.upsert_otp_by_key_hash(&record).await?;

        tracing::info!(phone = %mask::phone(phone.as_str()), "OTP armed");
        Ok(OtpSent {
            otp_hash,
            expires_at: now + otp_ttl(),
        })
    }

    /// `otp/validate`: check `otp_input` against the caller's record and
    /// move it to `COMPLETE` or `INCOMPLETE`.
    pub async fn validate(
        &self,
        token: &str,
        phone_number: &str,
        otp_input: &str,
        now: DateTime<Utc>,
    ) -> Result<OtpOutcome, ServiceError> {
        let op = Operation::OtpValidate;
        self.validate_inner(token, phone_number, otp_input, now)
            .await
            .map_err(|e| e.traced(op.path()))
    }

    async fn validate_inner(
        &self,
        token: &str,
        phone_number: &str,
        otp_input: &str,
        now: DateTime<Utc>,
    ) -> Result<OtpOutcome, ServiceError> {
        let caller = self.authenticator.authorize(
            Operation::OtpValidate,
            token,
            &[phone_number, otp_input],
            now,
        )?;
        let phone = PhoneNumber::parse(phone_number)?;
        let key_hash = caller.client().public_key_hash();

        let record = self
            .store
            .find_otp_by_key_hash(&key_hash)
            .await?
            .ok_or(ServiceError::OtpNotFound)?;

        // Only an armed code can be redeemed; a spent or failed one needs a
        // new send.
        if record.status != OtpStatus::Pending {
            tracing::warn!(phone = %mask::phone(phone.as_str()), status = %record.status, "OTP not pending");
            return Ok(OtpOutcome::Invalid);
        }

        if record.is_expired(now) {
            self.store
                .set_otp_status(&key_hash, OtpStatus::Incomplete, now)
                .await?;
            tracing::warn!(phone = %mask::phone(phone.as_str()), "OTP expired");
            return Ok(OtpOutcome::Expired);
        }

        let expected = sms_otp_hash(otp_input, caller.client(), phone.as_str(), &self.salt)?;
        let matches: bool = expected
            .as_bytes()
            .ct_eq(record.otp_hash.as_bytes())
            .into();

        if matches {
            self.store
                .set_otp_status(&key_hash, OtpStatus::Complete, now)
                .await?;
            tracing::info!(phone = %mask::phone(phone.as_str()), "OTP validated");
            Ok(OtpOutcome::Validated)
        } else {
            self.store
                .set_otp_status(&key_hash, OtpStatus::Incomplete, now)
                .await?;
            tracing::warn!(phone = %mask::phone(phone.as_str()), "OTP mismatch");
            Ok(OtpOutcome::Invalid)
        }
    }

    /// Armed codes still inside their five minutes, for the SMS gateway.
    pub async fn pending(&self, now: DateTime<Utc>) -> Result<Vec<PendingOtp>, ServiceError> {
        let records = self.store.list_otps_by_status(OtpStatus::Pending).await?;
        Ok(records
            .into_iter()
            .filter(|record| !record.is_expired(now))
            .map(|record| PendingOtp {
                phone_number: record.phone_number,
                otp_code: record.otp_code,
                created_at: record.created_at,
            })
            .collect())
    }
}
