//! Email OTP engine.
//!
//! Email codes are not bound to a device key, so unlike the SMS path they
//! are stored under a slow salted hash and checked with the slow verifier.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use prs_auth::hash::canonical_json;
use prs_auth::{HashError, SlowHasher};
use prs_core::{mask, AccountId, AccountRecord, EmailAddress, EmailOtp};
use rand::rngs::OsRng;
use rand::Rng;
use serde::Serialize;
use serde_json::json;
use zeroize::Zeroizing;

use super::otp::OtpOutcome;
use super::rate_limit::OtpRateLimiter;
use crate::auth::{Authenticator, Operation};
use crate::error::ServiceError;
use crate::mail::MailTransport;
use crate::store::RecordStore;

pub const EMAIL_OTP_SUBJECT: &str = "Webank Verification Code";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailOtpSent {
    pub expires_at: DateTime<Utc>,
}

/// Six random digits, never with a leading zero.
#[must_use]
pub fn generate_email_code() -> String {
    OsRng.gen_range(100_000..1_000_000u32).to_string()
}

fn email_body(code: &str) -> String {
    format!("Your Webank OTP is: {} (valid for 5 minutes)", code)
}

fn otp_document(otp: &str, account_id: &AccountId) -> Zeroizing<String> {
    Zeroizing::new(canonical_json(&json!({
        "emailOtp": otp,
        "accountId": account_id.as_str(),
    })))
}

pub struct EmailOtpEngine<S, M> {
    store: Arc<S>,
    mail: Arc<M>,
    authenticator: Arc<Authenticator>,
    hasher: SlowHasher,
    limiter: OtpRateLimiter,
}

impl<S: RecordStore, M: MailTransport> EmailOtpEngine<S, M> {
    pub fn new(
        store: Arc<S>,
        mail: Arc<M>,
        authenticator: Arc<Authenticator>,
        hasher: SlowHasher,
        limiter: OtpRateLimiter,
    ) -> Self {
        Self {
            store,
            mail,
            authenticator,
            hasher,
            limiter,
        }
    }

    /// `email-otp/send`: store a fresh code for the account and mail it.
    pub async fn send(
        &self,
        token: &str,
        email: &str,
        account_id: &str,
        now: DateTime<Utc>,
    ) -> Result<EmailOtpSent, ServiceError> {
        let op = Operation::EmailOtpSend;
        self.send_inner(token, email, account_id, now)
            .await
            .map_err(|e| e.traced(op.path()))
    }

    async fn send_inner(
        &self,
        token: &str,
        email: &str,
        account_id: &str,
        now: DateTime<Utc>,
    ) -> Result<EmailOtpSent, ServiceError> {
        self.authenticator
            .authorize(Operation::EmailOtpSend, token, &[email, account_id], now)?;
        let email = EmailAddress::parse(email)?;
        let account_id = AccountId::parse(account_id)?;
        self.limiter.check(account_id.as_str())?;

        let mut account = match self.store.find_account_by_id(&account_id).await? {
            Some(account) => account,
            None => {
                tracing::info!(
                    account = %mask::account_id(account_id.as_str()),
                    "No account record, creating one"
                );
                AccountRecord::new(account_id.clone())
            }
        };

        let code = Zeroizing::new(generate_email_code());
        let hash = self.slow_hash(otp_document(&code, &account_id)).await?;
        let otp = EmailOtp::new(hash, now);
        let expires_at = otp.expires_at;

        account.email = Some(email.as_str().to_string());
        account.email_otp = Some(otp);
        self.store.save_account(&account).await?;

        self.mail
            .send(email.as_str(), EMAIL_OTP_SUBJECT, &email_body(&code))
            .await?;

        tracing::info!(
            email = %mask::email(email.as_str()),
            account = %mask::account_id(account_id.as_str()),
            "Email OTP sent"
        );
        Ok(EmailOtpSent { expires_at })
    }

    /// `email-otp/validate`: check `otp_input` for the account.
    ///
    /// Each code gets one attempt; the stored hash is cleared whatever the
    /// outcome.
    pub async fn validate(
        &self,
        token: &str,
        email: &str,
        otp_input: &str,
        account_id: &str,
        now: DateTime<Utc>,
    ) -> Result<OtpOutcome, ServiceError> {
        let op = Operation::EmailOtpValidate;
        self.validate_inner(token, email, otp_input, account_id, now)
            .await
            .map_err(|e| e.traced(op.path()))
    }

    async fn validate_inner(
        &self,
        token: &str,
        email: &str,
        otp_input: &str,
        account_id: &str,
        now: DateTime<Utc>,
    ) -> Result<OtpOutcome, ServiceError> {
        self.authenticator.authorize(
            Operation::EmailOtpValidate,
            token,
            &[email, otp_input, account_id],
            now,
        )?;
        let email = EmailAddress::parse(email)?;
        let account_id = AccountId::parse(account_id)?;

        let mut account = self
            .store
            .find_account_by_id(&account_id)
            .await?
            .ok_or(ServiceError::AccountNotFound)?;
        let Some(otp) = account.email_otp.take() else {
            return Err(ServiceError::OtpNotFound);
        };

        let outcome = if !account
            .email
            .as_deref()
            .is_some_and(|stored| stored.eq_ignore_ascii_case(email.as_str()))
        {
            OtpOutcome::Invalid
        } else if otp.is_expired(now) {
            OtpOutcome::Expired
        } else if self
            .slow_verify(otp_document(otp_input, &account_id), otp.hash)
            .await?
        {
            OtpOutcome::Validated
        } else {
            OtpOutcome::Invalid
        };

        self.store.save_account(&account).await?;

        let masked = mask::account_id(account_id.as_str());
        match outcome {
            OtpOutcome::Validated => tracing::info!(account = %masked, "Email OTP validated"),
            OtpOutcome::Expired => tracing::warn!(account = %masked, "Email OTP expired"),
            OtpOutcome::Invalid => tracing::warn!(account = %masked, "Email OTP mismatch"),
        }
        Ok(outcome)
    }

    // Argon2 is deliberately slow; keep it off the async workers.
    async fn slow_hash(&self, document: Zeroizing<String>) -> Result<String, HashError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&document))
            .await
            .map_err(|_| HashError::HashFailed)?
    }

    async fn slow_verify(
        &self,
        document: Zeroizing<String>,
        stored: String,
    ) -> Result<bool, HashError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&document, &stored))
            .await
            .map_err(|_| HashError::HashFailed)
    }
}
