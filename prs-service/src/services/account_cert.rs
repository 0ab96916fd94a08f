//! Account-tier certificate, granted once the caller's phone OTP is
//! `COMPLETE`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use prs_auth::{CertClass, CertificateIssuer};
use prs_core::{mask, OtpStatus, PhoneNumber};

use crate::auth::{Authenticator, Operation};
use crate::error::ServiceError;
use crate::store::RecordStore;

pub struct AccountCertificateService<S> {
    store: Arc<S>,
    authenticator: Arc<Authenticator>,
    certificates: Arc<CertificateIssuer>,
}

impl<S: RecordStore> AccountCertificateService<S> {
    pub fn new(
        store: Arc<S>,
        authenticator: Arc<Authenticator>,
        certificates: Arc<CertificateIssuer>,
    ) -> Self {
        Self {
            store,
            authenticator,
            certificates,
        }
    }

    /// `account/cert`: issue an account certificate to the caller.
    ///
    /// The caller's OTP record must be `COMPLETE` and for `phone_number`.
    pub async fn issue(
        &self,
        token: &str,
        phone_number: &str,
        now: DateTime<Utc>,
    ) -> Result<String, ServiceError> {
        let op = Operation::AccountCertificate;
        self.issue_inner(token, phone_number, now)
            .await
            .map_err(|e| e.traced(op.path()))
    }

    async fn issue_inner(
        &self,
        token: &str,
        phone_number: &str,
        now: DateTime<Utc>,
    ) -> Result<String, ServiceError> {
        let caller =
            self.authenticator
                .authorize(Operation::AccountCertificate, token, &[phone_number], now)?;
        let phone = PhoneNumber::parse(phone_number)?;

        let record = self
            .store
            .find_otp_by_key_hash(&caller.client().public_key_hash())
            .await?
            .ok_or(ServiceError::OtpNotValidated)?;
        if record.status != OtpStatus::Complete || record.phone_number != phone.as_str() {
            return Err(ServiceError::OtpNotValidated);
        }

        let certificate = self
            .certificates
            .issue(CertClass::Account, caller.client(), now)?;
        tracing::info!(
            phone = %mask::phone(phone.as_str()),
            kid = %caller.client().thumbprint(),
            "Account certificate issued"
        );
        Ok(certificate)
    }
}
