//! KYC certificate issuance, gated on the account's verification status.
//!
//! The account certificate is minted at phone verification, before any
//! account id exists, so it names no account. Any caller holding one can
//! ask for the KYC certificate of any approved account id; tying account
//! ids to device keys is the job of the account system that hands out the
//! ids. The issued certificate is still bound to the caller's own key.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use prs_auth::{CertClass, CertificateIssuer};
use prs_core::{mask, AccountId, AccountRecord, KycStatus};

use crate::auth::{Authenticator, Operation};
use crate::error::ServiceError;
use crate::store::RecordStore;

pub const DEFAULT_REJECTION_REASON: &str =
    "Your identity verification was rejected. Please check your documents and try again.";

/// Answer to `kyc/cert`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KycCertificateOutcome {
    /// Verification approved: a KYC certificate for the caller's key.
    Issued(String),
    /// Verification rejected, with the reason shown to the user.
    Rejected(String),
    /// No decision yet.
    Pending,
}

impl KycCertificateOutcome {
    /// Response body: the certificate, `REJECTED: <reason>`, or nothing.
    #[must_use]
    pub fn body(&self) -> Option<String> {
        match self {
            KycCertificateOutcome::Issued(certificate) => Some(certificate.clone()),
            KycCertificateOutcome::Rejected(reason) => Some(format!("REJECTED: {}", reason)),
            KycCertificateOutcome::Pending => None,
        }
    }
}

pub struct KycCertificateService<S> {
    store: Arc<S>,
    authenticator: Arc<Authenticator>,
    certificates: Arc<CertificateIssuer>,
}

impl<S: RecordStore> KycCertificateService<S> {
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

    /// `kyc/cert`: issue a KYC certificate if the account is approved.
    pub async fn issue(
        &self,
        token: &str,
        account_id: &str,
        now: DateTime<Utc>,
    ) -> Result<KycCertificateOutcome, ServiceError> {
        let op = Operation::KycCertificate;
        self.issue_inner(token, account_id, now)
            .await
            .map_err(|e| e.traced(op.path()))
    }

    async fn issue_inner(
        &self,
        token: &str,
        account_id: &str,
        now: DateTime<Utc>,
    ) -> Result<KycCertificateOutcome, ServiceError> {
        let caller =
            self.authenticator
                .authorize(Operation::KycCertificate, token, &[account_id], now)?;
        let account_id = AccountId::parse(account_id)?;
        let account = self
            .store
            .find_account_by_id(&account_id)
            .await?
            .ok_or(ServiceError::AccountNotFound)?;

        let masked = mask::account_id(account_id.as_str());
        match account.kyc_status {
            KycStatus::Approved => {
                let certificate = self.certificates.issue(CertClass::Kyc, caller.client(), now)?;
                tracing::info!(account = %masked, kid = %caller.client().thumbprint(), "KYC certificate issued");
                Ok(KycCertificateOutcome::Issued(certificate))
            }
            KycStatus::Rejected => {
                tracing::info!(account = %masked, "KYC rejected");
                Ok(KycCertificateOutcome::Rejected(
                    account
                        .rejection_reason
                        .filter(|reason| !reason.trim().is_empty())
                        .unwrap_or_else(|| DEFAULT_REJECTION_REASON.to_string()),
                ))
            }
            KycStatus::Pending => Ok(KycCertificateOutcome::Pending),
        }
    }

    /// Record the outcome of an external identity review, creating the
    /// account if it is new. A reason is kept only for rejections.
    pub async fn record_status(
        &self,
        account_id: &AccountId,
        status: KycStatus,
        reason: Option<String>,
    ) -> Result<AccountRecord, ServiceError> {
        let mut account = self
            .store
            .find_account_by_id(account_id)
            .await?
            .unwrap_or_else(|| AccountRecord::new(account_id.clone()));

        account.kyc_status = status;
        account.rejection_reason = match status {
            KycStatus::Rejected => reason,
            KycStatus::Approved | KycStatus::Pending => None,
        };
        self.store.save_account(&account).await?;

        tracing::info!(
            account = %mask::account_id(account_id.as_str()),
            status = %status,
            "KYC status recorded"
        );
        Ok(account)
    }
}
