//! Account personal-info records.

use serde::{Deserialize, Serialize};

use crate::otp::EmailOtp;
use crate::validate::AccountId;

/// Outcome of the (external) identity verification workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KycStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl KycStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            KycStatus::Pending => "PENDING",
            KycStatus::Approved => "APPROVED",
            KycStatus::Rejected => "REJECTED",
        }
    }
}

impl std::str::FromStr for KycStatus {
    type Err = crate::otp::UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(KycStatus::Pending),
            "APPROVED" => Ok(KycStatus::Approved),
            "REJECTED" => Ok(KycStatus::Rejected),
            _ => Err(crate::otp::UnknownStatus(s.to_string())),
        }
    }
}

impl std::fmt::Display for KycStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Personal info for one account: KYC state plus the email OTP slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    pub account_id: AccountId,
    pub kyc_status: KycStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_otp: Option<EmailOtp>,
}

impl AccountRecord {
    /// A new account awaiting identity verification.
    #[must_use]
    pub fn new(account_id: AccountId) -> Self {
        Self {
            account_id,
            kyc_status: KycStatus::Pending,
            rejection_reason: None,
            email: None,
            email_otp: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kyc_status_parse() {
        assert_eq!("APPROVED".parse::<KycStatus>().unwrap(), KycStatus::Approved);
        assert_eq!("rejected".parse::<KycStatus>().unwrap(), KycStatus::Rejected);
        assert!("maybe".parse::<KycStatus>().is_err());
    }

    #[test]
    fn test_account_record_json_shape() {
        let mut record = AccountRecord::new(AccountId::parse("ACC_1").unwrap());
        record.kyc_status = KycStatus::Rejected;
        record.rejection_reason = Some("blurry passport".into());

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["accountId"], "ACC_1");
        assert_eq!(json["kycStatus"], "REJECTED");
        assert_eq!(json["rejectionReason"], "blurry passport");
        assert!(json.get("emailOtp").is_none());

        let parsed: AccountRecord = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, record);
    }
}
