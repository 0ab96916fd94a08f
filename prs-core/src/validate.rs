//! Validated request inputs: phone numbers, email addresses, account ids.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

static PHONE_REGEX: OnceLock<Regex> = OnceLock::new();
static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();

fn phone_regex() -> &'static Regex {
    // E.164: optional '+', no leading zero, at most 15 digits.
    PHONE_REGEX.get_or_init(|| Regex::new(r"^\+?[1-9]\d{1,14}$").expect("static pattern"))
}

fn email_regex() -> &'static Regex {
    EMAIL_REGEX
        .get_or_init(|| Regex::new(r"^[\w.-]+@([\w-]+\.)+[\w-]{2,4}$").expect("static pattern"))
}

/// Input rejected before any cryptographic work is done.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("invalid phone number")]
    InvalidPhoneNumber,

    #[error("invalid email address")]
    InvalidEmail,

    #[error("account id must not be empty")]
    EmptyAccountId,
}

/// Phone number in E.164 form, e.g. `+237691234567`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        if phone_regex().is_match(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(ValidationError::InvalidPhoneNumber)
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(value: PhoneNumber) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl EmailAddress {
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        if email_regex().is_match(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(ValidationError::InvalidEmail)
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

/// Bank account identifier. Opaque apart from being non-blank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        if value.trim().is_empty() {
            Err(ValidationError::EmptyAccountId)
        } else {
            Ok(Self(value.to_string()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AccountId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AccountId> for String {
    fn from(value: AccountId) -> Self {
        value.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_numbers() {
        assert!(PhoneNumber::parse("+237691234567").is_ok());
        assert!(PhoneNumber::parse("237691234567").is_ok());
        assert!(PhoneNumber::parse("+49").is_ok());

        assert_eq!(
            PhoneNumber::parse("+0691234567").unwrap_err(),
            ValidationError::InvalidPhoneNumber
        );
        assert!(PhoneNumber::parse("+2").is_err());
        assert!(PhoneNumber::parse("+2376912345678901").is_err());
        assert!(PhoneNumber::parse("+237 691 234 567").is_err());
        assert!(PhoneNumber::parse("").is_err());
    }

    #[test]
    fn test_email_addresses() {
        assert!(EmailAddress::parse("jane.doe@example.com").is_ok());
        assert!(EmailAddress::parse("a-b_c@mail.bank.cm").is_ok());

        assert_eq!(
            EmailAddress::parse("jane@localhost").unwrap_err(),
            ValidationError::InvalidEmail
        );
        assert!(EmailAddress::parse("jane@example.museum").is_err());
        assert!(EmailAddress::parse("@example.com").is_err());
        assert!(EmailAddress::parse("jane example@example.com").is_err());
    }

    #[test]
    fn test_account_id_must_not_be_blank() {
        assert_eq!(AccountId::parse("ACC_1").unwrap().as_str(), "ACC_1");
        assert_eq!(
            AccountId::parse("   ").unwrap_err(),
            ValidationError::EmptyAccountId
        );
        assert_eq!(AccountId::parse("").unwrap_err(), ValidationError::EmptyAccountId);
    }

    #[test]
    fn test_deserialize_validates() {
        let phone: PhoneNumber = serde_json::from_str(r#""+237691234567""#).unwrap();
        assert_eq!(phone.as_str(), "+237691234567");
        assert!(serde_json::from_str::<PhoneNumber>(r#""call me""#).is_err());
        assert!(serde_json::from_str::<AccountId>(r#""""#).is_err());

        let json = serde_json::to_string(&AccountId::parse("ACC_2").unwrap()).unwrap();
        assert_eq!(json, r#""ACC_2""#);
    }
}
