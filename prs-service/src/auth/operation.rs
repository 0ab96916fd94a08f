//! Endpoints and the order in which their parameters are hashed into the
//! assertion's `hash` claim.

use prs_core::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    DeviceInit,
    DeviceValidate,
    OtpSend,
    OtpValidate,
    AccountCertificate,
    EmailOtpSend,
    EmailOtpValidate,
    KycCertificate,
    RecoveryValidate,
}

impl Operation {
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Operation::DeviceInit => "dev/init",
            Operation::DeviceValidate => "dev/validate",
            Operation::OtpSend => "otp/send",
            Operation::OtpValidate => "otp/validate",
            Operation::AccountCertificate => "account/cert",
            Operation::EmailOtpSend => "email-otp/send",
            Operation::EmailOtpValidate => "email-otp/validate",
            Operation::KycCertificate => "kyc/cert",
            Operation::RecoveryValidate => "recovery/validate",
        }
    }

    /// Parameter names, in binding order.
    #[must_use]
    pub fn binding_fields(self) -> &'static [&'static str] {
        match self {
            Operation::DeviceInit => &["timeStamp"],
            Operation::DeviceValidate => &["initiationNonce", "powHash", "powNonce"],
            Operation::OtpSend => &["phoneNumber"],
            Operation::OtpValidate => &["phoneNumber", "otpInput"],
            Operation::AccountCertificate => &["phoneNumber"],
            Operation::EmailOtpSend => &["email", "accountId"],
            Operation::EmailOtpValidate => &["email", "otpInput", "accountId"],
            Operation::KycCertificate => &["accountId"],
            Operation::RecoveryValidate => &["newAccountId"],
        }
    }

    /// Certificate role a caller must present, if any.
    ///
    /// Enrollment is open; recovery authenticates through its own token.
    #[must_use]
    pub fn required_role(self) -> Option<Role> {
        match self {
            Operation::DeviceInit | Operation::DeviceValidate | Operation::RecoveryValidate => None,
            Operation::OtpSend | Operation::OtpValidate | Operation::AccountCertificate => {
                Some(Role::DeviceCert)
            }
            Operation::EmailOtpSend | Operation::EmailOtpValidate | Operation::KycCertificate => {
                Some(Role::AccountCertified)
            }
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}
