//! Roles granted by certificates and the result of checking them.

use serde::{Deserialize, Serialize};

/// Authority a caller holds for the duration of one request.
///
/// Roles are ordered by trust tier: a KYC-certified caller is also account
/// and device certified in the sense that it passed those steps first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Holds a device certificate (enrollment and proof-of-work passed).
    #[serde(rename = "ROLE_DEVICE_CERT")]
    DeviceCert,
    /// Holds an account certificate (phone OTP validated).
    #[serde(rename = "ROLE_ACCOUNT_CERTIFIED")]
    AccountCertified,
    /// Holds a KYC certificate (identity verification approved).
    #[serde(rename = "ROLE_KYC_CERT")]
    KycCert,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::DeviceCert, Role::AccountCertified, Role::KycCert];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::DeviceCert => "ROLE_DEVICE_CERT",
            Role::AccountCertified => "ROLE_ACCOUNT_CERTIFIED",
            Role::KycCert => "ROLE_KYC_CERT",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum AuthzDecision {
    /// Action is permitted.
    Allow,
    /// Action is denied with explanation.
    Deny {
        /// Human-readable reason for denial.
        reason: String,
    },
}

impl AuthzDecision {
    pub fn allow() -> Self {
        Self::Allow
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self::Deny {
            reason: reason.into(),
        }
    }

    /// Returns true if this is an Allow decision.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_names() {
        assert_eq!(
            serde_json::to_string(&Role::DeviceCert).unwrap(),
            r#""ROLE_DEVICE_CERT""#
        );
        assert_eq!(
            serde_json::to_string(&Role::AccountCertified).unwrap(),
            r#""ROLE_ACCOUNT_CERTIFIED""#
        );
        assert_eq!(
            serde_json::to_string(&Role::KycCert).unwrap(),
            r#""ROLE_KYC_CERT""#
        );
    }

    #[test]
    fn test_role_display_matches_wire_name() {
        for role in Role::ALL {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{}\"", role));
            let parsed: Role = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, role);
        }
    }

    #[test]
    fn test_roles_ordered_by_tier() {
        assert!(Role::DeviceCert < Role::AccountCertified);
        assert!(Role::AccountCertified < Role::KycCert);
    }

    #[test]
    fn test_authz_decision_allow_roundtrip() {
        let decision = AuthzDecision::allow();
        let json = serde_json::to_string(&decision).unwrap();
        assert_eq!(json, r#"{"decision":"allow"}"#);
        let parsed: AuthzDecision = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, decision);
    }

    #[test]
    fn test_authz_decision_deny_roundtrip() {
        let decision = AuthzDecision::deny("ROLE_KYC_CERT required");
        let json = serde_json::to_string(&decision).unwrap();
        assert_eq!(
            json,
            r#"{"decision":"deny","reason":"ROLE_KYC_CERT required"}"#
        );
        let parsed: AuthzDecision = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, decision);
        assert!(!parsed.is_allowed());
    }
}
