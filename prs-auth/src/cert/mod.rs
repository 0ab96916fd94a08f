//! Server-signed bearer certificates.
//!
//! A certificate is a compact ES256 JWS signed by the server key:
//!
//! | Header | `alg=ES256`, `typ=JWT`, `kid=<server kid>`             |
//! |--------|--------------------------------------------------------|
//! | Claims | `iss`, `aud=<client kid>`, `cls`, `cnf.jwk`, `iat`, `exp` |
//!
//! It says "the server attests that this key holds property `cls` until
//! `exp`". Certificates travel nested in the header of a client
//! assertion and are never revoked; expiry is the only invalidation.

mod error;
mod issue;
mod verify;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{Jwk, KeyId};
use crate::jws::JoseHeader;

pub use error::CertError;
pub use issue::CertificateIssuer;
pub use verify::CertificateVerifier;

/// Trust tier a certificate attests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertClass {
    /// Device enrolled via nonce + proof of work.
    Device,
    /// Phone number verified by SMS OTP.
    Account,
    /// KYC approved.
    Kyc,
}

impl CertClass {
    /// All classes, lowest tier first.
    pub const ALL: [CertClass; 3] = [CertClass::Device, CertClass::Account, CertClass::Kyc];

    /// Header member carrying a certificate of this class.
    #[must_use]
    pub fn slot(self) -> &'static str {
        match self {
            CertClass::Device => "devJwt",
            CertClass::Account => "accountJwt",
            CertClass::Kyc => "kycJwt",
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CertClass::Device => "device",
            CertClass::Account => "account",
            CertClass::Kyc => "kyc",
        }
    }

    /// Read this class's slot from a header.
    #[must_use]
    pub fn slot_in(self, header: &JoseHeader) -> Option<&str> {
        match self {
            CertClass::Device => header.dev_jwt.as_deref(),
            CertClass::Account => header.account_jwt.as_deref(),
            CertClass::Kyc => header.kyc_jwt.as_deref(),
        }
    }

    pub(crate) fn set_slot(self, header: &mut JoseHeader, certificate: String) {
        let slot = match self {
            CertClass::Device => &mut header.dev_jwt,
            CertClass::Account => &mut header.account_jwt,
            CertClass::Kyc => &mut header.kyc_jwt,
        };
        *slot = Some(certificate);
    }
}

impl std::fmt::Display for CertClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Proof-of-possession confirmation claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub jwk: Jwk,
}

/// Certificate payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateClaims {
    pub iss: String,
    pub aud: String,
    pub cls: CertClass,
    pub cnf: Confirmation,
    pub iat: i64,
    pub exp: i64,
}

/// Trust established for one request by verified nested certificates.
///
/// Never cached across requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustGrant {
    subject: KeyId,
    classes: BTreeSet<CertClass>,
    expires_at: DateTime<Utc>,
}

impl TrustGrant {
    pub(crate) fn new(subject: KeyId, classes: BTreeSet<CertClass>, expires_at: DateTime<Utc>) -> Self {
        Self {
            subject,
            classes,
            expires_at,
        }
    }

    /// Thumbprint of the key the grant is for.
    #[must_use]
    pub fn subject(&self) -> &KeyId {
        &self.subject
    }

    /// Whether a certificate of `class` was presented and verified.
    #[must_use]
    pub fn has(&self, class: CertClass) -> bool {
        self.classes.contains(&class)
    }

    #[must_use]
    pub fn classes(&self) -> &BTreeSet<CertClass> {
        &self.classes
    }

    /// Highest verified tier.
    #[must_use]
    pub fn highest(&self) -> Option<CertClass> {
        self.classes.iter().next_back().copied()
    }

    /// Earliest `exp` among the verified certificates.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

#[cfg(test)]
mod tests;
