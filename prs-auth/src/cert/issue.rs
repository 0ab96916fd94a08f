//! Certificate issuance.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::config::AuthConfig;
use crate::identity::{ClientKey, KeyMaterialProvider};
use crate::jws::{CompactJws, JoseHeader};

use super::{CertClass, CertError, CertificateClaims, Confirmation};

/// Mints server-signed certificates.
///
/// Preconditions for each class (proof of work for `Device`, a lower-tier
/// certificate plus OTP/KYC state for `Account`/`Kyc`) are the caller's
/// responsibility; the issuer only signs.
pub struct CertificateIssuer {
    keys: Arc<dyn KeyMaterialProvider>,
    issuer: String,
    ttl: Duration,
}

impl CertificateIssuer {
    #[must_use]
    pub fn new(keys: Arc<dyn KeyMaterialProvider>, config: &AuthConfig) -> Self {
        Self {
            keys,
            issuer: config.issuer.clone(),
            ttl: config.certificate_ttl,
        }
    }

    /// Issue a `class` certificate for `client`, valid from `now` for the
    /// configured TTL.
    ///
    /// # Errors
    ///
    /// Returns `CertError::KeyLoad` if server key material is unavailable.
    pub fn issue(
        &self,
        class: CertClass,
        client: &ClientKey,
        now: DateTime<Utc>,
    ) -> Result<String, CertError> {
        let (private_key, kid) = self.keys.load_signing_key()?;

        let mut header = JoseHeader::es256();
        header.kid = Some(kid.as_str().to_string());

        let iat = now.timestamp();
        let claims = CertificateClaims {
            iss: self.issuer.clone(),
            aud: client.kid().to_string(),
            cls: class,
            cnf: Confirmation {
                jwk: client.jwk().clone(),
            },
            iat,
            exp: iat + self.ttl.num_seconds(),
        };

        Ok(CompactJws::sign(&header, &claims, &private_key)?)
    }

    /// Configured certificate lifetime.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl std::fmt::Debug for CertificateIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateIssuer")
            .field("issuer", &self.issuer)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
