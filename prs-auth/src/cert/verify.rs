//! Certificate verification.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use crate::assertion::VerifiedAssertion;
use crate::config::AuthConfig;
use crate::identity::{ClientKey, KeyId, KeyMaterialProvider};
use crate::jws::{CompactJws, TokenError};

use super::{CertClass, CertError, CertificateClaims, TrustGrant};

/// Verifies certificates nested in a validated assertion.
pub struct CertificateVerifier {
    keys: Arc<dyn KeyMaterialProvider>,
    issuer: String,
}

impl CertificateVerifier {
    #[must_use]
    pub fn new(keys: Arc<dyn KeyMaterialProvider>, config: &AuthConfig) -> Self {
        Self {
            keys,
            issuer: config.issuer.clone(),
        }
    }

    /// Verify every certificate slot present in the assertion header.
    ///
    /// Returns `Ok(None)` when no slot is present: the caller proceeds
    /// unauthenticated. Any present slot that fails verification fails the
    /// whole request.
    ///
    /// # Errors
    ///
    /// See [`CertificateVerifier::verify_certificate`].
    pub fn verify(
        &self,
        assertion: &VerifiedAssertion,
        now: DateTime<Utc>,
    ) -> Result<Option<TrustGrant>, CertError> {
        let mut classes = BTreeSet::new();
        let mut earliest_exp: Option<i64> = None;

        for class in CertClass::ALL {
            let Some(token) = class.slot_in(assertion.header()) else {
                continue;
            };
            let claims = self.verify_certificate(class, token, assertion.client(), now)?;
            classes.insert(class);
            earliest_exp = Some(earliest_exp.map_or(claims.exp, |exp| exp.min(claims.exp)));
        }

        let Some(exp) = earliest_exp else {
            return Ok(None);
        };
        let expires_at = Utc
            .timestamp_opt(exp, 0)
            .single()
            .ok_or(CertError::Malformed(TokenError::InvalidClaims))?;

        Ok(Some(TrustGrant::new(
            assertion.client().thumbprint().clone(),
            classes,
            expires_at,
        )))
    }

    /// Verify one certificate of `class` for `client`.
    ///
    /// Checks, in order: structure, signer `kid`, signature under the
    /// server public key, issuer, class, `cnf.jwk` identity, expiry.
    ///
    /// # Errors
    ///
    /// - `KeyLoad` if the server public key is unavailable
    /// - `Malformed`, `UnknownSigner`, `BadSignature`, `WrongIssuer`,
    ///   `ClassMismatch` for certificates the server did not mint as such
    /// - `IdentityMismatch` if the certificate is bound to another key
    /// - `CertificateExpired` once `now >= exp`
    pub fn verify_certificate(
        &self,
        class: CertClass,
        token: &str,
        client: &ClientKey,
        now: DateTime<Utc>,
    ) -> Result<CertificateClaims, CertError> {
        let jws = CompactJws::parse(token)?;
        let server_key = self.keys.load_public_key()?;

        if let Some(kid) = jws.header().kid.as_deref() {
            if !KeyId::from_public_key(&server_key).matches(kid) {
                return Err(CertError::UnknownSigner);
            }
        }
        if !jws.verify_with(&server_key) {
            return Err(CertError::BadSignature);
        }

        let claims: CertificateClaims = jws.claims()?;
        if claims.iss != self.issuer {
            return Err(CertError::WrongIssuer);
        }
        if claims.cls != class {
            return Err(CertError::ClassMismatch { slot: class.slot() });
        }

        let bound = ClientKey::from_jwk(claims.cnf.jwk.clone())
            .map_err(|_| CertError::Malformed(TokenError::InvalidClaims))?;
        if bound.thumbprint() != client.thumbprint() {
            return Err(CertError::IdentityMismatch);
        }

        if now.timestamp() >= claims.exp {
            return Err(CertError::CertificateExpired);
        }

        Ok(claims)
    }
}

impl std::fmt::Debug for CertificateVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateVerifier")
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}
