//! Client-side assertion construction.

use chrono::{DateTime, Utc};

use crate::cert::CertClass;
use crate::identity::{Jwk, PrivateKey};
use crate::jws::{CompactJws, JoseHeader, TokenError};

use super::validate::binding_hash;

/// Builds a self-signed assertion embedding the signer's public JWK.
///
/// ```
/// use prs_auth::assertion::{validate_assertion, AssertionBuilder};
/// use prs_auth::identity::PrivateKey;
///
/// let key = PrivateKey::generate();
/// let token = AssertionBuilder::new(&key, &["+237691234567"]).sign().unwrap();
/// let verified = validate_assertion(&token, &["+237691234567"]).unwrap();
/// assert_eq!(verified.client().public_key(), &key.public_key());
/// ```
pub struct AssertionBuilder<'a> {
    key: &'a PrivateKey,
    header: JoseHeader,
    hash: String,
    issued_at: Option<i64>,
}

impl<'a> AssertionBuilder<'a> {
    /// Start an assertion bound to `params`, in order.
    #[must_use]
    pub fn new(key: &'a PrivateKey, params: &[&str]) -> Self {
        let mut header = JoseHeader::es256();
        header.jwk = Some(Jwk::from_public_key(&key.public_key()));
        Self {
            key,
            header,
            hash: binding_hash(params),
            issued_at: None,
        }
    }

    /// Set a `kid` on the embedded JWK.
    #[must_use]
    pub fn with_kid(mut self, kid: impl Into<String>) -> Self {
        self.header.jwk = self.header.jwk.map(|jwk| jwk.with_kid(kid));
        self
    }

    /// Nest a certificate in the slot for `class`.
    #[must_use]
    pub fn with_certificate(mut self, class: CertClass, certificate: impl Into<String>) -> Self {
        class.set_slot(&mut self.header, certificate.into());
        self
    }

    /// Carry a recovery token in the `recoveryJwt` slot.
    #[must_use]
    pub fn with_recovery_token(mut self, token: impl Into<String>) -> Self {
        self.header.recovery_jwt = Some(token.into());
        self
    }

    /// Add an `iat` claim.
    #[must_use]
    pub fn issued_at(mut self, now: DateTime<Utc>) -> Self {
        self.issued_at = Some(now.timestamp());
        self
    }

    /// Sign and serialize.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::InvalidClaims` if serialization fails.
    pub fn sign(self) -> Result<String, TokenError> {
        let mut claims = serde_json::json!({ "hash": self.hash });
        if let Some(iat) = self.issued_at {
            claims["iat"] = iat.into();
        }
        CompactJws::sign(&self.header, &claims, self.key)
    }
}
