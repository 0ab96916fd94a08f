//! Recovery token issuance and redemption.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::cert::{CertClass, CertificateIssuer};
use crate::config::AuthConfig;
use crate::hash;
use crate::identity::{ClientKey, KeyMaterialProvider};
use crate::jws::{CompactJws, JoseHeader};
use crate::replay::ReplayCache;

use super::RecoveryError;

/// `sub` of every recovery token.
pub const RECOVERY_SUBJECT: &str = "RecoveryToken";

/// Message returned with a successful redemption.
const RECOVERY_MESSAGE: &str = "Account recovery successful";

/// Domain separation prefix for replay-cache keys.
const REPLAY_DOMAIN: &[u8] = b"PRS-RECOVERY-v1:";

/// Recovery token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryClaims {
    pub iss: String,
    pub sub: String,
    pub old_account_id: String,
    pub new_account_id: String,
    pub iat: i64,
    pub exp: i64,
}

/// Result of a successful redemption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryOutcome {
    pub old_account_id: String,
    pub new_kyc_certificate: String,
    pub message: String,
}

/// Issues and redeems recovery tokens.
pub struct RecoveryTokens {
    keys: Arc<dyn KeyMaterialProvider>,
    issuer: String,
    ttl: Duration,
    certificates: Arc<CertificateIssuer>,
}

impl RecoveryTokens {
    #[must_use]
    pub fn new(
        keys: Arc<dyn KeyMaterialProvider>,
        config: &AuthConfig,
        certificates: Arc<CertificateIssuer>,
    ) -> Self {
        Self {
            keys,
            issuer: config.issuer.clone(),
            ttl: config.recovery_ttl,
            certificates,
        }
    }

    /// Sign a token linking `old_account_id` to `new_account_id`.
    ///
    /// # Errors
    ///
    /// - `MissingAccountId` if either id is blank
    /// - `KeyLoad` if server key material is unavailable
    pub fn issue(
        &self,
        old_account_id: &str,
        new_account_id: &str,
        now: DateTime<Utc>,
    ) -> Result<String, RecoveryError> {
        if old_account_id.trim().is_empty() || new_account_id.trim().is_empty() {
            return Err(RecoveryError::MissingAccountId);
        }

        let (private_key, kid) = self.keys.load_signing_key()?;
        let mut header = JoseHeader::es256();
        header.kid = Some(kid.as_str().to_string());

        let iat = now.timestamp();
        let claims = RecoveryClaims {
            iss: self.issuer.clone(),
            sub: RECOVERY_SUBJECT.to_string(),
            old_account_id: old_account_id.to_string(),
            new_account_id: new_account_id.to_string(),
            iat,
            exp: iat + self.ttl.num_seconds(),
        };

        Ok(CompactJws::sign(&header, &claims, &private_key)?)
    }

    /// Redeem `token` for `caller`, who claims `new_account_id`.
    ///
    /// On success the token is marked used and a fresh KYC certificate is
    /// issued to `caller`.
    ///
    /// # Errors
    ///
    /// - `MissingAccountId` if `new_account_id` is blank
    /// - `Malformed`, `BadSignature`, `NotRecoveryToken` for tokens this
    ///   server did not issue as recovery tokens
    /// - `Expired` once `now >= exp`
    /// - `ClaimMismatch` if the token names another new account
    /// - `AlreadyRedeemed` on reuse
    /// - `KeyLoad` / `Certificate` for server-side failures
    pub fn redeem(
        &self,
        caller: &ClientKey,
        new_account_id: &str,
        token: &str,
        now: DateTime<Utc>,
        replay_cache: &impl ReplayCache,
    ) -> Result<RecoveryOutcome, RecoveryError> {
        if new_account_id.trim().is_empty() {
            return Err(RecoveryError::MissingAccountId);
        }

        let jws = CompactJws::parse(token)?;
        let server_key = self.keys.load_public_key()?;
        if !jws.verify_with(&server_key) {
            return Err(RecoveryError::BadSignature);
        }

        let claims: RecoveryClaims = jws.claims()?;
        if claims.sub != RECOVERY_SUBJECT || claims.iss != self.issuer {
            return Err(RecoveryError::NotRecoveryToken);
        }
        if now.timestamp() >= claims.exp {
            return Err(RecoveryError::Expired);
        }
        if !bool::from(
            claims
                .new_account_id
                .as_bytes()
                .ct_eq(new_account_id.as_bytes()),
        ) {
            return Err(RecoveryError::ClaimMismatch);
        }

        // Keyed on the claims, not the token bytes: ECDSA signatures are
        // malleable, so one payload can carry more than one valid signature.
        let mut key_input = REPLAY_DOMAIN.to_vec();
        key_input.extend_from_slice(
            format!(
                "{}|{}|{}|{}",
                claims.old_account_id, claims.new_account_id, claims.iat, claims.exp
            )
            .as_bytes(),
        );
        if !replay_cache.check_and_insert(&hash::sha256(key_input))? {
            return Err(RecoveryError::AlreadyRedeemed);
        }

        let certificate = self.certificates.issue(CertClass::Kyc, caller, now)?;
        Ok(RecoveryOutcome {
            old_account_id: claims.old_account_id,
            new_kyc_certificate: certificate,
            message: RECOVERY_MESSAGE.to_string(),
        })
    }
}

impl std::fmt::Debug for RecoveryTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryTokens")
            .field("issuer", &self.issuer)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
