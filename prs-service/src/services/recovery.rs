//! Account recovery: link an old account to a new device key.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use prs_auth::{TtlReplayCache, RecoveryOutcome, RecoveryTokens};
use prs_core::mask;

use crate::auth::{Authenticator, Operation};
use crate::error::ServiceError;

pub struct RecoveryService {
    authenticator: Arc<Authenticator>,
    tokens: RecoveryTokens,
    replay_cache: Arc<TtlReplayCache>,
}

impl RecoveryService {
    pub fn new(
        authenticator: Arc<Authenticator>,
        tokens: RecoveryTokens,
        replay_cache: Arc<TtlReplayCache>,
    ) -> Self {
        Self {
            authenticator,
            tokens,
            replay_cache,
        }
    }

    /// Issue a recovery token after an operator has confirmed the user owns
    /// `old_account_id`.
    pub fn request_token(
        &self,
        old_account_id: &str,
        new_account_id: &str,
        now: DateTime<Utc>,
    ) -> Result<String, ServiceError> {
        let token = self.tokens.issue(old_account_id, new_account_id, now)?;
        tracing::info!(
            old_account = %mask::account_id(old_account_id),
            new_account = %mask::account_id(new_account_id),
            "Recovery token issued"
        );
        Ok(token)
    }

    /// `recovery/validate`: redeem the token carried in the assertion's
    /// `recoveryJwt` slot for a KYC certificate bound to the caller's key.
    pub fn process(
        &self,
        token: &str,
        new_account_id: &str,
        now: DateTime<Utc>,
    ) -> Result<RecoveryOutcome, ServiceError> {
        let op = Operation::RecoveryValidate;
        self.authenticator
            .authorize(op, token, &[new_account_id], now)
            .and_then(|caller| {
                let recovery_token = caller
                    .assertion()
                    .header()
                    .recovery_jwt
                    .as_deref()
                    .ok_or(ServiceError::MissingRecoveryToken)?;

                let outcome = self.tokens.redeem(
                    caller.client(),
                    new_account_id,
                    recovery_token,
                    now,
                    &*self.replay_cache,
                )?;
                tracing::info!(
                    old_account = %mask::account_id(&outcome.old_account_id),
                    new_account = %mask::account_id(new_account_id),
                    kid = %caller.client().thumbprint(),
                    "Account recovered"
                );
                Ok(outcome)
            })
            .map_err(|e| e.traced(op.path()))
    }
}
