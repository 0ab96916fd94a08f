//! Request handlers, one per endpoint family.

mod account_cert;
mod device_reg;
mod email_otp;
mod kyc_cert;
mod otp;
mod rate_limit;
mod recovery;

pub use account_cert::AccountCertificateService;
pub use device_reg::DeviceRegistrationService;
pub use email_otp::{generate_email_code, EmailOtpEngine, EmailOtpSent, EMAIL_OTP_SUBJECT};
pub use kyc_cert::{KycCertificateOutcome, KycCertificateService, DEFAULT_REJECTION_REASON};
pub use otp::{generate_sms_code, sms_otp_hash, OtpEngine, OtpOutcome, OtpSent, PendingOtp};
pub use rate_limit::OtpRateLimiter;
pub use recovery::RecoveryService;

use std::sync::Arc;
use std::time::Duration;

use prs_auth::enrollment::WINDOW_SECONDS;
use prs_auth::{
    CertificateIssuer, EnrollmentVerifier, KeyMaterialProvider, TtlReplayCache, RecoveryTokens,
    SlowHasher,
};

use crate::auth::Authenticator;
use crate::config::PrsConfig;
use crate::error::ServiceError;
use crate::mail::MailTransport;
use crate::store::RecordStore;

/// Replay cache capacity shared by proofs of work and recovery tokens.
pub const REPLAY_CACHE_CAPACITY: usize = 100_000;

/// Every handler, wired to one key provider, store and mail transport.
pub struct Services<S, M> {
    pub authenticator: Arc<Authenticator>,
    pub device: DeviceRegistrationService,
    pub otp: OtpEngine<S>,
    pub account: AccountCertificateService<S>,
    pub email_otp: EmailOtpEngine<S, M>,
    pub kyc: KycCertificateService<S>,
    pub recovery: RecoveryService,
}

impl<S: RecordStore, M: MailTransport> Services<S, M> {
    pub fn build(
        config: &PrsConfig,
        keys: Arc<dyn KeyMaterialProvider>,
        store: Arc<S>,
        mail: Arc<M>,
    ) -> Result<Self, ServiceError> {
        let auth = config.auth_config();
        let authenticator = Arc::new(Authenticator::new(keys.clone(), &auth));
        let certificates = Arc::new(CertificateIssuer::new(keys.clone(), &auth));

        // Entries must outlive both a recovery token and every nonce window
        // a proof can still be accepted in.
        let nonce_span = (i64::from(auth.nonce_skew_windows) + 1) * WINDOW_SECONDS;
        let retention = auth.recovery_ttl.num_seconds().max(nonce_span).max(0);
        let replay_cache = Arc::new(TtlReplayCache::new(
            Duration::from_secs(retention.unsigned_abs()),
            REPLAY_CACHE_CAPACITY,
        ));

        Ok(Self {
            device: DeviceRegistrationService::new(
                authenticator.clone(),
                EnrollmentVerifier::new(&auth),
                certificates.clone(),
                replay_cache.clone(),
            ),
            otp: OtpEngine::new(
                store.clone(),
                authenticator.clone(),
                auth.salt.clone(),
                OtpRateLimiter::new(config.otp_sends_per_minute),
            ),
            account: AccountCertificateService::new(
                store.clone(),
                authenticator.clone(),
                certificates.clone(),
            ),
            email_otp: EmailOtpEngine::new(
                store.clone(),
                mail,
                authenticator.clone(),
                SlowHasher::new()?,
                OtpRateLimiter::new(config.otp_sends_per_minute),
            ),
            kyc: KycCertificateService::new(store, authenticator.clone(), certificates.clone()),
            recovery: RecoveryService::new(
                authenticator.clone(),
                RecoveryTokens::new(keys, &auth, certificates),
                replay_cache,
            ),
            authenticator,
        })
    }
}
