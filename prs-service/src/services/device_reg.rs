//! Device registration: enrollment nonce, proof of work, device certificate.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use prs_auth::{CertClass, CertificateIssuer, EnrollmentVerifier, TtlReplayCache, ProofOfWork};

use crate::auth::{Authenticator, Operation};
use crate::error::ServiceError;

pub struct DeviceRegistrationService {
    authenticator: Arc<Authenticator>,
    enrollment: EnrollmentVerifier,
    certificates: Arc<CertificateIssuer>,
    replay_cache: Arc<TtlReplayCache>,
}

impl DeviceRegistrationService {
    pub fn new(
        authenticator: Arc<Authenticator>,
        enrollment: EnrollmentVerifier,
        certificates: Arc<CertificateIssuer>,
        replay_cache: Arc<TtlReplayCache>,
    ) -> Self {
        Self {
            authenticator,
            enrollment,
            certificates,
            replay_cache,
        }
    }

    /// `dev/init`: return the enrollment nonce for the current window.
    pub fn initiate(
        &self,
        token: &str,
        time_stamp: &str,
        now: DateTime<Utc>,
    ) -> Result<String, ServiceError> {
        let op = Operation::DeviceInit;
        self.authenticator
            .authorize(op, token, &[time_stamp], now)
            .and_then(|caller| {
                let nonce = self.enrollment.issue_nonce(now)?;
                tracing::info!(kid = %caller.client().thumbprint(), "Enrollment nonce issued");
                Ok(nonce)
            })
            .map_err(|e| e.traced(op.path()))
    }

    /// `dev/validate`: check the proof of work and issue a device
    /// certificate to the key that signed the request.
    pub fn validate(
        &self,
        token: &str,
        initiation_nonce: &str,
        pow_hash: &str,
        pow_nonce: &str,
        now: DateTime<Utc>,
    ) -> Result<String, ServiceError> {
        let op = Operation::DeviceValidate;
        self.authenticator
            .authorize(op, token, &[initiation_nonce, pow_hash, pow_nonce], now)
            .and_then(|caller| {
                let proof = ProofOfWork {
                    initiation_nonce,
                    pow_nonce,
                    pow_hash,
                };
                self.enrollment
                    .verify_proof_of_work(&proof, now, &*self.replay_cache)?;

                let certificate = self
                    .certificates
                    .issue(CertClass::Device, caller.client(), now)?;
                tracing::info!(kid = %caller.client().thumbprint(), "Device certificate issued");
                Ok(certificate)
            })
            .map_err(|e| e.traced(op.path()))
    }
}
