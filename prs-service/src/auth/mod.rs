//! Request authentication: assertion, then certificates, then role.
//!
//! Every handler receives the caller as an explicit [`Caller`] produced
//! here; nothing reads the caller's key from ambient state.

mod keys;
mod operation;

pub use keys::ServerKeyProvider;
pub use operation::Operation;

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use prs_auth::{
    validate_assertion, AuthConfig, CertClass, CertificateVerifier, ClientKey,
    KeyMaterialProvider, TrustGrant, VerifiedAssertion,
};
use prs_core::{AuthzDecision, Role};

use crate::error::ServiceError;

/// Role granted by a certificate class.
#[must_use]
pub fn role_for(class: CertClass) -> Role {
    match class {
        CertClass::Device => Role::DeviceCert,
        CertClass::Account => Role::AccountCertified,
        CertClass::Kyc => Role::KycCert,
    }
}

/// An authenticated caller, valid for one request.
#[derive(Debug)]
pub struct Caller {
    assertion: VerifiedAssertion,
    grant: Option<TrustGrant>,
}

impl Caller {
    #[must_use]
    pub fn client(&self) -> &ClientKey {
        self.assertion.client()
    }

    #[must_use]
    pub fn assertion(&self) -> &VerifiedAssertion {
        &self.assertion
    }

    #[must_use]
    pub fn grant(&self) -> Option<&TrustGrant> {
        self.grant.as_ref()
    }

    #[must_use]
    pub fn roles(&self) -> BTreeSet<Role> {
        self.grant
            .iter()
            .flat_map(|grant| grant.classes().iter().copied().map(role_for))
            .collect()
    }

    #[must_use]
    pub fn check(&self, role: Role) -> AuthzDecision {
        if self.roles().contains(&role) {
            AuthzDecision::allow()
        } else {
            AuthzDecision::deny(format!("{} required", role))
        }
    }

    pub fn require(&self, role: Role) -> Result<(), ServiceError> {
        if self.check(role).is_allowed() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(role))
        }
    }
}

/// Runs the assertion validator and certificate verifier for each request.
pub struct Authenticator {
    verifier: CertificateVerifier,
}

impl Authenticator {
    #[must_use]
    pub fn new(keys: Arc<dyn KeyMaterialProvider>, config: &AuthConfig) -> Self {
        Self {
            verifier: CertificateVerifier::new(keys, config),
        }
    }

    /// Validate `token` against `params` and verify any nested certificates.
    pub fn authenticate(
        &self,
        token: &str,
        params: &[&str],
        now: DateTime<Utc>,
    ) -> Result<Caller, ServiceError> {
        let assertion = validate_assertion(token, params)?;
        let grant = self.verifier.verify(&assertion, now)?;
        Ok(Caller { assertion, grant })
    }

    /// Authenticate for `operation` and enforce its role.
    ///
    /// `params` must be given in the operation's binding order.
    pub fn authorize(
        &self,
        operation: Operation,
        token: &str,
        params: &[&str],
        now: DateTime<Utc>,
    ) -> Result<Caller, ServiceError> {
        debug_assert_eq!(params.len(), operation.binding_fields().len());

        let caller = self.authenticate(token, params, now)?;
        if let Some(role) = operation.required_role() {
            caller.require(role)?;
        }

        tracing::debug!(
            operation = %operation,
            kid = %caller.client().thumbprint(),
            roles = ?caller.roles(),
            "Caller authenticated"
        );
        Ok(caller)
    }
}
