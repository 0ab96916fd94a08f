//! Pure authentication library for PRS.
//!
//! Clients authenticate without server-side sessions: every request carries
//! a client-signed assertion embedding the client's P-256 public key, and
//! trust is layered on top with server-signed certificates nested in that
//! assertion's header.
//!
//! This crate is intentionally IO-free:
//! - No filesystem operations
//! - No network calls
//! - No database interactions
//! - No logging
//!
//! Time is always passed in explicitly. Dependencies are injected via traits:
//! - [`identity::KeyMaterialProvider`] - Server key pair
//! - [`replay::ReplayCache`] - Single-use tracking for proofs and recovery tokens
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use chrono::Utc;
//! use prs_auth::{
//!     AssertionBuilder, AuthConfig, CertClass, CertificateIssuer, CertificateVerifier,
//!     KeyMaterialProvider, PrivateKey, ServerKeys, validate_assertion,
//! };
//!
//! let keys: Arc<dyn KeyMaterialProvider> = Arc::new(ServerKeys::generate());
//! let config = AuthConfig::new("server-salt");
//! let issuer = CertificateIssuer::new(keys.clone(), &config);
//! let verifier = CertificateVerifier::new(keys, &config);
//! let now = Utc::now();
//!
//! // Client signs an assertion; the server validates it and issues a certificate
//! let device = PrivateKey::generate();
//! let token = AssertionBuilder::new(&device, &["param"]).sign().unwrap();
//! let assertion = validate_assertion(&token, &["param"]).unwrap();
//! let cert = issuer.issue(CertClass::Device, assertion.client(), now).unwrap();
//!
//! // Later requests nest the certificate
//! let token = AssertionBuilder::new(&device, &[])
//!     .with_certificate(CertClass::Device, cert)
//!     .sign()
//!     .unwrap();
//! let assertion = validate_assertion(&token, &[]).unwrap();
//! let grant = verifier.verify(&assertion, now).unwrap().unwrap();
//! assert!(grant.has(CertClass::Device));
//! ```

pub mod assertion;
pub mod cert;
pub mod config;
pub mod enrollment;
pub mod hash;
pub mod identity;
pub mod jws;
pub mod recovery;
pub mod replay;

pub use assertion::{validate_assertion, AssertionBuilder, AssertionError, VerifiedAssertion};
pub use cert::{CertClass, CertError, CertificateIssuer, CertificateVerifier, TrustGrant};
pub use config::AuthConfig;
pub use enrollment::{EnrollmentError, EnrollmentVerifier, ProofOfWork};
pub use hash::{HashError, SlowHasher};
pub use identity::{ClientKey, Jwk, KeyError, KeyId, KeyMaterialProvider, PrivateKey, PublicKey, ServerKeys};
pub use jws::TokenError;
pub use recovery::{RecoveryError, RecoveryOutcome, RecoveryTokens};
pub use replay::{ReplayCache, ReplayCacheFull, TtlReplayCache};
