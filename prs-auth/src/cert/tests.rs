use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};

use super::*;
use crate::assertion::{validate_assertion, AssertionBuilder};
use crate::config::AuthConfig;
use crate::identity::{ClientKey, KeyError, KeyMaterialProvider, PrivateKey, ServerKeys};
use crate::jws::CompactJws;

struct Fixture {
    keys: Arc<ServerKeys>,
    config: AuthConfig,
    issuer: CertificateIssuer,
    verifier: CertificateVerifier,
}

impl Fixture {
    fn new() -> Self {
        let keys = Arc::new(ServerKeys::generate());
        let config = AuthConfig::new("salt");
        let provider: Arc<dyn KeyMaterialProvider> = keys.clone();
        Self {
            issuer: CertificateIssuer::new(provider.clone(), &config),
            verifier: CertificateVerifier::new(provider, &config),
            keys,
            config,
        }
    }

    /// Present `certificate` in `class`'s slot of an assertion signed by `key`.
    fn present(
        &self,
        key: &PrivateKey,
        class: CertClass,
        certificate: &str,
        now: chrono::DateTime<Utc>,
    ) -> Result<Option<TrustGrant>, CertError> {
        let token = AssertionBuilder::new(key, &["param"])
            .with_certificate(class, certificate)
            .sign()
            .unwrap();
        let assertion = validate_assertion(&token, &["param"]).unwrap();
        self.verifier.verify(&assertion, now)
    }
}

fn client_of(key: &PrivateKey) -> ClientKey {
    ClientKey::from_public_key(&key.public_key())
}

fn t0() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

#[test]
fn test_issue_then_verify_grants_class() {
    let fx = Fixture::new();
    let key = PrivateKey::generate();

    for class in CertClass::ALL {
        let cert = fx.issuer.issue(class, &client_of(&key), t0()).unwrap();
        let grant = fx.present(&key, class, &cert, t0()).unwrap().unwrap();

        assert!(grant.has(class));
        assert_eq!(grant.highest(), Some(class));
        assert_eq!(grant.subject(), client_of(&key).thumbprint());
    }
}

#[test]
fn test_certificate_header_and_claims_layout() {
    let fx = Fixture::new();
    let key = PrivateKey::generate();
    let client = client_of(&key);

    let cert = fx.issuer.issue(CertClass::Device, &client, t0()).unwrap();
    let jws = CompactJws::parse(&cert).unwrap();
    let claims: CertificateClaims = jws.claims().unwrap();

    assert_eq!(jws.header().alg, "ES256");
    assert_eq!(jws.header().typ.as_deref(), Some("JWT"));
    assert_eq!(jws.header().kid.as_deref(), Some(fx.keys.kid().as_str()));
    assert_eq!(claims.iss, fx.config.issuer);
    assert_eq!(claims.aud, client.kid());
    assert_eq!(claims.cls, CertClass::Device);
    assert_eq!(claims.cnf.jwk, *client.jwk());
    assert_eq!(claims.exp - claims.iat, 3600);
}

#[test]
fn test_no_slot_grants_nothing() {
    let fx = Fixture::new();
    let key = PrivateKey::generate();
    let token = AssertionBuilder::new(&key, &[]).sign().unwrap();
    let assertion = validate_assertion(&token, &[]).unwrap();

    assert_eq!(fx.verifier.verify(&assertion, t0()).unwrap(), None);
}

#[test]
fn test_other_key_presenting_certificate_is_identity_mismatch() {
    let fx = Fixture::new();
    let owner = PrivateKey::generate();
    let thief = PrivateKey::generate();
    let cert = fx.issuer.issue(CertClass::Account, &client_of(&owner), t0()).unwrap();

    assert_eq!(
        fx.present(&thief, CertClass::Account, &cert, t0()).unwrap_err(),
        CertError::IdentityMismatch
    );
}

#[test]
fn test_expiry_boundary() {
    let fx = Fixture::new();
    let key = PrivateKey::generate();
    let cert = fx.issuer.issue(CertClass::Device, &client_of(&key), t0()).unwrap();
    let exp = t0() + Duration::hours(1);

    assert!(fx
        .present(&key, CertClass::Device, &cert, exp - Duration::seconds(1))
        .is_ok());
    assert_eq!(
        fx.present(&key, CertClass::Device, &cert, exp).unwrap_err(),
        CertError::CertificateExpired
    );
    assert_eq!(
        fx.present(&key, CertClass::Device, &cert, exp + Duration::seconds(1))
            .unwrap_err(),
        CertError::CertificateExpired
    );
}

#[test]
fn test_certificate_from_other_server_rejected() {
    let fx = Fixture::new();
    let rogue = Fixture::new();
    let key = PrivateKey::generate();
    let cert = rogue.issuer.issue(CertClass::Kyc, &client_of(&key), t0()).unwrap();

    assert_eq!(
        fx.present(&key, CertClass::Kyc, &cert, t0()).unwrap_err(),
        CertError::UnknownSigner
    );
}

#[test]
fn test_self_signed_certificate_rejected() {
    let fx = Fixture::new();
    let key = PrivateKey::generate();
    let client = client_of(&key);
    let claims = CertificateClaims {
        iss: fx.config.issuer.clone(),
        aud: client.kid().to_string(),
        cls: CertClass::Kyc,
        cnf: Confirmation {
            jwk: client.jwk().clone(),
        },
        iat: t0().timestamp(),
        exp: t0().timestamp() + 60,
    };
    // Signed by the client itself, no kid: only the signature check can catch it.
    let forged = CompactJws::sign(&crate::jws::JoseHeader::es256(), &claims, &key).unwrap();

    assert_eq!(
        fx.present(&key, CertClass::Kyc, &forged, t0()).unwrap_err(),
        CertError::BadSignature
    );
}

#[test]
fn test_device_certificate_in_account_slot_rejected() {
    let fx = Fixture::new();
    let key = PrivateKey::generate();
    let cert = fx.issuer.issue(CertClass::Device, &client_of(&key), t0()).unwrap();

    assert_eq!(
        fx.present(&key, CertClass::Account, &cert, t0()).unwrap_err(),
        CertError::ClassMismatch { slot: "accountJwt" }
    );
}

#[test]
fn test_wrong_issuer_rejected() {
    let fx = Fixture::new();
    let mut other_config = fx.config.clone();
    other_config.issuer = "https://elsewhere.example".into();
    let provider: Arc<dyn KeyMaterialProvider> = fx.keys.clone();
    let other_issuer = CertificateIssuer::new(provider, &other_config);
    let key = PrivateKey::generate();
    let cert = other_issuer.issue(CertClass::Device, &client_of(&key), t0()).unwrap();

    assert_eq!(
        fx.present(&key, CertClass::Device, &cert, t0()).unwrap_err(),
        CertError::WrongIssuer
    );
}

#[test]
fn test_multiple_slots_all_verified() {
    let fx = Fixture::new();
    let key = PrivateKey::generate();
    let client = client_of(&key);
    let device = fx.issuer.issue(CertClass::Device, &client, t0()).unwrap();
    let account = fx
        .issuer
        .issue(CertClass::Account, &client, t0() + Duration::minutes(10))
        .unwrap();

    let token = AssertionBuilder::new(&key, &[])
        .with_certificate(CertClass::Device, device)
        .with_certificate(CertClass::Account, account)
        .sign()
        .unwrap();
    let assertion = validate_assertion(&token, &[]).unwrap();
    let grant = fx.verifier.verify(&assertion, t0()).unwrap().unwrap();

    assert!(grant.has(CertClass::Device));
    assert!(grant.has(CertClass::Account));
    assert!(!grant.has(CertClass::Kyc));
    assert_eq!(grant.highest(), Some(CertClass::Account));
    assert_eq!(grant.expires_at(), t0() + Duration::hours(1));
}

#[test]
fn test_one_bad_slot_fails_request() {
    let fx = Fixture::new();
    let key = PrivateKey::generate();
    let good = fx.issuer.issue(CertClass::Device, &client_of(&key), t0()).unwrap();

    let token = AssertionBuilder::new(&key, &[])
        .with_certificate(CertClass::Device, good)
        .with_certificate(CertClass::Account, "garbage")
        .sign()
        .unwrap();
    let assertion = validate_assertion(&token, &[]).unwrap();

    assert!(matches!(
        fx.verifier.verify(&assertion, t0()),
        Err(CertError::Malformed(_))
    ));
}

#[test]
fn test_verification_survives_public_jwk_kid() {
    let fx = Fixture::new();
    let key = PrivateKey::generate();
    let named = ClientKey::from_jwk(
        crate::identity::Jwk::from_public_key(&key.public_key()).with_kid("phone-1"),
    )
    .unwrap();
    let cert = fx.issuer.issue(CertClass::Device, &named, t0()).unwrap();
    let claims: CertificateClaims = CompactJws::parse(&cert).unwrap().claims().unwrap();
    assert_eq!(claims.aud, "phone-1");

    // The presenting assertion embeds the JWK without a kid: same identity.
    assert!(fx.present(&key, CertClass::Device, &cert, t0()).is_ok());
}

struct UnavailableKeys;

impl KeyMaterialProvider for UnavailableKeys {
    fn load_private_key(&self) -> Result<Arc<PrivateKey>, crate::identity::KeyError> {
        Err(crate::identity::KeyError::KeyLoad("not configured".into()))
    }

    fn load_public_key(&self) -> Result<crate::identity::PublicKey, crate::identity::KeyError> {
        Err(crate::identity::KeyError::KeyLoad("not configured".into()))
    }
}

#[test]
fn test_missing_key_material_is_key_load_error() {
    let issuer = CertificateIssuer::new(Arc::new(UnavailableKeys), &AuthConfig::new("salt"));
    let key = PrivateKey::generate();

    assert!(matches!(
        issuer.issue(CertClass::Device, &client_of(&key), t0()),
        Err(CertError::KeyLoad(_))
    ));
}

/// Hands out the signing key of one pair and the public key of another,
/// as a provider rotating between two loads would.
struct RotatingKeys {
    signing: ServerKeys,
    published: ServerKeys,
}

impl KeyMaterialProvider for RotatingKeys {
    fn load_private_key(&self) -> Result<Arc<PrivateKey>, KeyError> {
        self.signing.load_private_key()
    }

    fn load_public_key(&self) -> Result<crate::identity::PublicKey, KeyError> {
        self.published.load_public_key()
    }
}

#[test]
fn test_kid_names_the_signing_key() {
    let signing = ServerKeys::generate();
    let expected_kid = signing.kid().clone();
    let signing_public = signing.public_key().clone();
    let provider = RotatingKeys {
        signing,
        published: ServerKeys::generate(),
    };
    let issuer = CertificateIssuer::new(Arc::new(provider), &AuthConfig::new("salt"));

    let cert = issuer
        .issue(CertClass::Device, &client_of(&PrivateKey::generate()), t0())
        .unwrap();
    let jws = CompactJws::parse(&cert).unwrap();
    assert_eq!(jws.header().kid.as_deref(), Some(expected_kid.as_str()));
    assert!(jws.verify_with(&signing_public));
}
