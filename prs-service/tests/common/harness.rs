//! Test harnesses for registration E2E tests.
//!
//! The server is the full service graph over an in-memory SQLite store and
//! a mailbox that keeps every message; the client holds a P-256 key and
//! drives the handlers the way a mobile app would.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use prs_auth::enrollment::solve;
use prs_auth::{AssertionBuilder, CertClass, ClientKey, KeyMaterialProvider, PrivateKey, ServerKeys};
use prs_core::{AccountId, KycStatus};
use prs_service::auth::ServerKeyProvider;
use prs_service::config::{PrsConfig, ENV_OTP_SALT, ENV_OTP_SENDS_PER_MINUTE, ENV_POW_DIFFICULTY};
use prs_service::mail::{MailError, MailTransport};
use prs_service::services::{KycCertificateOutcome, OtpOutcome, Services};
use prs_service::store::{RecordStore, SqliteStore};
use prs_service::ServiceError;

/// Mail transport that records messages instead of delivering them.
#[derive(Default)]
pub struct Mailbox {
    sent: Mutex<Vec<SentMail>>,
}

#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Mailbox {
    #[allow(dead_code)]
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }

    /// The six-digit code in the most recent message.
    pub fn last_code(&self) -> String {
        let sent = self.sent.lock().unwrap();
        let mail = sent.last().expect("no mail sent");
        mail.body
            .split_whitespace()
            .find(|word| word.len() == 6 && word.chars().all(|c| c.is_ascii_digit()))
            .expect("no code in mail body")
            .to_string()
    }
}

impl MailTransport for Mailbox {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

/// Full service graph with in-memory storage.
pub struct TestServer {
    pub services: Services<SqliteStore, Mailbox>,
    pub store: Arc<SqliteStore>,
    pub mailbox: Arc<Mailbox>,
    pub keys: Arc<ServerKeyProvider>,
    pub config: PrsConfig,
}

impl TestServer {
    /// Server with a fresh key pair and proof-of-work difficulty 2.
    pub async fn new() -> Self {
        let config = PrsConfig::from_lookup(|name| match name {
            ENV_OTP_SALT => Some("test-server-salt".to_string()),
            ENV_POW_DIFFICULTY => Some("2".to_string()),
            ENV_OTP_SENDS_PER_MINUTE => Some("50".to_string()),
            _ => None,
        })
        .expect("test configuration");

        let store = Arc::new(
            SqliteStore::connect("sqlite::memory:")
                .await
                .expect("Failed to create in-memory database"),
        );
        let mailbox = Arc::new(Mailbox::default());
        let keys = Arc::new(ServerKeyProvider::new(ServerKeys::generate()));
        let provider: Arc<dyn KeyMaterialProvider> = keys.clone();

        let services = Services::build(&config, provider, store.clone(), mailbox.clone())
            .expect("Failed to build services");

        Self {
            services,
            store,
            mailbox,
            keys,
            config,
        }
    }

    /// Record an identity review decision, as the back office would.
    pub async fn set_kyc(&self, account_id: &str, status: KycStatus, reason: Option<&str>) {
        self.services
            .kyc
            .record_status(
                &AccountId::parse(account_id).unwrap(),
                status,
                reason.map(str::to_string),
            )
            .await
            .expect("Failed to record KYC status");
    }

    /// The SMS code the gateway would deliver for `client`.
    pub async fn sms_code_for(&self, client: &TestClient) -> String {
        self.store
            .find_otp_by_key_hash(&client.client_key().public_key_hash())
            .await
            .unwrap()
            .expect("no OTP record for client")
            .otp_code
    }
}

/// A device: one P-256 key plus the certificates it has collected.
pub struct TestClient {
    pub key: PrivateKey,
    pub device_cert: Option<String>,
    pub account_cert: Option<String>,
    pub kyc_cert: Option<String>,
}

#[allow(dead_code)]
impl TestClient {
    pub fn new() -> Self {
        Self {
            key: PrivateKey::generate(),
            device_cert: None,
            account_cert: None,
            kyc_cert: None,
        }
    }

    pub fn client_key(&self) -> ClientKey {
        ClientKey::from_public_key(&self.key.public_key())
    }

    /// Sign `params` with every certificate held so far nested in the header.
    pub fn sign(&self, params: &[&str]) -> String {
        let mut builder = AssertionBuilder::new(&self.key, params);
        for (class, cert) in [
            (CertClass::Device, &self.device_cert),
            (CertClass::Account, &self.account_cert),
            (CertClass::Kyc, &self.kyc_cert),
        ] {
            if let Some(cert) = cert {
                builder = builder.with_certificate(class, cert.clone());
            }
        }
        builder.sign().expect("Failed to sign assertion")
    }

    /// Sign `params` carrying a recovery token and no certificates.
    pub fn sign_recovery(&self, params: &[&str], recovery_token: &str) -> String {
        AssertionBuilder::new(&self.key, params)
            .with_recovery_token(recovery_token)
            .sign()
            .expect("Failed to sign assertion")
    }

    /// Nonce, proof of work, device certificate.
    pub fn enroll(&mut self, server: &TestServer, now: DateTime<Utc>) -> Result<(), ServiceError> {
        let time_stamp = now.timestamp().to_string();
        let nonce = server
            .services
            .device
            .initiate(&self.sign(&[&time_stamp]), &time_stamp, now)?;

        let (pow_nonce, pow_hash) = solve(&nonce, server.config.pow_difficulty);
        let cert = server.services.device.validate(
            &self.sign(&[&nonce, &pow_hash, &pow_nonce]),
            &nonce,
            &pow_hash,
            &pow_nonce,
            now,
        )?;
        self.device_cert = Some(cert);
        Ok(())
    }

    pub async fn send_otp(
        &self,
        server: &TestServer,
        phone: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        server
            .services
            .otp
            .send(&self.sign(&[phone]), phone, now)
            .await
            .map(|_| ())
    }

    pub async fn validate_otp(
        &self,
        server: &TestServer,
        phone: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<OtpOutcome, ServiceError> {
        server
            .services
            .otp
            .validate(&self.sign(&[phone, code]), phone, code, now)
            .await
    }

    /// SMS OTP round trip, then the account certificate.
    pub async fn certify_phone(
        &mut self,
        server: &TestServer,
        phone: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        self.send_otp(server, phone, now).await?;
        let code = server.sms_code_for(self).await;
        let outcome = self.validate_otp(server, phone, &code, now).await?;
        assert_eq!(outcome, OtpOutcome::Validated);

        let cert = server
            .services
            .account
            .issue(&self.sign(&[phone]), phone, now)
            .await?;
        self.account_cert = Some(cert);
        Ok(())
    }

    pub async fn request_kyc(
        &mut self,
        server: &TestServer,
        account_id: &str,
        now: DateTime<Utc>,
    ) -> Result<KycCertificateOutcome, ServiceError> {
        let outcome = server
            .services
            .kyc
            .issue(&self.sign(&[account_id]), account_id, now)
            .await?;
        if let KycCertificateOutcome::Issued(cert) = &outcome {
            self.kyc_cert = Some(cert.clone());
        }
        Ok(outcome)
    }
}
