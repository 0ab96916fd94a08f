//! prs - operator CLI for the PRS registration service

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use prs_auth::{KeyMaterialProvider, ServerKeys};
use prs_core::{mask, AccountId, KycStatus};
use prs_service::auth::{Authenticator, ServerKeyProvider};
use prs_service::config::{default_db_path, PrsConfig};
use prs_service::services::{KycCertificateService, OtpEngine, OtpRateLimiter, RecoveryService};
use prs_service::store::SqliteStore;
use prs_service::telemetry;

/// PRS - device registration and certificate service
#[derive(Parser)]
#[command(name = "prs", version, about)]
struct Cli {
    /// Database URL (overrides PRS_DATABASE_URL)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Output JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a server key pair as JWK JSON
    Keygen,

    /// Print the kid of the configured server key
    Kid,

    /// Issue a recovery token linking an old account to a new one
    RecoveryToken {
        #[arg(long)]
        old_account_id: String,

        #[arg(long)]
        new_account_id: String,
    },

    /// Record the outcome of an identity review
    KycStatus {
        #[arg(long)]
        account_id: String,

        /// PENDING, APPROVED or REJECTED
        #[arg(long)]
        status: KycStatus,

        /// Shown to the user on rejection
        #[arg(long)]
        reason: Option<String>,
    },

    /// List OTP codes waiting for SMS delivery
    PendingOtps,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Keygen => cmd_keygen(cli.json),
        Commands::Kid => {
            let config = PrsConfig::from_env()?;
            let keys = config.server_keys().context("Failed to load server keys")?;
            println!("{}", keys.kid());
            Ok(())
        }
        Commands::RecoveryToken {
            old_account_id,
            new_account_id,
        } => {
            let config = PrsConfig::from_env()?;
            cmd_recovery_token(&config, &old_account_id, &new_account_id)
        }
        Commands::KycStatus {
            account_id,
            status,
            reason,
        } => {
            let config = PrsConfig::from_env()?;
            let store = open_store(&config, cli.database_url).await?;
            cmd_kyc_status(&config, store, &account_id, status, reason, cli.json).await
        }
        Commands::PendingOtps => {
            let config = PrsConfig::from_env()?;
            let store = open_store(&config, cli.database_url).await?;
            cmd_pending_otps(&config, store, cli.json).await
        }
    }
}

fn cmd_keygen(json: bool) -> Result<()> {
    let keys = ServerKeys::generate();
    let public = serde_json::to_string(&keys.public_jwk())?;
    let private = keys.private_jwk_json();

    if json {
        let out = serde_json::json!({
            "kid": keys.kid().as_str(),
            "privateKey": serde_json::from_str::<serde_json::Value>(&private)?,
            "publicKey": keys.public_jwk(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("# kid: {}", keys.kid());
        println!("PRS_SERVER_PRIVATE_KEY='{}'", private.as_str());
        println!("PRS_SERVER_PUBLIC_KEY='{}'", public);
    }
    Ok(())
}

fn cmd_recovery_token(config: &PrsConfig, old_account_id: &str, new_account_id: &str) -> Result<()> {
    let keys: Arc<dyn KeyMaterialProvider> = Arc::new(ServerKeyProvider::new(
        config.server_keys().context("Failed to load server keys")?,
    ));
    let auth = config.auth_config();
    let certificates = Arc::new(prs_auth::CertificateIssuer::new(keys.clone(), &auth));
    // Issuance never consults the replay cache; redemption happens in the
    // service process.
    let service = RecoveryService::new(
        Arc::new(Authenticator::new(keys.clone(), &auth)),
        prs_auth::RecoveryTokens::new(keys, &auth, certificates),
        Arc::new(prs_auth::TtlReplayCache::new(std::time::Duration::from_secs(1), 1)),
    );

    let token = service
        .request_token(old_account_id, new_account_id, Utc::now())
        .context("Failed to issue recovery token")?;
    println!("{}", token);
    Ok(())
}

async fn cmd_kyc_status(
    config: &PrsConfig,
    store: Arc<SqliteStore>,
    account_id: &str,
    status: KycStatus,
    reason: Option<String>,
    json: bool,
) -> Result<()> {
    let account_id = AccountId::parse(account_id)?;
    let keys = key_provider(config);
    let auth = config.auth_config();
    let service = KycCertificateService::new(
        store,
        Arc::new(Authenticator::new(keys.clone(), &auth)),
        Arc::new(prs_auth::CertificateIssuer::new(keys, &auth)),
    );

    let account = service
        .record_status(&account_id, status, reason)
        .await
        .context("Failed to record KYC status")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&account)?);
    } else {
        println!(
            "{}: {}",
            mask::account_id(account.account_id.as_str()),
            account.kyc_status
        );
        if let Some(reason) = &account.rejection_reason {
            println!("Reason: {}", reason);
        }
    }
    Ok(())
}

async fn cmd_pending_otps(config: &PrsConfig, store: Arc<SqliteStore>, json: bool) -> Result<()> {
    let keys = key_provider(config);
    let engine = OtpEngine::new(
        store,
        Arc::new(Authenticator::new(keys, &config.auth_config())),
        config.otp_salt.clone(),
        OtpRateLimiter::new(config.otp_sends_per_minute),
    );

    let pending = engine.pending(Utc::now()).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&pending)?);
        return Ok(());
    }

    if pending.is_empty() {
        println!("No pending OTPs");
        return Ok(());
    }
    println!("{:<18} {:<8} CREATED", "PHONE", "CODE");
    for otp in &pending {
        println!(
            "{:<18} {:<8} {}",
            otp.phone_number,
            otp.otp_code,
            otp.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    Ok(())
}

/// Key provider for commands that never sign: missing keys are not an
/// error until something tries to use them.
fn key_provider(config: &PrsConfig) -> Arc<dyn KeyMaterialProvider> {
    match config.server_keys() {
        Ok(keys) => Arc::new(ServerKeyProvider::new(keys)),
        Err(e) => {
            tracing::debug!(error = %e, "Running without server keys");
            Arc::new(ServerKeyProvider::unconfigured())
        }
    }
}

async fn open_store(config: &PrsConfig, override_url: Option<String>) -> Result<Arc<SqliteStore>> {
    let store = match override_url.or_else(|| config.database_url.clone()) {
        Some(url) => {
            tracing::info!("Opening database by URL");
            SqliteStore::connect(&url).await
        }
        None => {
            let path = default_db_path();
            tracing::info!(path = %path.display(), "Opening database");
            SqliteStore::open(&path).await
        }
    }
    .context("Failed to open database")?;
    Ok(Arc::new(store))
}
