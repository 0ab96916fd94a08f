//! SQLite implementation of [`RecordStore`].

use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use prs_core::{AccountId, AccountRecord, EmailOtp, KycStatus, OtpRecord, OtpStatus};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{RecordStore, StoreError};

const OTP_COLUMNS: &str =
    "id, phone_number, public_key_hash, otp_code, otp_hash, status, created_at, updated_at";

/// Record store backed by SQLite. Timestamps are Unix milliseconds.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Wrap `pool`, creating tables if they don't exist.
    pub async fn new(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS otp_requests (
                id TEXT PRIMARY KEY,
                phone_number TEXT NOT NULL,
                public_key_hash TEXT NOT NULL UNIQUE,
                otp_code TEXT NOT NULL,
                otp_hash TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_otp_requests_status ON otp_requests (status)",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS personal_info (
                account_id TEXT PRIMARY KEY,
                kyc_status TEXT NOT NULL,
                rejection_reason TEXT,
                email TEXT,
                email_otp_hash TEXT,
                otp_expires_at INTEGER
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    /// Open or create a database file.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                sqlx::Error::Configuration(format!("Failed to create db directory: {}", e).into())
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Self::new(pool).await
    }

    /// Connect by URL, e.g. `sqlite::memory:` or `sqlite://prs.db?mode=rwc`.
    ///
    /// A single connection keeps `sqlite::memory:` one database.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect(url)
            .await?;
        Self::new(pool).await
    }
}

impl RecordStore for SqliteStore {
    async fn update_otp_by_key_hash(&self, record: &OtpRecord) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE otp_requests
             SET phone_number = ?, otp_code = ?, otp_hash = ?, status = ?,
                 created_at = ?, updated_at = ?
             WHERE public_key_hash = ?",
        )
        .bind(&record.phone_number)
        .bind(&record.otp_code)
        .bind(&record.otp_hash)
        .bind(record.status.as_str())
        .bind(record.created_at.timestamp_millis())
        .bind(record.updated_at.timestamp_millis())
        .bind(&record.public_key_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn insert_otp(&self, record: &OtpRecord) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO otp_requests ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            OTP_COLUMNS
        ))
        .bind(record.id.to_string())
        .bind(&record.phone_number)
        .bind(&record.public_key_hash)
        .bind(&record.otp_code)
        .bind(&record.otp_hash)
        .bind(record.status.as_str())
        .bind(record.created_at.timestamp_millis())
        .bind(record.updated_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn upsert_otp_by_key_hash(&self, record: &OtpRecord) -> Result<u64, StoreError> {
        let updated = self.update_otp_by_key_hash(record).await?;
        if updated > 0 {
            return Ok(updated);
        }

        match self.insert_otp(record).await {
            Ok(()) => Ok(1),
            // Lost an insert race for the same key: the row exists now.
            Err(StoreError::Database(sqlx::Error::Database(e))) if e.is_unique_violation() => {
                self.update_otp_by_key_hash(record).await
            }
            Err(e) => Err(e),
        }
    }

    async fn find_otp_by_key_hash(&self, key_hash: &str) -> Result<Option<OtpRecord>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM otp_requests WHERE public_key_hash = ?",
            OTP_COLUMNS
        ))
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(otp_from_row).transpose()
    }

    async fn set_otp_status(
        &self,
        key_hash: &str,
        status: OtpStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE otp_requests SET status = ?, updated_at = ? WHERE public_key_hash = ?",
        )
        .bind(status.as_str())
        .bind(updated_at.timestamp_millis())
        .bind(key_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn list_otps_by_status(&self, status: OtpStatus) -> Result<Vec<OtpRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM otp_requests WHERE status = ? ORDER BY created_at",
            OTP_COLUMNS
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(otp_from_row).collect()
    }

    async fn find_account_by_id(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<AccountRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT account_id, kyc_status, rejection_reason, email,
                    email_otp_hash, otp_expires_at
             FROM personal_info WHERE account_id = ?",
        )
        .bind(account_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(account_from_row).transpose()
    }

    async fn save_account(&self, record: &AccountRecord) -> Result<(), StoreError> {
        let otp = record.email_otp.as_ref();
        sqlx::query(
            r#"
            INSERT INTO personal_info (
                account_id, kyc_status, rejection_reason, email,
                email_otp_hash, otp_expires_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(account_id) DO UPDATE SET
                kyc_status = excluded.kyc_status,
                rejection_reason = excluded.rejection_reason,
                email = excluded.email,
                email_otp_hash = excluded.email_otp_hash,
                otp_expires_at = excluded.otp_expires_at
            "#,
        )
        .bind(record.account_id.as_str())
        .bind(record.kyc_status.as_str())
        .bind(record.rejection_reason.as_deref())
        .bind(record.email.as_deref())
        .bind(otp.map(|o| o.hash.as_str()))
        .bind(otp.map(|o| o.expires_at.timestamp_millis()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn timestamp(millis: i64) -> Result<DateTime<Utc>, StoreError> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| StoreError::Corrupt(format!("timestamp out of range: {}", millis)))
}

fn otp_from_row(row: &SqliteRow) -> Result<OtpRecord, StoreError> {
    let id: String = row.get("id");
    let status: String = row.get("status");
    Ok(OtpRecord {
        id: Uuid::parse_str(&id).map_err(|e| StoreError::Corrupt(e.to_string()))?,
        phone_number: row.get("phone_number"),
        public_key_hash: row.get("public_key_hash"),
        otp_code: row.get("otp_code"),
        otp_hash: row.get("otp_hash"),
        status: status
            .parse::<OtpStatus>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?,
        created_at: timestamp(row.get("created_at"))?,
        updated_at: timestamp(row.get("updated_at"))?,
    })
}

fn account_from_row(row: &SqliteRow) -> Result<AccountRecord, StoreError> {
    let account_id: String = row.get("account_id");
    let kyc_status: String = row.get("kyc_status");

    let hash: Option<String> = row.get("email_otp_hash");
    let expires_at: Option<i64> = row.get("otp_expires_at");
    let email_otp = match (hash, expires_at) {
        (Some(hash), Some(expires_at)) => Some(EmailOtp {
            hash,
            expires_at: timestamp(expires_at)?,
        }),
        _ => None,
    };

    Ok(AccountRecord {
        account_id: AccountId::parse(&account_id)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?,
        kyc_status: kyc_status
            .parse::<KycStatus>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?,
        rejection_reason: row.get("rejection_reason"),
        email: row.get("email"),
        email_otp,
    })
}
