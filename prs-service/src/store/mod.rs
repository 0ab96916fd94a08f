//! Record store seam for OTP requests and account personal info.
//!
//! The store is the only shared mutable state in the service. It
//! guarantees at most one OTP record per public key hash (upsert, never a
//! duplicate insert). Status writes after a read are last-write-wins.

mod sqlite;

pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};
use prs_core::{AccountId, AccountRecord, OtpRecord, OtpStatus};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

#[allow(async_fn_in_trait)]
pub trait RecordStore: Send + Sync {
    /// Overwrite phone, code, hash, status and timestamps of the record for
    /// `record.public_key_hash`. Returns the number of rows changed.
    async fn update_otp_by_key_hash(&self, record: &OtpRecord) -> Result<u64, StoreError>;

    /// Insert a new record. Fails if one exists for the same key hash.
    async fn insert_otp(&self, record: &OtpRecord) -> Result<(), StoreError>;

    /// Conditional update falling back to insert.
    async fn upsert_otp_by_key_hash(&self, record: &OtpRecord) -> Result<u64, StoreError> {
        let updated = self.update_otp_by_key_hash(record).await?;
        if updated > 0 {
            return Ok(updated);
        }
        self.insert_otp(record).await?;
        Ok(1)
    }

    async fn find_otp_by_key_hash(&self, key_hash: &str) -> Result<Option<OtpRecord>, StoreError>;

    async fn set_otp_status(
        &self,
        key_hash: &str,
        status: OtpStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    async fn list_otps_by_status(&self, status: OtpStatus) -> Result<Vec<OtpRecord>, StoreError>;

    async fn find_account_by_id(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<AccountRecord>, StoreError>;

    /// Insert or replace the account record.
    async fn save_account(&self, record: &AccountRecord) -> Result<(), StoreError>;
}
