//! # PRS Core
//!
//! Domain types for the PRS registration service: OTP records and their
//! status machine, account/KYC records, certificate roles, validated request
//! inputs and log masking.
//!
//! ## Design Principles
//!
//! This crate is intentionally **IO-free**:
//! - No filesystem operations
//! - No network calls
//! - No database interactions
//!
//! Persistence and delivery live in `prs-service`.
//!
//! ## Stability
//!
//! The serde format of these types (camelCase fields, SCREAMING_SNAKE_CASE
//! statuses, `ROLE_*` names) is shared with mobile clients.
//!
//! ## Modules
//!
//! - [`otp`] - OTP records and status transitions
//! - [`account`] - Account personal info and KYC status
//! - [`role`] - Roles granted by certificates
//! - [`validate`] - Phone, email and account id inputs
//! - [`mask`] - Masking for log output

pub mod account;
pub mod mask;
pub mod otp;
pub mod role;
pub mod validate;

pub use account::{AccountRecord, KycStatus};
pub use otp::{otp_ttl, EmailOtp, OtpRecord, OtpStatus, OTP_TTL_SECONDS};
pub use role::{AuthzDecision, Role};
pub use validate::{AccountId, EmailAddress, PhoneNumber, ValidationError};
