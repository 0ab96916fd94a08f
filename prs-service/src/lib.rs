//! PRS service layer: device registration, OTP, certificate and recovery
//! handlers over the `prs-auth` protocol library.
//!
//! Handlers take the raw client assertion plus the request parameters in
//! binding order, and an explicit `now`. Storage and mail delivery are
//! reached through the [`store::RecordStore`] and [`mail::MailTransport`]
//! seams.

pub mod auth;
pub mod config;
pub mod error;
pub mod mail;
pub mod services;
pub mod store;
pub mod telemetry;

pub use error::{ErrorClass, ServiceError};
