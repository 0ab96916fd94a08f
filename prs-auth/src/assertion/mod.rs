//! Client-signed assertions bound to request parameters.
//!
//! An assertion is a compact ES256 JWS whose header embeds the signer's
//! public JWK and whose payload carries
//! `hash = SHA256hex(param_1 || param_2 || ...)`. Validating it proves
//! possession of the key and binds the signature to one request's
//! parameters; it grants no trust by itself.

mod builder;
mod error;
mod validate;

pub use builder::AssertionBuilder;
pub use error::AssertionError;
pub use validate::{binding_hash, validate_assertion, VerifiedAssertion};
