//! Cryptographic identity types.
//!
//! This module provides P-256 keys and their JWK representation:
//!
//! - [`PrivateKey`] - Signing key with automatic zeroization on drop
//! - [`PublicKey`] - Verification key for signature checks
//! - [`Jwk`] - JSON Web Key document as carried in token headers
//! - [`KeyId`] - `kid`: Base64url SHA-256 of the canonical public JWK
//! - [`ClientKey`] - A validated client key; the key *is* the identity
//! - [`ServerKeys`] / [`KeyMaterialProvider`] - Server key pair injection
//!
//! # Security Properties
//!
//! - Private keys are zeroized on drop and have no `Debug` implementation
//! - `KeyId` comparison uses constant-time equality
//! - Client JWKs carrying a private scalar are rejected
//!
//! # Example
//!
//! ```
//! use prs_auth::identity::{ClientKey, KeyId, PrivateKey};
//!
//! let private_key = PrivateKey::generate();
//! let client = ClientKey::from_public_key(&private_key.public_key());
//!
//! let message = b"Hello, PRS!";
//! let signature = private_key.sign(message);
//! assert!(client.public_key().verify(message, &signature));
//! assert_eq!(client.thumbprint(), &KeyId::from_public_key(&private_key.public_key()));
//! ```

mod jwk;
mod keys;

pub use jwk::{
    canonical_public_jwk, ClientKey, Jwk, KeyId, KeyMaterialProvider, ServerKeys, CRV_P256, KTY_EC,
};
pub use keys::{KeyError, PrivateKey, PublicKey, Signature};
