//! Assertion validation.

use serde::Deserialize;
use subtle::ConstantTimeEq;

use crate::hash;
use crate::identity::{ClientKey, KeyError};
use crate::jws::{CompactJws, JoseHeader, TokenError};

use super::error::AssertionError;

/// Payload claims read from an assertion. Other claims are ignored.
#[derive(Deserialize)]
struct AssertionClaims {
    #[serde(default)]
    hash: Option<String>,
}

/// Digest binding an assertion to request parameters:
/// lowercase hex SHA-256 of the parameters concatenated in order.
#[must_use]
pub fn binding_hash(params: &[&str]) -> String {
    hash::sha256_hex(params.concat())
}

/// A self-signed assertion whose signature and binding have been checked.
///
/// Proves possession of the embedded key, nothing more. Trust is layered
/// on top by [`crate::cert::CertificateVerifier`].
#[derive(Debug, Clone)]
pub struct VerifiedAssertion {
    client: ClientKey,
    header: JoseHeader,
}

impl VerifiedAssertion {
    /// Crate-private so a `VerifiedAssertion` can only come from
    /// [`validate_assertion`].
    pub(crate) fn new(client: ClientKey, header: JoseHeader) -> Self {
        Self { client, header }
    }

    /// The key that signed the assertion.
    #[must_use]
    pub fn client(&self) -> &ClientKey {
        &self.client
    }

    /// The decoded header, including any nested certificate slots.
    #[must_use]
    pub fn header(&self) -> &JoseHeader {
        &self.header
    }

    #[must_use]
    pub fn into_client(self) -> ClientKey {
        self.client
    }
}

/// Validate a client-signed assertion against the request parameters.
///
/// Steps, in order: decode, extract the embedded `jwk`, verify the
/// signature with it, then compare `payload.hash` with
/// [`binding_hash`]`(params)`.
///
/// # Errors
///
/// - `MalformedAssertion` if the token or its key is structurally invalid
/// - `MissingKey` if the header has no `jwk`
/// - `UnsupportedKeyType` if the key is not EC P-256
/// - `BadSignature` if the signature does not verify
/// - `PayloadBindingMismatch` if the hash is absent or differs
#[must_use = "validation result must be checked"]
pub fn validate_assertion(token: &str, params: &[&str]) -> Result<VerifiedAssertion, AssertionError> {
    let jws = CompactJws::parse(token)?;

    let jwk = jws.header().jwk.clone().ok_or(AssertionError::MissingKey)?;
    let client = ClientKey::from_jwk(jwk).map_err(|e| match e {
        KeyError::UnsupportedKeyType(kty) => AssertionError::UnsupportedKeyType(kty),
        KeyError::PrivateMaterial => {
            AssertionError::MalformedAssertion(TokenError::Malformed("jwk carries private material"))
        }
        _ => AssertionError::MalformedAssertion(TokenError::Malformed("invalid jwk")),
    })?;

    if !jws.verify_with(client.public_key()) {
        return Err(AssertionError::BadSignature);
    }

    let claims: AssertionClaims = jws.claims()?;
    let provided = claims.hash.ok_or(AssertionError::PayloadBindingMismatch)?;
    let expected = binding_hash(params);
    if !bool::from(expected.as_bytes().ct_eq(provided.as_bytes())) {
        return Err(AssertionError::PayloadBindingMismatch);
    }

    Ok(VerifiedAssertion::new(client, jws.header().clone()))
}
