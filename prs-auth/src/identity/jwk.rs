//! JSON Web Key documents and key identifiers.
//!
//! The canonical public JWK is `{"crv","kty","x","y"}` written by
//! [`crate::hash::canonical_json`]. Every `kid` and public key hash in the
//! system is derived from that exact byte string.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::hash;

use super::keys::{KeyError, PrivateKey, PublicKey};

/// JWK `kty` for elliptic-curve keys.
pub const KTY_EC: &str = "EC";

/// JWK `crv` for NIST P-256.
pub const CRV_P256: &str = "P-256";

/// A JSON Web Key as carried in token headers and configuration.
///
/// Unknown members such as `ext` or `key_ops` are ignored on input.
/// The private scalar `d` is accepted on input (server key configuration)
/// but never serialized back out.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(default, rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    #[serde(default, skip_serializing)]
    d: Option<Zeroizing<String>>,
}

impl Jwk {
    /// Build the public JWK for a P-256 key.
    #[must_use]
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        let (x, y) = public_key.coordinates();
        Self {
            kty: KTY_EC.to_string(),
            crv: Some(CRV_P256.to_string()),
            x: Some(URL_SAFE_NO_PAD.encode(x)),
            y: Some(URL_SAFE_NO_PAD.encode(y)),
            kid: None,
            alg: None,
            key_use: None,
            d: None,
        }
    }

    /// Set the `kid` member.
    #[must_use]
    pub fn with_kid(mut self, kid: impl Into<String>) -> Self {
        self.kid = Some(kid.into());
        self
    }

    /// Whether the document carries a private scalar.
    #[must_use]
    pub fn is_private(&self) -> bool {
        self.d.is_some()
    }

    /// Decode the EC P-256 public key described by this JWK.
    ///
    /// # Errors
    ///
    /// - `KeyError::UnsupportedKeyType` if `kty`/`crv` is not EC P-256
    /// - `KeyError::InvalidFormat` if a coordinate is missing or not Base64url
    /// - `KeyError::InvalidLength` / `InvalidFormat` from point decoding
    pub fn to_public_key(&self) -> Result<PublicKey, KeyError> {
        if self.kty != KTY_EC {
            return Err(KeyError::UnsupportedKeyType(self.kty.clone()));
        }
        match self.crv.as_deref() {
            Some(CRV_P256) => {}
            other => {
                return Err(KeyError::UnsupportedKeyType(
                    other.unwrap_or("<none>").to_string(),
                ))
            }
        }
        let x = decode_member(self.x.as_deref())?;
        let y = decode_member(self.y.as_deref())?;
        PublicKey::from_coordinates(&x, &y)
    }

    /// Decode the private scalar from a private JWK.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::KeyLoad` if there is no `d` member, or the key
    /// errors of [`PrivateKey::from_bytes`].
    pub fn to_private_key(&self) -> Result<PrivateKey, KeyError> {
        let encoded = self
            .d
            .as_ref()
            .ok_or_else(|| KeyError::KeyLoad("private JWK has no `d` member".into()))?;
        let scalar = Zeroizing::new(
            URL_SAFE_NO_PAD
                .decode(encoded.as_bytes())
                .map_err(|_| KeyError::InvalidFormat)?,
        );
        PrivateKey::from_bytes(&scalar)
    }
}

impl std::fmt::Debug for Jwk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Jwk")
            .field("kty", &self.kty)
            .field("crv", &self.crv)
            .field("kid", &self.kid)
            .field("private", &self.is_private())
            .finish_non_exhaustive()
    }
}

fn decode_member(member: Option<&str>) -> Result<Vec<u8>, KeyError> {
    let member = member.ok_or(KeyError::InvalidFormat)?;
    URL_SAFE_NO_PAD
        .decode(member)
        .map_err(|_| KeyError::InvalidFormat)
}

/// Canonical JSON of the required public members of a P-256 key.
#[must_use]
pub fn canonical_public_jwk(public_key: &PublicKey) -> String {
    let jwk = Jwk::from_public_key(public_key);
    hash::canonical_json(&serde_json::json!({
        "crv": jwk.crv,
        "kty": jwk.kty,
        "x": jwk.x,
        "y": jwk.y,
    }))
}

/// Key identifier: Base64url (no padding) SHA-256 of the canonical public JWK.
///
/// # Security
///
/// Comparisons use constant-time equality. Hash is derived because the
/// identifier itself is public; only equality needs timing protection.
#[derive(Clone, Eq, Hash, Serialize, Deserialize)]
#[allow(clippy::derived_hash_with_manual_eq)]
#[serde(transparent)]
pub struct KeyId(String);

impl KeyId {
    /// Compute the identifier of a public key.
    #[must_use]
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        Self(hash::sha256_base64url(canonical_public_jwk(public_key)))
    }

    /// Get the identifier as a string reference.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Constant-time comparison against an untrusted string.
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        self.0.as_bytes().ct_eq(candidate.as_bytes()).into()
    }
}

impl PartialEq for KeyId {
    fn eq(&self, other: &Self) -> bool {
        self.matches(&other.0)
    }
}

impl std::fmt::Display for KeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Debug for KeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyId({})", self.0)
    }
}

/// A client public key taken from an assertion header.
///
/// The key is the subject identity: there is no separate user name.
/// Two `ClientKey`s are the same identity when their thumbprints match.
#[derive(Clone, Debug)]
pub struct ClientKey {
    jwk: Jwk,
    public_key: PublicKey,
    thumbprint: KeyId,
}

impl ClientKey {
    /// Validate a client JWK.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::PrivateMaterial` if the JWK carries `d`, and any
    /// error of [`Jwk::to_public_key`].
    pub fn from_jwk(jwk: Jwk) -> Result<Self, KeyError> {
        if jwk.is_private() {
            return Err(KeyError::PrivateMaterial);
        }
        let public_key = jwk.to_public_key()?;
        let thumbprint = KeyId::from_public_key(&public_key);
        Ok(Self {
            jwk,
            public_key,
            thumbprint,
        })
    }

    /// Build the client identity for a locally held public key.
    #[must_use]
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        Self {
            jwk: Jwk::from_public_key(public_key),
            public_key: public_key.clone(),
            thumbprint: KeyId::from_public_key(public_key),
        }
    }

    /// The JWK as supplied by the client.
    #[must_use]
    pub fn jwk(&self) -> &Jwk {
        &self.jwk
    }

    #[must_use]
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    #[must_use]
    pub fn thumbprint(&self) -> &KeyId {
        &self.thumbprint
    }

    /// The client's `kid`: its own JWK `kid` if present, else the thumbprint.
    #[must_use]
    pub fn kid(&self) -> &str {
        self.jwk
            .kid
            .as_deref()
            .unwrap_or_else(|| self.thumbprint.as_str())
    }

    /// Canonical JSON of the client's public key.
    #[must_use]
    pub fn canonical_json(&self) -> String {
        canonical_public_jwk(&self.public_key)
    }

    /// Base64 SHA-256 of the canonical public JWK.
    ///
    /// Stable storage key for records owned by this client.
    #[must_use]
    pub fn public_key_hash(&self) -> String {
        hash::sha256_base64(self.canonical_json())
    }
}

impl PartialEq for ClientKey {
    fn eq(&self, other: &Self) -> bool {
        self.thumbprint == other.thumbprint
    }
}

impl Eq for ClientKey {}

/// Source of the server signing key pair.
///
/// Implementations must be `Send + Sync`; issuers and verifiers load key
/// material on every call so a provider may rotate keys underneath them.
pub trait KeyMaterialProvider: Send + Sync {
    /// Load the server private key.
    fn load_private_key(&self) -> Result<Arc<PrivateKey>, KeyError>;

    /// Load the server public key.
    fn load_public_key(&self) -> Result<PublicKey, KeyError>;

    /// Load the private key together with the `kid` of its own public half.
    ///
    /// Signers use this so the `kid` they publish always names the key that
    /// signed, even if the provider rotates between two loads.
    fn load_signing_key(&self) -> Result<(Arc<PrivateKey>, KeyId), KeyError> {
        let private_key = self.load_private_key()?;
        let kid = KeyId::from_public_key(&private_key.public_key());
        Ok((private_key, kid))
    }
}

/// The server key pair, loaded from JWK JSON configuration.
pub struct ServerKeys {
    private_key: Arc<PrivateKey>,
    public_key: PublicKey,
    kid: KeyId,
}

impl ServerKeys {
    /// Generate a fresh server key pair.
    #[must_use]
    pub fn generate() -> Self {
        Self::from_private_key(PrivateKey::generate())
    }

    fn from_private_key(private_key: PrivateKey) -> Self {
        let public_key = private_key.public_key();
        let kid = KeyId::from_public_key(&public_key);
        Self {
            private_key: Arc::new(private_key),
            public_key,
            kid,
        }
    }

    /// Load the key pair from a private and a public JWK JSON document.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::KeyLoad` for unparsable documents and
    /// `KeyError::KeyPairMismatch` if the halves don't belong together.
    pub fn from_jwk_json(private_jwk: &str, public_jwk: &str) -> Result<Self, KeyError> {
        let private: Jwk = serde_json::from_str(private_jwk)
            .map_err(|e| KeyError::KeyLoad(format!("private JWK: {}", e)))?;
        let public: Jwk = serde_json::from_str(public_jwk)
            .map_err(|e| KeyError::KeyLoad(format!("public JWK: {}", e)))?;

        let keys = Self::from_private_key(private.to_private_key()?);
        if keys.public_key != public.to_public_key()? {
            return Err(KeyError::KeyPairMismatch);
        }
        Ok(keys)
    }

    /// Identifier of the server public key.
    #[must_use]
    pub fn kid(&self) -> &KeyId {
        &self.kid
    }

    #[must_use]
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Public JWK with `kid`, suitable for publishing.
    #[must_use]
    pub fn public_jwk(&self) -> Jwk {
        Jwk::from_public_key(&self.public_key).with_kid(self.kid.as_str())
    }

    /// Private JWK JSON for configuration export.
    ///
    /// # Security
    ///
    /// Contains the private scalar; the buffer is zeroized on drop.
    #[must_use]
    pub fn private_jwk_json(&self) -> Zeroizing<String> {
        let jwk = Jwk::from_public_key(&self.public_key);
        let scalar = Zeroizing::new(self.private_key.to_bytes());
        let d = Zeroizing::new(URL_SAFE_NO_PAD.encode(scalar.as_slice()));
        Zeroizing::new(format!(
            r#"{{"kty":"{}","crv":"{}","x":"{}","y":"{}","d":"{}"}}"#,
            jwk.kty,
            CRV_P256,
            jwk.x.unwrap_or_default(),
            jwk.y.unwrap_or_default(),
            d.as_str()
        ))
    }
}

impl KeyMaterialProvider for ServerKeys {
    fn load_private_key(&self) -> Result<Arc<PrivateKey>, KeyError> {
        Ok(Arc::clone(&self.private_key))
    }

    fn load_public_key(&self) -> Result<PublicKey, KeyError> {
        Ok(self.public_key.clone())
    }

    fn load_signing_key(&self) -> Result<(Arc<PrivateKey>, KeyId), KeyError> {
        Ok((Arc::clone(&self.private_key), self.kid.clone()))
    }
}

impl std::fmt::Debug for ServerKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerKeys")
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwk_roundtrip_through_json() {
        let public_key = PrivateKey::generate().public_key();
        let jwk = Jwk::from_public_key(&public_key);

        let json = serde_json::to_string(&jwk).unwrap();
        let parsed: Jwk = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.to_public_key().unwrap(), public_key);
    }

    #[test]
    fn test_kid_is_43_chars_base64url() {
        let kid = KeyId::from_public_key(&PrivateKey::generate().public_key());

        assert_eq!(kid.as_str().len(), 43);
        assert!(!kid.as_str().contains('='));
        assert!(!kid.as_str().contains('+'));
    }

    #[test]
    fn test_kid_ignores_member_order_and_extras() {
        let public_key = PrivateKey::generate().public_key();
        let jwk = Jwk::from_public_key(&public_key);
        let reordered = format!(
            r#"{{"y":"{}","ext":true,"x":"{}","key_ops":["verify"],"kty":"EC","crv":"P-256"}}"#,
            jwk.y.as_deref().unwrap(),
            jwk.x.as_deref().unwrap()
        );
        let parsed: Jwk = serde_json::from_str(&reordered).unwrap();
        let client = ClientKey::from_jwk(parsed).unwrap();

        assert_eq!(client.thumbprint(), &KeyId::from_public_key(&public_key));
    }

    #[test]
    fn test_canonical_public_jwk_layout() {
        let public_key = PrivateKey::generate().public_key();
        let canonical = canonical_public_jwk(&public_key);

        assert!(canonical.starts_with(r#"{"crv":"P-256","kty":"EC","x":""#));
        assert!(!canonical.contains(' '));
    }

    #[test]
    fn test_non_ec_key_rejected() {
        let jwk: Jwk = serde_json::from_str(r#"{"kty":"RSA","n":"AQAB","e":"AQAB"}"#).unwrap();

        assert_eq!(
            ClientKey::from_jwk(jwk).unwrap_err(),
            KeyError::UnsupportedKeyType("RSA".into())
        );
    }

    #[test]
    fn test_wrong_curve_rejected() {
        let jwk: Jwk =
            serde_json::from_str(r#"{"kty":"EC","crv":"P-384","x":"AA","y":"AA"}"#).unwrap();

        assert_eq!(
            jwk.to_public_key().unwrap_err(),
            KeyError::UnsupportedKeyType("P-384".into())
        );
    }

    #[test]
    fn test_private_material_rejected_for_client() {
        let keys = ServerKeys::generate();
        let jwk: Jwk = serde_json::from_str(&keys.private_jwk_json()).unwrap();

        assert!(jwk.is_private());
        assert_eq!(
            ClientKey::from_jwk(jwk).unwrap_err(),
            KeyError::PrivateMaterial
        );
    }

    #[test]
    fn test_private_member_never_serialized() {
        let keys = ServerKeys::generate();
        let jwk: Jwk = serde_json::from_str(&keys.private_jwk_json()).unwrap();

        let out = serde_json::to_string(&jwk).unwrap();
        assert!(!out.contains("\"d\""));
    }

    #[test]
    fn test_client_kid_prefers_jwk_kid() {
        let public_key = PrivateKey::generate().public_key();
        let plain = ClientKey::from_public_key(&public_key);
        assert_eq!(plain.kid(), plain.thumbprint().as_str());

        let named = ClientKey::from_jwk(Jwk::from_public_key(&public_key).with_kid("device-1"))
            .unwrap();
        assert_eq!(named.kid(), "device-1");
        assert_eq!(named, plain);
    }

    #[test]
    fn test_server_keys_jwk_json_roundtrip() {
        let keys = ServerKeys::generate();
        let private = keys.private_jwk_json();
        let public = serde_json::to_string(&keys.public_jwk()).unwrap();

        let loaded = ServerKeys::from_jwk_json(&private, &public).unwrap();
        assert_eq!(loaded.kid(), keys.kid());
    }

    #[test]
    fn test_server_keys_mismatch_rejected() {
        let keys = ServerKeys::generate();
        let other = ServerKeys::generate();
        let public = serde_json::to_string(&other.public_jwk()).unwrap();

        assert_eq!(
            ServerKeys::from_jwk_json(&keys.private_jwk_json(), &public).unwrap_err(),
            KeyError::KeyPairMismatch
        );
    }

    #[test]
    fn test_server_keys_garbage_is_key_load_error() {
        let err = ServerKeys::from_jwk_json("not json", "{}").unwrap_err();
        assert!(matches!(err, KeyError::KeyLoad(_)));
    }

    #[test]
    fn test_public_jwk_without_d_cannot_sign() {
        let keys = ServerKeys::generate();
        let public = serde_json::to_string(&keys.public_jwk()).unwrap();

        let err = ServerKeys::from_jwk_json(&public, &public).unwrap_err();
        assert!(matches!(err, KeyError::KeyLoad(_)));
    }
}
