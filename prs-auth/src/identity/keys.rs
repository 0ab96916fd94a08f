//! P-256 key types with proper secret handling.
//!
//! - Private keys are zeroized on drop
//! - No Debug/Display implementations that leak secrets
//! - Signatures use the raw `r || s` encoding required by JWS ES256

use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{SigningKey, VerifyingKey};
use p256::{EncodedPoint, FieldBytes};

/// Size of a P-256 scalar or affine coordinate in bytes.
pub const COORDINATE_LEN: usize = 32;

/// Size of a raw ES256 signature (`r || s`).
pub const SIGNATURE_LEN: usize = 64;

/// Errors that can occur during key operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum KeyError {
    /// The provided bytes have an invalid length.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// The provided bytes do not represent a valid key.
    #[error("invalid key format")]
    InvalidFormat,

    /// The JWK describes a key type or curve other than EC P-256.
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    /// A public JWK carried private key material.
    #[error("public key carries private material")]
    PrivateMaterial,

    /// Server key material is missing or malformed.
    #[error("failed to load server key: {0}")]
    KeyLoad(String),

    /// Server private and public halves do not belong together.
    #[error("server private key does not match public key")]
    KeyPairMismatch,
}

/// A private P-256 signing key.
///
/// # Security
///
/// - Zeroized on drop (`SigningKey` implements `ZeroizeOnDrop`)
/// - No `Debug` implementation to prevent accidental logging
/// - `to_bytes()` requires explicit opt-in to access raw key material
pub struct PrivateKey(SigningKey);

impl PrivateKey {
    /// Generate a new random private key.
    #[must_use]
    pub fn generate() -> Self {
        Self(SigningKey::random(&mut rand::rngs::OsRng))
    }

    /// Load a private key from its 32-byte scalar.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::InvalidLength` if the slice is not exactly 32 bytes,
    /// `KeyError::InvalidFormat` if the scalar is zero or out of range.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != COORDINATE_LEN {
            return Err(KeyError::InvalidLength {
                expected: COORDINATE_LEN,
                actual: bytes.len(),
            });
        }
        let key = SigningKey::from_slice(bytes).map_err(|_| KeyError::InvalidFormat)?;
        Ok(Self(key))
    }

    /// Sign a message (SHA-256 digest, deterministic nonce).
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Signature {
        let signature: p256::ecdsa::Signature = self.0.sign(message);
        let mut raw = [0u8; SIGNATURE_LEN];
        raw.copy_from_slice(&signature.to_bytes());
        Signature(raw)
    }

    /// Derive the public key from this private key.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        PublicKey(VerifyingKey::from(&self.0))
    }

    /// Export the raw private scalar.
    ///
    /// # Security
    ///
    /// Handle with extreme care. Wrap the result in `Zeroizing` if it is
    /// stored or transmitted.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; COORDINATE_LEN] {
        let mut raw = [0u8; COORDINATE_LEN];
        raw.copy_from_slice(&self.0.to_bytes());
        raw
    }
}

// Explicitly NO Debug implementation for PrivateKey

/// A public P-256 verification key.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    /// Build a public key from its affine coordinates.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::InvalidLength` if either coordinate is not 32 bytes.
    /// Returns `KeyError::InvalidFormat` if the point is not on the curve.
    pub fn from_coordinates(x: &[u8], y: &[u8]) -> Result<Self, KeyError> {
        for coordinate in [x, y] {
            if coordinate.len() != COORDINATE_LEN {
                return Err(KeyError::InvalidLength {
                    expected: COORDINATE_LEN,
                    actual: coordinate.len(),
                });
            }
        }
        let point = EncodedPoint::from_affine_coordinates(
            FieldBytes::from_slice(x),
            FieldBytes::from_slice(y),
            false,
        );
        let key = VerifyingKey::from_encoded_point(&point).map_err(|_| KeyError::InvalidFormat)?;
        Ok(Self(key))
    }

    /// Export the affine coordinates `(x, y)`.
    #[must_use]
    pub fn coordinates(&self) -> ([u8; COORDINATE_LEN], [u8; COORDINATE_LEN]) {
        // Uncompressed SEC1: 0x04 || x || y
        let point = self.0.to_encoded_point(false);
        let bytes = point.as_bytes();
        let mut x = [0u8; COORDINATE_LEN];
        let mut y = [0u8; COORDINATE_LEN];
        if bytes.len() == 1 + 2 * COORDINATE_LEN {
            x.copy_from_slice(&bytes[1..=COORDINATE_LEN]);
            y.copy_from_slice(&bytes[1 + COORDINATE_LEN..]);
        }
        (x, y)
    }

    /// Verify a signature over a message.
    #[must_use]
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        match p256::ecdsa::Signature::from_slice(&signature.0) {
            Ok(sig) => self.0.verify(message, &sig).is_ok(),
            Err(_) => false,
        }
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", super::KeyId::from_public_key(self))
    }
}

/// A raw ES256 signature (`r || s`, 64 bytes).
#[derive(Clone, PartialEq, Eq)]
pub struct Signature([u8; SIGNATURE_LEN]);

impl Signature {
    /// Load a signature from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::InvalidLength` if the slice is not exactly 64 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; SIGNATURE_LEN] = bytes.try_into().map_err(|_| KeyError::InvalidLength {
            expected: SIGNATURE_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(bytes))
    }

    /// Export the raw signature bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; SIGNATURE_LEN] {
        self.0
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Signature({:02x}{:02x}{:02x}{:02x}...)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}
