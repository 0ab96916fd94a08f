//! Hash engine: fast deterministic digests and a slow salted hash.
//!
//! SHA-256 is used wherever the input is public or already bound to a key
//! (kids, request binding, SMS OTP records). Argon2id is used for secrets
//! that must resist offline guessing on their own (email OTP codes).

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Argon2 memory cost in KiB.
pub const SLOW_HASH_MEMORY_KIB: u32 = 4096;

/// Argon2 iteration count.
pub const SLOW_HASH_ITERATIONS: u32 = 2;

/// Argon2 lanes.
pub const SLOW_HASH_PARALLELISM: u32 = 1;

/// Argon2 output length in bytes.
pub const SLOW_HASH_OUTPUT_LEN: usize = 32;

/// Random salt length in bytes.
pub const SLOW_HASH_SALT_LEN: usize = 16;

/// Errors from the slow hash.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum HashError {
    #[error("invalid hash parameters")]
    InvalidParameters,

    #[error("hashing failed")]
    HashFailed,
}

/// Raw SHA-256 digest.
#[must_use]
pub fn sha256(data: impl AsRef<[u8]>) -> [u8; 32] {
    Sha256::digest(data.as_ref()).into()
}

/// Lowercase hex SHA-256.
#[must_use]
pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    hex::encode(sha256(data))
}

/// Standard Base64 (padded) SHA-256.
#[must_use]
pub fn sha256_base64(data: impl AsRef<[u8]>) -> String {
    STANDARD.encode(sha256(data))
}

/// Base64url (no padding) SHA-256.
#[must_use]
pub fn sha256_base64url(data: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(sha256(data))
}

/// Serialize JSON canonically: object keys sorted by UTF-16 code units,
/// no insignificant whitespace.
///
/// Issuance and verification sides must both use this function; any other
/// encoder changes the bytes and therefore every derived hash.
#[must_use]
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.encode_utf16().cmp(b.encode_utf16()));

            out.push('{');
            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(value, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        // Scalars: serde_json's compact form is already canonical for
        // strings, booleans, null and integers.
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Argon2id hasher for low-entropy secrets.
#[derive(Clone)]
pub struct SlowHasher {
    argon2: Argon2<'static>,
}

impl SlowHasher {
    /// Create a hasher with the deployment parameters
    /// (m = 4096 KiB, t = 2, p = 1, 32-byte output).
    ///
    /// # Errors
    ///
    /// Returns `HashError::InvalidParameters` if argon2 rejects the parameters.
    pub fn new() -> Result<Self, HashError> {
        let params = Params::new(
            SLOW_HASH_MEMORY_KIB,
            SLOW_HASH_ITERATIONS,
            SLOW_HASH_PARALLELISM,
            Some(SLOW_HASH_OUTPUT_LEN),
        )
        .map_err(|_| HashError::InvalidParameters)?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hash a secret with a fresh random salt, returning a PHC string.
    ///
    /// # Errors
    ///
    /// Returns `HashError::HashFailed` if argon2 fails.
    pub fn hash(&self, secret: &str) -> Result<String, HashError> {
        let mut salt = [0u8; SLOW_HASH_SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let salt = SaltString::encode_b64(&salt).map_err(|_| HashError::HashFailed)?;

        self.argon2
            .hash_password(secret.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|_| HashError::HashFailed)
    }

    /// Check a secret against a stored PHC string.
    ///
    /// Malformed stored hashes never match. The final comparison is
    /// constant time.
    #[must_use]
    pub fn verify(&self, secret: &str, stored: &str) -> bool {
        match PasswordHash::new(stored) {
            Ok(parsed) => self
                .argon2
                .verify_password(secret.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}

impl std::fmt::Debug for SlowHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlowHasher").finish_non_exhaustive()
    }
}
