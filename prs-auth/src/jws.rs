//! Compact JWS codec (ES256 only).
//!
//! Tokens are `base64url(header).base64url(payload).base64url(signature)`.
//! The header is decoded once into the typed [`JoseHeader`]; nothing reads
//! header members as an untyped map.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::identity::{Jwk, PrivateKey, PublicKey, Signature};

/// The only accepted algorithm.
pub const ALG_ES256: &str = "ES256";

/// The only accepted `typ` when present.
pub const TYP_JWT: &str = "JWT";

/// Upper bound on an encoded token. Nested certificates make assertion
/// headers large, but never this large.
pub const MAX_TOKEN_LEN: usize = 64 * 1024;

/// Errors from decoding a compact token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum TokenError {
    /// The token is not three Base64url segments of JSON.
    #[error("malformed token: {0}")]
    Malformed(&'static str),

    /// `alg` is anything other than ES256.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// `typ` is present and not JWT.
    #[error("unsupported token type: {0}")]
    UnsupportedType(String),

    /// The header lists critical extensions; none are understood.
    #[error("unsupported critical header: {0}")]
    UnsupportedCritical(String),

    /// The payload does not have the expected claims.
    #[error("invalid claims")]
    InvalidClaims,
}

/// Typed JOSE header.
///
/// `devJwt`, `accountJwt`, `kycJwt` carry nested certificates;
/// `recoveryJwt` carries a recovery token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoseHeader {
    pub alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwk: Option<Jwk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crit: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev_jwt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_jwt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kyc_jwt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_jwt: Option<String>,
}

impl JoseHeader {
    /// An ES256/JWT header with no optional members.
    #[must_use]
    pub fn es256() -> Self {
        Self {
            alg: ALG_ES256.to_string(),
            typ: Some(TYP_JWT.to_string()),
            kid: None,
            jwk: None,
            crit: None,
            dev_jwt: None,
            account_jwt: None,
            kyc_jwt: None,
            recovery_jwt: None,
        }
    }
}

/// A decoded, not yet verified, compact JWS.
#[derive(Debug, Clone)]
pub struct CompactJws {
    header: JoseHeader,
    payload: Vec<u8>,
    signing_input: String,
    signature: Signature,
}

impl CompactJws {
    /// Decode a compact token and check its header policy.
    ///
    /// # Errors
    ///
    /// - `TokenError::Malformed` for structural problems
    /// - `TokenError::UnsupportedAlgorithm` unless `alg` is ES256
    /// - `TokenError::UnsupportedType` if `typ` is present and not JWT
    /// - `TokenError::UnsupportedCritical` if `crit` names anything
    pub fn parse(token: &str) -> Result<Self, TokenError> {
        if token.len() > MAX_TOKEN_LEN {
            return Err(TokenError::Malformed("token too large"));
        }

        let mut parts = token.split('.');
        let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed("expected three segments"));
        };

        let header_json = URL_SAFE_NO_PAD
            .decode(header_b64)
            .map_err(|_| TokenError::Malformed("header is not base64url"))?;
        let header: JoseHeader = serde_json::from_slice(&header_json)
            .map_err(|_| TokenError::Malformed("header is not a JOSE header"))?;

        if header.alg != ALG_ES256 {
            return Err(TokenError::UnsupportedAlgorithm(header.alg));
        }
        if let Some(typ) = &header.typ {
            if !typ.eq_ignore_ascii_case(TYP_JWT) {
                return Err(TokenError::UnsupportedType(typ.clone()));
            }
        }
        if let Some(first) = header.crit.as_ref().and_then(|crit| crit.first()) {
            return Err(TokenError::UnsupportedCritical(first.clone()));
        }

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| TokenError::Malformed("payload is not base64url"))?;
        let signature_bytes = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| TokenError::Malformed("signature is not base64url"))?;
        let signature = Signature::from_bytes(&signature_bytes)
            .map_err(|_| TokenError::Malformed("signature is not 64 bytes"))?;

        Ok(Self {
            header,
            payload,
            signing_input: format!("{}.{}", header_b64, payload_b64),
            signature,
        })
    }

    #[must_use]
    pub fn header(&self) -> &JoseHeader {
        &self.header
    }

    /// Check the signature against `key`.
    #[must_use]
    pub fn verify_with(&self, key: &PublicKey) -> bool {
        key.verify(self.signing_input.as_bytes(), &self.signature)
    }

    /// Decode the payload as `T`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::InvalidClaims` if the payload does not match `T`.
    pub fn claims<T: DeserializeOwned>(&self) -> Result<T, TokenError> {
        serde_json::from_slice(&self.payload).map_err(|_| TokenError::InvalidClaims)
    }

    /// Sign `claims` under `header` and return the compact serialization.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::InvalidClaims` if the claims can't be serialized.
    pub fn sign<T: Serialize>(
        header: &JoseHeader,
        claims: &T,
        key: &PrivateKey,
    ) -> Result<String, TokenError> {
        let header_json = serde_json::to_vec(header).map_err(|_| TokenError::InvalidClaims)?;
        let payload_json = serde_json::to_vec(claims).map_err(|_| TokenError::InvalidClaims)?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header_json),
            URL_SAFE_NO_PAD.encode(payload_json)
        );
        let signature = key.sign(signing_input.as_bytes());

        Ok(format!(
            "{}.{}",
            signing_input,
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode_segment(value: &serde_json::Value) -> String {
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(value).unwrap())
    }

    fn forged(header: serde_json::Value) -> String {
        format!(
            "{}.{}.{}",
            encode_segment(&header),
            encode_segment(&json!({})),
            URL_SAFE_NO_PAD.encode([1u8; 64])
        )
    }

    #[test]
    fn test_sign_then_parse_and_verify() {
        let key = PrivateKey::generate();
        let token = CompactJws::sign(&JoseHeader::es256(), &json!({"hash": "abc"}), &key).unwrap();

        let jws = CompactJws::parse(&token).unwrap();
        assert!(jws.verify_with(&key.public_key()));
        assert_eq!(jws.claims::<serde_json::Value>().unwrap()["hash"], "abc");
    }

    #[test]
    fn test_wrong_key_fails_verification() {
        let key = PrivateKey::generate();
        let token = CompactJws::sign(&JoseHeader::es256(), &json!({}), &key).unwrap();

        let jws = CompactJws::parse(&token).unwrap();
        assert!(!jws.verify_with(&PrivateKey::generate().public_key()));
    }

    #[test]
    fn test_tampered_payload_fails_verification() {
        let key = PrivateKey::generate();
        let token = CompactJws::sign(&JoseHeader::es256(), &json!({"a": 1}), &key).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let tampered_payload = encode_segment(&json!({"a": 2}));
        parts[1] = &tampered_payload;

        let jws = CompactJws::parse(&parts.join(".")).unwrap();
        assert!(!jws.verify_with(&key.public_key()));
    }

    #[test]
    fn test_segment_count_enforced() {
        assert!(matches!(
            CompactJws::parse("a.b"),
            Err(TokenError::Malformed(_))
        ));
        assert!(matches!(
            CompactJws::parse("a.b.c.d"),
            Err(TokenError::Malformed(_))
        ));
        assert!(matches!(CompactJws::parse(""), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn test_non_es256_rejected() {
        let token = forged(json!({"alg": "none"}));
        assert_eq!(
            CompactJws::parse(&token).unwrap_err(),
            TokenError::UnsupportedAlgorithm("none".into())
        );

        let token = forged(json!({"alg": "HS256"}));
        assert_eq!(
            CompactJws::parse(&token).unwrap_err(),
            TokenError::UnsupportedAlgorithm("HS256".into())
        );
    }

    #[test]
    fn test_critical_header_rejected() {
        let token = forged(json!({"alg": "ES256", "crit": ["exp"]}));
        assert_eq!(
            CompactJws::parse(&token).unwrap_err(),
            TokenError::UnsupportedCritical("exp".into())
        );
    }

    #[test]
    fn test_empty_critical_list_accepted() {
        let token = forged(json!({"alg": "ES256", "crit": []}));
        assert!(CompactJws::parse(&token).is_ok());
    }

    #[test]
    fn test_unknown_typ_rejected() {
        let token = forged(json!({"alg": "ES256", "typ": "dpop+jwt"}));
        assert!(matches!(
            CompactJws::parse(&token),
            Err(TokenError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_short_signature_rejected() {
        let token = format!(
            "{}.{}.{}",
            encode_segment(&json!({"alg": "ES256"})),
            encode_segment(&json!({})),
            URL_SAFE_NO_PAD.encode([1u8; 32])
        );
        assert_eq!(
            CompactJws::parse(&token).unwrap_err(),
            TokenError::Malformed("signature is not 64 bytes")
        );
    }

    #[test]
    fn test_nested_slots_use_camel_case() {
        let mut header = JoseHeader::es256();
        header.dev_jwt = Some("cert".into());
        header.recovery_jwt = Some("rec".into());

        let json = serde_json::to_value(&header).unwrap();
        assert_eq!(json["devJwt"], "cert");
        assert_eq!(json["recoveryJwt"], "rec");
        assert!(json.get("accountJwt").is_none());
    }

    #[test]
    fn test_oversized_token_rejected() {
        let token = "a".repeat(MAX_TOKEN_LEN + 1);
        assert!(matches!(
            CompactJws::parse(&token),
            Err(TokenError::Malformed(_))
        ));
    }
}
