//! Server key material with atomic reload.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use prs_auth::{KeyError, KeyId, KeyMaterialProvider, PrivateKey, PublicKey, ServerKeys};

/// Current server key pair, swappable without blocking readers.
///
/// Issuers and verifiers hold this as their [`KeyMaterialProvider`] and load
/// the keys on every call, so a reload takes effect on the next request.
pub struct ServerKeyProvider {
    current: ArcSwapOption<ServerKeys>,
}

impl ServerKeyProvider {
    #[must_use]
    pub fn new(keys: ServerKeys) -> Self {
        Self {
            current: ArcSwapOption::from_pointee(keys),
        }
    }

    /// A provider with no keys: every load fails with `KeyError::KeyLoad`.
    #[must_use]
    pub fn unconfigured() -> Self {
        Self {
            current: ArcSwapOption::empty(),
        }
    }

    /// Replace the key pair. In-flight requests finish with the old pair.
    pub fn reload(&self, keys: ServerKeys) {
        let kid = keys.kid().clone();
        self.current.store(Some(Arc::new(keys)));
        tracing::info!(kid = %kid, "Server keys reloaded");
    }

    #[must_use]
    pub fn kid(&self) -> Option<KeyId> {
        self.current.load_full().map(|keys| keys.kid().clone())
    }

    fn keys(&self) -> Result<Arc<ServerKeys>, KeyError> {
        self.current.load_full().ok_or_else(|| {
            tracing::error!("Server key material requested but not configured");
            KeyError::KeyLoad("server keys not configured".into())
        })
    }
}

impl KeyMaterialProvider for ServerKeyProvider {
    fn load_private_key(&self) -> Result<Arc<PrivateKey>, KeyError> {
        self.keys()?.load_private_key()
    }

    fn load_public_key(&self) -> Result<PublicKey, KeyError> {
        self.keys()?.load_public_key()
    }

    fn load_signing_key(&self) -> Result<(Arc<PrivateKey>, KeyId), KeyError> {
        self.keys()?.load_signing_key()
    }
}
