//! Session manager shared by the middleware.

use std::sync::Arc;

use cookie::Key;
use satchel_session::{SessionEngine, SessionOptions};
use tracing::info;

use crate::error::{Result, ServerError};

/// Shortest secret accepted for signing cookies.
pub const MIN_SECRET_LEN: usize = 32;

struct ManagerInner {
    engine: SessionEngine,
    key: Option<Key>,
}

/// Engine plus cookie signing key. Cheap to clone.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<ManagerInner>,
}

impl SessionManager {
    /// Create a manager.
    ///
    /// `secret` is required when `options.signed` is on and must be at least
    /// [`MIN_SECRET_LEN`] bytes. The signing key is derived from it.
    pub fn new(options: SessionOptions, secret: Option<&[u8]>) -> Result<Self> {
        let key = match secret {
            Some(secret) if secret.len() < MIN_SECRET_LEN => {
                return Err(ServerError::Config(format!(
                    "session secret must be at least {} bytes, got {}",
                    MIN_SECRET_LEN,
                    secret.len()
                )));
            }
            Some(secret) => Some(Key::derive_from(secret)),
            None if options.signed => {
                return Err(ServerError::Config(
                    "signed session cookies require a secret".to_string(),
                ));
            }
            None => None,
        };

        let engine = SessionEngine::new(options)?;
        info!(
            key = %engine.options().key,
            signed = engine.options().signed,
            external = engine.options().is_external(),
            "Session manager ready"
        );

        Ok(Self {
            inner: Arc::new(ManagerInner { engine, key }),
        })
    }

    pub fn engine(&self) -> &SessionEngine {
        &self.inner.engine
    }

    pub fn options(&self) -> &SessionOptions {
        self.inner.engine.options()
    }

    pub(crate) fn key(&self) -> Option<&Key> {
        self.inner.key.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_requires_secret() {
        let result = SessionManager::new(SessionOptions::new(), None);
        assert!(matches!(result, Err(ServerError::Config(_))));
    }

    #[test]
    fn test_short_secret_rejected() {
        let result = SessionManager::new(SessionOptions::new(), Some(b"short".as_slice()));
        assert!(matches!(result, Err(ServerError::Config(_))));
    }

    #[test]
    fn test_unsigned_without_secret() {
        let manager = SessionManager::new(SessionOptions::new().with_signed(false), None).unwrap();
        assert!(manager.key().is_none());
        assert!(!manager.options().signed);
    }

    #[test]
    fn test_invalid_options_rejected() {
        let result = SessionManager::new(
            SessionOptions::new().with_key(""),
            Some(&[1u8; MIN_SECRET_LEN][..]),
        );
        assert!(matches!(
            result,
            Err(ServerError::Session(satchel_session::Error::Config(_)))
        ));
    }
}
