//! Secure persistence for the three records a device keeps between launches:
//! the session token pair, the biometrics flag and the last sign-in email.
//!
//! [`SecureStore`] is the raw key-value backend; every call can fail on its
//! own. [`CredentialStore`] puts typed accessors on top and degrades backend
//! failures to "absent" (reads) or a logged no-op (writes), so callers never
//! see a store failure except a corrupt session record.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::session::Session;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, warn};

pub const SESSION_KEY: &str = "session";
pub const BIOMETRICS_KEY: &str = "biometrics_enabled";
pub const USER_EMAIL_KEY: &str = "user_email";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Key-value backend with independently fallible operations.
#[async_trait]
pub trait SecureStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Typed view over a [`SecureStore`].
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn SecureStore>,
}

impl CredentialStore {
    #[must_use]
    pub fn new(backend: Arc<dyn SecureStore>) -> Self {
        Self { backend }
    }

    async fn read(&self, key: &str) -> Option<String> {
        match self.backend.get(key).await {
            Ok(value) => value,
            Err(e) => {
                error!("secure store: unable to read {}: {}", key, e);
                None
            }
        }
    }

    async fn write(&self, key: &str, value: &str) {
        if let Err(e) = self.backend.set(key, value).await {
            error!("secure store: unable to write {}: {}", key, e);
        }
    }

    async fn remove(&self, key: &str) {
        if let Err(e) = self.backend.delete(key).await {
            error!("secure store: unable to delete {}: {}", key, e);
        }
    }

    /// Persist the token pair, overwriting any previous one.
    pub async fn save_session(&self, session: &Session) {
        match session.to_json() {
            Ok(json) => self.write(SESSION_KEY, &json).await,
            Err(e) => error!("secure store: unable to encode session: {}", e),
        }
    }

    /// Load the stored token pair.
    ///
    /// Backend failures read as `Ok(None)`.
    ///
    /// # Errors
    /// Returns [`StoreError::Encoding`] when a record exists but is not a token pair.
    pub async fn load_session(&self) -> Result<Option<Session>, StoreError> {
        match self.read(SESSION_KEY).await {
            Some(json) => Ok(Some(Session::from_json(&json)?)),
            None => Ok(None),
        }
    }

    pub async fn clear_session(&self) {
        self.remove(SESSION_KEY).await;
    }

    pub async fn set_biometrics_enabled(&self, enabled: bool) {
        let value = if enabled { "true" } else { "false" };
        self.write(BIOMETRICS_KEY, value).await;
    }

    /// Anything other than a stored `true` reads as disabled.
    pub async fn is_biometrics_enabled(&self) -> bool {
        match self.read(BIOMETRICS_KEY).await {
            Some(value) => match serde_json::from_str::<bool>(&value) {
                Ok(enabled) => enabled,
                Err(_) => {
                    warn!("secure store: ignoring malformed biometrics flag");
                    false
                }
            },
            None => false,
        }
    }

    pub async fn save_user_email(&self, email: &str) {
        self.write(USER_EMAIL_KEY, email).await;
    }

    pub async fn load_user_email(&self) -> Option<String> {
        self.read(USER_EMAIL_KEY).await
    }

    pub async fn clear_user_email(&self) {
        self.remove(USER_EMAIL_KEY).await;
    }
}
