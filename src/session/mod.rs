//! Session Service seam: the token pair, the user projection and the trait the
//! rest of the crate uses to talk to the remote identity provider.
//!
//! Token material lives in `SecretString` so it never reaches `Debug` output
//! or log lines. The persisted form is the JSON token pair produced by
//! [`Session::to_json`] and nothing else.

pub mod client;

pub use client::AuthClient;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Access and refresh token pair issued by the Session Service.
#[derive(Clone, Debug)]
pub struct Session {
    access_token: SecretString,
    refresh_token: SecretString,
}

#[derive(Serialize, Deserialize)]
struct TokenPair<'a> {
    access_token: std::borrow::Cow<'a, str>,
    refresh_token: std::borrow::Cow<'a, str>,
}

impl Session {
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            refresh_token: SecretString::from(refresh_token.into()),
        }
    }

    #[must_use]
    pub fn access_token(&self) -> &SecretString {
        &self.access_token
    }

    #[must_use]
    pub fn refresh_token(&self) -> &SecretString {
        &self.refresh_token
    }

    /// Serialize the token pair, the only persisted form of a session.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&TokenPair {
            access_token: self.access_token.expose_secret().into(),
            refresh_token: self.refresh_token.expose_secret().into(),
        })
    }

    /// Parse a token pair written by [`Session::to_json`].
    ///
    /// # Errors
    /// Returns an error if the value is not a JSON token pair.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let pair: TokenPair<'_> = serde_json::from_str(json)?;
        Ok(Self::new(pair.access_token, pair.refresh_token))
    }
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        self.access_token.expose_secret() == other.access_token.expose_secret()
            && self.refresh_token.expose_secret() == other.refresh_token.expose_secret()
    }
}

impl Eq for Session {}

/// Identity projection of a session. Held in memory only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

/// Result of a successful sign-in or session restore.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionGrant {
    pub user: User,
    pub session: Session,
}

#[derive(Debug, Error)]
pub enum SessionError {
    /// Credentials refused; carries the service's own message for the login screen.
    #[error("{0}")]
    InvalidCredentials(String),
    #[error("session rejected: {0}")]
    Rejected(String),
    #[error("session service unavailable: {0}")]
    Unavailable(String),
    #[error("session service unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid response from session service: {0}")]
    InvalidResponse(String),
}

impl SessionError {
    /// Whether a retry could succeed without the user doing anything.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Transport(_))
    }
}

/// Remote identity provider consumed by the orchestrator and the flows.
#[async_trait]
pub trait SessionService: Send + Sync {
    async fn sign_in(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<SessionGrant, SessionError>;

    async fn sign_out(&self) -> Result<(), SessionError>;

    /// Drop the live session held on this device without contacting the
    /// service, so nothing can be silently restored from it later.
    async fn discard(&self);

    async fn current_user(&self) -> Result<Option<User>, SessionError>;

    async fn current_session(&self) -> Result<Option<Session>, SessionError>;

    /// Restore a session from a stored token pair.
    async fn set_session(&self, session: &Session) -> Result<SessionGrant, SessionError>;
}
