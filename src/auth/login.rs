//! Login-screen flows: which sign-in options to show, credential sign-in and
//! biometric sign-in on demand.
//!
//! Unlike launch gating, a failed biometric sign-in here never wipes stored
//! state; it only steers the user to a credential form, pre-filled with the
//! remembered email when there is one.

use super::{AuthError, AuthOrchestrator};
use crate::session::{SessionGrant, User};
use regex::Regex;
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub const BIOMETRIC_SIGN_IN_PROMPT: &str = "Sign in with Face ID";

#[must_use]
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").map_or(false, |re| re.is_match(email))
}

/// What the login screen should offer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoginOptions {
    /// Biometrics already enabled and usable.
    pub show_biometric_sign_in: bool,
    /// Usable but not enabled yet; offer to enable after a credential sign-in.
    pub can_offer_biometrics: bool,
    pub stored_email: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BiometricLogin {
    Restored(User),
    /// Session could not be restored; ask only for the password of this email.
    PasswordOnly { email: String },
    CredentialsRequired,
    Denied,
}

pub struct LoginFlow {
    auth: Arc<AuthOrchestrator>,
}

impl LoginFlow {
    #[must_use]
    pub const fn new(auth: Arc<AuthOrchestrator>) -> Self {
        Self { auth }
    }

    pub async fn options(&self) -> LoginOptions {
        let store = self.auth.store();
        let enabled = store.is_biometrics_enabled().await;
        let capable = self.auth.gate().capability().await;

        let options = LoginOptions {
            show_biometric_sign_in: enabled && capable,
            can_offer_biometrics: capable && !enabled,
            stored_email: store.load_user_email().await,
        };

        debug!(
            enabled,
            capable,
            show_biometric_sign_in = options.show_biometric_sign_in,
            "login options"
        );

        options
    }

    /// Credential sign-in from the login form.
    ///
    /// # Errors
    /// Returns [`AuthError::InvalidEmail`] before any request when the email is
    /// malformed, otherwise the Session Service failure.
    #[instrument(skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &SecretString) -> Result<User, AuthError> {
        let email = email.trim();
        if !valid_email(email) {
            return Err(AuthError::InvalidEmail);
        }

        self.auth.sign_in_with_email(email, password).await
    }

    /// Sign in with the remembered email and a freshly typed password.
    ///
    /// # Errors
    /// Returns [`AuthError::MissingEmail`] when no email is remembered,
    /// otherwise the Session Service failure.
    pub async fn password_only_sign_in(&self, password: &SecretString) -> Result<User, AuthError> {
        let email = self
            .auth
            .store()
            .load_user_email()
            .await
            .ok_or(AuthError::MissingEmail)?;

        self.auth.sign_in_with_email(&email, password).await
    }

    #[instrument(skip(self))]
    pub async fn biometric_sign_in(&self) -> BiometricLogin {
        if !self.auth.gate().challenge(BIOMETRIC_SIGN_IN_PROMPT).await {
            info!("biometric sign-in denied");
            return BiometricLogin::Denied;
        }

        let sessions = self.auth.sessions();

        match self.auth.store().load_session().await {
            Ok(Some(stored)) => match sessions.set_session(&stored).await {
                Ok(SessionGrant { user, session }) => {
                    self.auth.store().save_session(&session).await;
                    self.auth.restore_session_state(user.clone(), session);
                    info!("session restored by biometric sign-in");
                    BiometricLogin::Restored(user)
                }
                Err(e) => {
                    warn!("failed to restore session after biometric sign-in: {}", e);
                    self.fallback().await
                }
            },
            Ok(None) => {
                debug!("no stored session, checking for a live one");
                let live = match sessions.current_session().await {
                    Ok(live) => live,
                    Err(e) => {
                        warn!("unable to read live session: {}", e);
                        None
                    }
                };
                let Some(session) = live else {
                    return self.fallback().await;
                };

                match sessions.current_user().await {
                    Ok(Some(user)) => {
                        self.auth.store().save_session(&session).await;
                        self.auth.restore_session_state(user.clone(), session);
                        info!("live session adopted by biometric sign-in");
                        BiometricLogin::Restored(user)
                    }
                    Ok(None) => self.fallback().await,
                    Err(e) => {
                        warn!("unable to read live user: {}", e);
                        self.fallback().await
                    }
                }
            }
            Err(e) => {
                warn!("stored session unreadable: {}", e);
                self.fallback().await
            }
        }
    }

    async fn fallback(&self) -> BiometricLogin {
        match self.auth.store().load_user_email().await {
            Some(email) => BiometricLogin::PasswordOnly { email },
            None => BiometricLogin::CredentialsRequired,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::auth::{AuthPhase, RestorePolicy};
    use crate::biometric::BiometricGate;
    use crate::session::{Session, SessionError};
    use crate::store::{CredentialStore, MemoryStore};
    use crate::test_support::{grant, FakeSensor, FakeSessions};
    use std::time::Duration;

    fn flow(sessions: FakeSessions, sensor: FakeSensor) -> (LoginFlow, Arc<AuthOrchestrator>) {
        let auth = Arc::new(AuthOrchestrator::new(
            CredentialStore::new(Arc::new(MemoryStore::new())),
            BiometricGate::new(Arc::new(sensor)),
            Arc::new(sessions),
            RestorePolicy {
                attempts: 1,
                base_backoff: Duration::ZERO,
            },
        ));
        (LoginFlow::new(auth.clone()), auth)
    }

    #[test]
    fn test_valid_email() {
        assert!(valid_email("ana@example.com"));
        assert!(!valid_email("ana@example"));
        assert!(!valid_email("ana example@x.com"));
        assert!(!valid_email(""));
    }

    #[tokio::test]
    async fn test_options() {
        let (login, auth) = flow(FakeSessions::new(), FakeSensor::new(true, true));
        let options = login.options().await;
        assert!(!options.show_biometric_sign_in);
        assert!(options.can_offer_biometrics);
        assert!(options.stored_email.is_none());

        auth.enable_biometrics().await;
        auth.store().save_user_email("ana@example.com").await;
        let options = login.options().await;
        assert!(options.show_biometric_sign_in);
        assert!(!options.can_offer_biometrics);
        assert_eq!(options.stored_email.as_deref(), Some("ana@example.com"));

        let (login, auth) = flow(FakeSessions::new(), FakeSensor::new(true, false));
        auth.enable_biometrics().await;
        let options = login.options().await;
        assert!(!options.show_biometric_sign_in);
        assert!(!options.can_offer_biometrics);
    }

    #[tokio::test]
    async fn test_sign_in_rejects_malformed_email() {
        let sessions = FakeSessions::new();
        sessions.push_sign_in(Ok(grant("ana@example.com", "a", "r")));
        let (login, auth) = flow(sessions, FakeSensor::new(true, true));

        let result = login
            .sign_in("not-an-email", &SecretString::from("hunter2"))
            .await;

        assert!(matches!(result, Err(AuthError::InvalidEmail)));
        assert!(!auth.state().is_authenticated());
    }

    #[tokio::test]
    async fn test_sign_in_trims_email() {
        let sessions = FakeSessions::new();
        sessions.push_sign_in(Ok(grant("ana@example.com", "a", "r")));
        let (login, auth) = flow(sessions, FakeSensor::new(true, true));

        login
            .sign_in("  ana@example.com ", &SecretString::from("hunter2"))
            .await
            .unwrap();

        assert_eq!(
            auth.store().load_user_email().await.as_deref(),
            Some("ana@example.com")
        );
    }

    #[tokio::test]
    async fn test_password_only_needs_stored_email() {
        let (login, _) = flow(FakeSessions::new(), FakeSensor::new(true, true));
        let result = login
            .password_only_sign_in(&SecretString::from("hunter2"))
            .await;
        assert!(matches!(result, Err(AuthError::MissingEmail)));
    }

    #[tokio::test]
    async fn test_biometric_sign_in_restores_stored_session() {
        let restored = grant("ana@example.com", "a1", "r1");
        let sessions = FakeSessions::new();
        sessions.push_restore(Ok(restored.clone()));
        let (login, auth) = flow(sessions, FakeSensor::answering(&[true]));
        auth.initialize().await.unwrap();
        auth.store().save_session(&restored.session).await;

        let outcome = login.biometric_sign_in().await;

        assert_eq!(outcome, BiometricLogin::Restored(restored.user));
        assert_eq!(auth.state().phase(), AuthPhase::Authenticated);
    }

    #[tokio::test]
    async fn test_biometric_sign_in_falls_back_to_password_only() {
        let sessions = FakeSessions::new();
        sessions.push_restore(Err(SessionError::Rejected("expired".to_string())));
        let (login, auth) = flow(sessions, FakeSensor::answering(&[true]));
        auth.store().save_session(&Session::new("a1", "r1")).await;
        auth.store().save_user_email("ana@example.com").await;
        auth.enable_biometrics().await;

        let outcome = login.biometric_sign_in().await;

        assert_eq!(
            outcome,
            BiometricLogin::PasswordOnly {
                email: "ana@example.com".to_string()
            }
        );
        // no destructive reset outside launch
        assert!(auth.store().is_biometrics_enabled().await);
    }

    #[tokio::test]
    async fn test_biometric_sign_in_adopts_live_session() {
        let live = grant("ana@example.com", "a5", "r5");
        let (login, auth) = flow(
            FakeSessions::with_live(live.clone()),
            FakeSensor::answering(&[true]),
        );

        let outcome = login.biometric_sign_in().await;

        assert_eq!(outcome, BiometricLogin::Restored(live.user));
        assert_eq!(
            auth.store().load_session().await.unwrap(),
            Some(live.session)
        );
    }

    #[tokio::test]
    async fn test_biometric_sign_in_without_anything() {
        let (login, _) = flow(FakeSessions::new(), FakeSensor::answering(&[true]));
        assert_eq!(
            login.biometric_sign_in().await,
            BiometricLogin::CredentialsRequired
        );
    }

    #[tokio::test]
    async fn test_biometric_sign_in_denied() {
        let sessions = FakeSessions::new();
        let (login, auth) = flow(sessions, FakeSensor::answering(&[false]));
        auth.store().save_session(&Session::new("a1", "r1")).await;

        assert_eq!(login.biometric_sign_in().await, BiometricLogin::Denied);
        assert!(auth.store().load_session().await.unwrap().is_some());
    }
}
