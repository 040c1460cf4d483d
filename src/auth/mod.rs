//! Auth orchestrator: the launch-time state machine and the session actions.
//!
//! Launch flow (`initialize`, once per process):
//! - biometrics off: silently restore the Session Service's live session.
//! - biometrics on: the gate must be usable and the challenge must pass,
//!   then the stored token pair is restored (or a live session adopted).
//!   An unusable gate, a failed challenge or a rejected stored session wipes
//!   the stored session, the flag, the email and the Session Service's live
//!   session.
//!
//! Transport failures while restoring a stored session are retried per
//! [`RestorePolicy`]. If they never clear, the launch ends unauthenticated
//! but nothing is wiped, so a connectivity blip does not force a full
//! re-login with biometrics re-enrolled.

pub mod login;
pub mod state;


pub use login::{BiometricLogin, LoginFlow, LoginOptions};
pub use state::{AuthPhase, AuthState, AuthView};

use crate::biometric::BiometricGate;
use crate::session::{Session, SessionError, SessionGrant, SessionService, User};
use crate::store::CredentialStore;
use anyhow::Context;
use rand::Rng;
use secrecy::SecretString;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

pub const UNLOCK_PROMPT: &str = "Unlock Shiftclock";

/// Longest wait between two restore attempts, before jitter.
pub const MAX_RESTORE_BACKOFF: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("auth already initialized")]
    AlreadyInitialized,
    #[error("invalid email address")]
    InvalidEmail,
    #[error("no stored email to sign in with")]
    MissingEmail,
    #[error(transparent)]
    SignIn(#[from] SessionError),
}

/// Retry schedule for transient failures while restoring a stored session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RestorePolicy {
    pub attempts: u32,
    pub base_backoff: Duration,
}

impl Default for RestorePolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_backoff: Duration::from_secs(1),
        }
    }
}

impl RestorePolicy {
    /// Delay before retry number `attempt + 1`: exponential, capped at
    /// [`MAX_RESTORE_BACKOFF`], with 20% jitter.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_backoff
            .checked_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
            .map_or(MAX_RESTORE_BACKOFF, |delay| delay.min(MAX_RESTORE_BACKOFF));
        exponential.mul_f64(rand::thread_rng().gen_range(0.8..1.2))
    }
}

/// Owns the auth state and every write to it.
pub struct AuthOrchestrator {
    store: CredentialStore,
    gate: BiometricGate,
    sessions: Arc<dyn SessionService>,
    policy: RestorePolicy,
    state: watch::Sender<AuthState>,
    initialized: AtomicBool,
}

impl AuthOrchestrator {
    #[must_use]
    pub fn new(
        store: CredentialStore,
        gate: BiometricGate,
        sessions: Arc<dyn SessionService>,
        policy: RestorePolicy,
    ) -> Self {
        let (state, _) = watch::channel(AuthState::starting());

        Self {
            store,
            gate,
            sessions,
            policy,
            state,
            initialized: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn view(&self) -> AuthView {
        AuthView::new(self.state.subscribe())
    }

    #[must_use]
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub const fn store(&self) -> &CredentialStore {
        &self.store
    }

    #[must_use]
    pub const fn gate(&self) -> &BiometricGate {
        &self.gate
    }

    #[must_use]
    pub fn sessions(&self) -> Arc<dyn SessionService> {
        self.sessions.clone()
    }

    fn publish(&self, grant: Option<SessionGrant>, initializing: bool) {
        self.state.send_replace(match grant {
            Some(SessionGrant { user, session }) => AuthState {
                user: Some(user),
                session: Some(session),
                initializing,
            },
            None => AuthState {
                user: None,
                session: None,
                initializing,
            },
        });
    }

    /// Decide the launch state. Runs at most once per orchestrator.
    ///
    /// # Errors
    /// Returns [`AuthError::AlreadyInitialized`] on any call after the first;
    /// the state is left untouched.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<AuthPhase, AuthError> {
        if self
            .initialized
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("initialize called more than once");
            return Err(AuthError::AlreadyInitialized);
        }

        let grant = match self.launch().await {
            Ok(grant) => grant,
            Err(e) => {
                error!("Failed to initialize auth: {:#}", e);
                None
            }
        };

        // launch is over on every path
        self.publish(grant, false);

        let phase = self.state.borrow().phase();
        info!(?phase, "auth initialized");

        Ok(phase)
    }

    async fn launch(&self) -> anyhow::Result<Option<SessionGrant>> {
        if self.store.is_biometrics_enabled().await {
            info!("biometrics enabled, gating launch");
            self.gated_launch().await
        } else {
            debug!("biometrics not enabled, checking for a live session");
            self.silent_restore().await
        }
    }

    async fn silent_restore(&self) -> anyhow::Result<Option<SessionGrant>> {
        let user = match self.sessions.current_user().await {
            Ok(Some(user)) => user,
            Ok(None) => return Ok(None),
            Err(e) => {
                debug!("no live session: {}", e);
                return Ok(None);
            }
        };

        let session = self
            .sessions
            .current_session()
            .await
            .context("reading live session")?;

        Ok(session.map(|session| SessionGrant { user, session }))
    }

    async fn gated_launch(&self) -> anyhow::Result<Option<SessionGrant>> {
        if !self.gate.capability().await {
            warn!("biometrics enabled but unavailable, resetting");
            self.reset().await;
            return Ok(None);
        }

        if !self.gate.challenge(UNLOCK_PROMPT).await {
            warn!("biometric challenge failed at launch, resetting");
            self.reset().await;
            return Ok(None);
        }

        let stored = match self.store.load_session().await {
            Ok(stored) => stored,
            Err(e) => {
                warn!("stored session is corrupt, resetting: {}", e);
                self.reset().await;
                return Ok(None);
            }
        };

        match stored {
            Some(stored) => Ok(self.restore_stored(&stored).await),
            None => self.adopt_live_session().await,
        }
    }

    async fn restore_stored(&self, stored: &Session) -> Option<SessionGrant> {
        match self.set_session_with_retry(stored).await {
            Ok(grant) => {
                self.store.save_session(&grant.session).await;
                info!("session restored after biometric unlock");
                Some(grant)
            }
            Err(e) if e.is_transient() => {
                warn!("session service unreachable, keeping stored credentials: {}", e);
                None
            }
            Err(e) => {
                warn!("stored session rejected, resetting: {}", e);
                self.reset().await;
                None
            }
        }
    }

    async fn set_session_with_retry(&self, stored: &Session) -> Result<SessionGrant, SessionError> {
        let mut attempt = 1;
        loop {
            match self.sessions.set_session(stored).await {
                Err(e) if e.is_transient() && attempt < self.policy.attempts => {
                    let backoff = self.policy.backoff(attempt);
                    warn!(
                        "restore attempt {} failed ({}), backing off for {:?}",
                        attempt, e, backoff
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn adopt_live_session(&self) -> anyhow::Result<Option<SessionGrant>> {
        debug!("no stored session, checking for a live one");

        let Some(session) = self
            .sessions
            .current_session()
            .await
            .context("reading live session")?
        else {
            return Ok(None);
        };

        let Some(user) = self
            .sessions
            .current_user()
            .await
            .context("reading live user")?
        else {
            return Ok(None);
        };

        self.store.save_session(&session).await;
        info!("live session adopted after biometric unlock");

        Ok(Some(SessionGrant { user, session }))
    }

    /// Forget everything tied to biometric unlock, including the Session
    /// Service's own live session.
    async fn reset(&self) {
        self.sessions.discard().await;
        self.store.clear_session().await;
        self.store.set_biometrics_enabled(false).await;
        self.store.clear_user_email().await;
    }

    /// Sign in with credentials and remember the session and email.
    ///
    /// # Errors
    /// Returns the Session Service failure unchanged; nothing is written.
    #[instrument(skip(self, password))]
    pub async fn sign_in_with_email(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<User, AuthError> {
        let grant = self.sessions.sign_in(email, password).await?;

        self.store.save_session(&grant.session).await;
        self.store.save_user_email(email).await;

        let user = grant.user.clone();
        let initializing = self.state.borrow().initializing;
        self.publish(Some(grant), initializing);

        info!(user_id = %user.id, "signed in");

        Ok(user)
    }

    /// Sign out. The biometrics flag is kept so the next launch is still gated.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) {
        if let Err(e) = self.sessions.sign_out().await {
            warn!("session service sign-out failed: {}", e);
        }

        self.store.clear_session().await;
        self.store.clear_user_email().await;

        let initializing = self.state.borrow().initializing;
        self.publish(None, initializing);

        info!("signed out");
    }

    /// Require biometrics from the next launch on.
    pub async fn enable_biometrics(&self) {
        self.store.set_biometrics_enabled(true).await;
        info!("biometrics enabled");
    }

    /// Adopt a session another flow has already validated.
    pub fn restore_session_state(&self, user: User, session: Session) {
        let initializing = self.state.borrow().initializing;
        self.publish(Some(SessionGrant { user, session }), initializing);
        debug!("session state restored");
    }
}
