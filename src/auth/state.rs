//! Observable auth state. Only the orchestrator holds the sender; everyone
//! else gets an [`AuthView`].

use crate::session::{Session, User};
use tokio::sync::watch;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthPhase {
    Initializing,
    Authenticated,
    Unauthenticated,
}

/// Snapshot of `{user, session, initializing}`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthState {
    pub user: Option<User>,
    pub session: Option<Session>,
    pub initializing: bool,
}

impl AuthState {
    pub(crate) const fn starting() -> Self {
        Self {
            user: None,
            session: None,
            initializing: true,
        }
    }

    #[must_use]
    pub const fn phase(&self) -> AuthPhase {
        if self.initializing {
            AuthPhase::Initializing
        } else if self.user.is_some() && self.session.is_some() {
            AuthPhase::Authenticated
        } else {
            AuthPhase::Unauthenticated
        }
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self.phase(), AuthPhase::Authenticated)
    }
}

/// Read-only handle on the auth state.
#[derive(Clone, Debug)]
pub struct AuthView {
    rx: watch::Receiver<AuthState>,
}

impl AuthView {
    pub(crate) const fn new(rx: watch::Receiver<AuthState>) -> Self {
        Self { rx }
    }

    #[must_use]
    pub fn current(&self) -> AuthState {
        self.rx.borrow().clone()
    }

    #[must_use]
    pub fn phase(&self) -> AuthPhase {
        self.rx.borrow().phase()
    }

    /// Wait until launch has finished and return the settled state.
    pub async fn settled(&mut self) -> AuthState {
        let settled = self
            .rx
            .wait_for(|state| !state.initializing)
            .await
            .map(|state| state.clone());

        // sender dropped: report whatever was last published
        settled.unwrap_or_else(|_| self.rx.borrow().clone())
    }

    /// Wait for the next state change.
    ///
    /// # Errors
    /// Returns an error once the orchestrator is gone.
    pub async fn changed(&mut self) -> Result<AuthState, watch::error::RecvError> {
        self.rx.changed().await?;
        Ok(self.rx.borrow_and_update().clone())
    }
}
