//! In-memory fakes of the external collaborators, shared by unit tests.

use crate::biometric::{AuthenticationResult, BiometricError, BiometricSensor};
use crate::session::{Session, SessionError, SessionGrant, SessionService, User};
use async_trait::async_trait;
use secrecy::SecretString;
use std::collections::VecDeque;
use std::sync::Mutex;
use uuid::Uuid;

pub fn grant(email: &str, access: &str, refresh: &str) -> SessionGrant {
    SessionGrant {
        user: User {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
        },
        session: Session::new(access, refresh),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Scripted Session Service. Unscripted sign-ins fail with invalid
/// credentials and unscripted restores are rejected.
#[derive(Default)]
pub struct FakeSessions {
    live: Mutex<Option<SessionGrant>>,
    sign_ins: Mutex<VecDeque<Result<SessionGrant, SessionError>>>,
    restores: Mutex<VecDeque<Result<SessionGrant, SessionError>>>,
    calls: Mutex<Vec<&'static str>>,
}

impl FakeSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_live(grant: SessionGrant) -> Self {
        let fake = Self::default();
        *lock(&fake.live) = Some(grant);
        fake
    }

    pub fn push_sign_in(&self, result: Result<SessionGrant, SessionError>) {
        lock(&self.sign_ins).push_back(result);
    }

    pub fn push_restore(&self, result: Result<SessionGrant, SessionError>) {
        lock(&self.restores).push_back(result);
    }

    pub fn live(&self) -> Option<SessionGrant> {
        lock(&self.live).clone()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        lock(&self.calls).clone()
    }

    fn record(&self, call: &'static str) {
        lock(&self.calls).push(call);
    }
}

#[async_trait]
impl SessionService for FakeSessions {
    async fn sign_in(
        &self,
        _email: &str,
        _password: &SecretString,
    ) -> Result<SessionGrant, SessionError> {
        self.record("sign_in");
        let result = lock(&self.sign_ins).pop_front().unwrap_or_else(|| {
            Err(SessionError::InvalidCredentials(
                "Invalid login credentials".to_string(),
            ))
        });
        if let Ok(grant) = &result {
            *lock(&self.live) = Some(grant.clone());
        }
        result
    }

    async fn sign_out(&self) -> Result<(), SessionError> {
        self.record("sign_out");
        *lock(&self.live) = None;
        Ok(())
    }

    async fn discard(&self) {
        self.record("discard");
        *lock(&self.live) = None;
    }

    async fn current_user(&self) -> Result<Option<User>, SessionError> {
        self.record("current_user");
        Ok(lock(&self.live).as_ref().map(|grant| grant.user.clone()))
    }

    async fn current_session(&self) -> Result<Option<Session>, SessionError> {
        self.record("current_session");
        Ok(lock(&self.live).as_ref().map(|grant| grant.session.clone()))
    }

    async fn set_session(&self, _session: &Session) -> Result<SessionGrant, SessionError> {
        self.record("set_session");
        let result = lock(&self.restores)
            .pop_front()
            .unwrap_or_else(|| Err(SessionError::Rejected("invalid JWT".to_string())));
        if let Ok(grant) = &result {
            *lock(&self.live) = Some(grant.clone());
        }
        result
    }
}

/// Sensor answering challenges from a queue; an empty queue fails.
pub struct FakeSensor {
    hardware: bool,
    enrolled: bool,
    answers: Mutex<VecDeque<bool>>,
    prompts: Mutex<Vec<String>>,
}

impl FakeSensor {
    pub fn new(hardware: bool, enrolled: bool) -> Self {
        Self {
            hardware,
            enrolled,
            answers: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Capable sensor that answers `answers` in order.
    pub fn answering(answers: &[bool]) -> Self {
        let sensor = Self::new(true, true);
        lock(&sensor.answers).extend(answers.iter().copied());
        sensor
    }

    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }
}

#[async_trait]
impl BiometricSensor for FakeSensor {
    async fn has_hardware(&self) -> Result<bool, BiometricError> {
        Ok(self.hardware)
    }

    async fn is_enrolled(&self) -> Result<bool, BiometricError> {
        Ok(self.enrolled)
    }

    async fn authenticate(
        &self,
        prompt: &str,
        _disable_device_fallback: bool,
    ) -> Result<AuthenticationResult, BiometricError> {
        lock(&self.prompts).push(prompt.to_string());
        if lock(&self.answers).pop_front().unwrap_or(false) {
            Ok(AuthenticationResult::success())
        } else {
            Ok(AuthenticationResult::failure("user_cancel"))
        }
    }
}
