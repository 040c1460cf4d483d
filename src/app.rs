//! Wires the concrete adapters into the flows for one process.

use crate::attendance::{AttendanceFlow, HistoryClient, LocationProvider, ValidatorClient};
use crate::auth::{AuthOrchestrator, AuthPhase, LoginFlow};
use crate::biometric::{BiometricGate, TerminalSensor};
use crate::cli::globals::GlobalArgs;
use crate::session::AuthClient;
use crate::store::{CredentialStore, FileStore, SecureStore};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::debug;

pub struct App {
    auth: Arc<AuthOrchestrator>,
    sessions: Arc<AuthClient>,
    gate: BiometricGate,
    validator: Arc<ValidatorClient>,
    history: HistoryClient,
    device_label: String,
}

impl App {
    /// Build every adapter from the configuration. Nothing is contacted yet.
    ///
    /// # Errors
    /// Returns an error if a service URL is invalid or an HTTP client can't
    /// be built.
    pub fn new(globals: &GlobalArgs) -> Result<Self> {
        let backend: Arc<dyn SecureStore> = Arc::new(FileStore::new(&globals.store_path));

        let sessions = Arc::new(
            AuthClient::new(&globals.api_url, globals.api_key.clone())
                .context("invalid session service URL")?
                .with_storage(backend.clone()),
        );

        let (hardware, enrolled) = globals.sensor.capability();
        let gate = BiometricGate::new(Arc::new(TerminalSensor::new(hardware, enrolled)));

        let auth = Arc::new(AuthOrchestrator::new(
            CredentialStore::new(backend),
            gate.clone(),
            sessions.clone(),
            globals.restore_policy,
        ));

        let validator = Arc::new(
            ValidatorClient::new(
                &globals.api_url,
                &globals.validator_function,
                globals.api_key.clone(),
            )
            .context("invalid validator URL")?,
        );

        let history = HistoryClient::new(&globals.api_url, globals.api_key.clone())
            .context("invalid clock history URL")?;

        debug!(store = %globals.store_path.display(), "app wired");

        Ok(Self {
            auth,
            sessions,
            gate,
            validator,
            history,
            device_label: globals.device_label.clone(),
        })
    }

    /// App launch: reload the Session Service's own state, then decide the
    /// auth phase.
    ///
    /// # Errors
    /// Returns an error if the app was already launched.
    pub async fn launch(&self) -> Result<AuthPhase> {
        self.sessions.hydrate().await;
        Ok(self.auth.initialize().await?)
    }

    #[must_use]
    pub fn auth(&self) -> &Arc<AuthOrchestrator> {
        &self.auth
    }

    #[must_use]
    pub fn login(&self) -> LoginFlow {
        LoginFlow::new(self.auth.clone())
    }

    #[must_use]
    pub fn attendance(&self, location: Arc<dyn LocationProvider>) -> AttendanceFlow {
        AttendanceFlow::new(
            self.gate.clone(),
            location,
            self.sessions.clone(),
            self.validator.clone(),
            self.device_label.clone(),
        )
    }

    #[must_use]
    pub const fn history(&self) -> &HistoryClient {
        &self.history
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cli::globals::SensorMode;
    use secrecy::SecretString;

    fn globals(dir: &std::path::Path) -> GlobalArgs {
        let mut globals = GlobalArgs::new(
            "http://127.0.0.1:9".to_string(),
            SecretString::from("anon-key"),
            dir.join("store.json"),
        );
        globals.sensor = SensorMode::Absent;
        globals
    }

    #[tokio::test]
    async fn test_fresh_install_launches_unauthenticated() {
        let dir = std::env::temp_dir().join(format!("shiftclock-app-{}", uuid::Uuid::new_v4()));
        let app = App::new(&globals(&dir)).unwrap();

        assert_eq!(app.launch().await.unwrap(), AuthPhase::Unauthenticated);
        assert!(app.launch().await.is_err());

        let options = app.login().options().await;
        assert!(!options.show_biometric_sign_in);
        assert!(!options.can_offer_biometrics);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let mut globals = globals(&std::env::temp_dir());
        globals.api_url = "not a url".to_string();
        assert!(App::new(&globals).is_err());
    }
}
