//! Biometric gate over the platform sensor.
//!
//! The gate never retries and never falls back to the device passcode: one
//! challenge, one boolean. Sensor errors, failures and cancellations all read
//! as `false`.

pub mod terminal;

pub use terminal::TerminalSensor;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, instrument};

#[derive(Debug, Error)]
pub enum BiometricError {
    #[error("biometric prompt failed: {0}")]
    Prompt(String),
}

/// Outcome reported by the platform prompt.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthenticationResult {
    pub success: bool,
    pub error: Option<String>,
    pub warning: Option<String>,
}

impl AuthenticationResult {
    #[must_use]
    pub fn success() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            warning: None,
        }
    }
}

/// Platform biometric sensor.
#[async_trait]
pub trait BiometricSensor: Send + Sync {
    async fn has_hardware(&self) -> Result<bool, BiometricError>;

    async fn is_enrolled(&self) -> Result<bool, BiometricError>;

    async fn authenticate(
        &self,
        prompt: &str,
        disable_device_fallback: bool,
    ) -> Result<AuthenticationResult, BiometricError>;
}

#[derive(Clone)]
pub struct BiometricGate {
    sensor: Arc<dyn BiometricSensor>,
}

impl BiometricGate {
    #[must_use]
    pub fn new(sensor: Arc<dyn BiometricSensor>) -> Self {
        Self { sensor }
    }

    /// Hardware present and at least one biometric enrolled.
    #[instrument(skip(self))]
    pub async fn capability(&self) -> bool {
        let has_hardware = match self.sensor.has_hardware().await {
            Ok(present) => present,
            Err(e) => {
                error!("biometric hardware query failed: {}", e);
                false
            }
        };

        if !has_hardware {
            debug!("no biometric hardware");
            return false;
        }

        match self.sensor.is_enrolled().await {
            Ok(enrolled) => enrolled,
            Err(e) => {
                error!("biometric enrollment query failed: {}", e);
                false
            }
        }
    }

    /// Issue exactly one biometric prompt with passcode fallback disabled.
    #[instrument(skip(self))]
    pub async fn challenge(&self, reason: &str) -> bool {
        match self.sensor.authenticate(reason, true).await {
            Ok(result) => {
                if !result.success {
                    info!(
                        error = result.error.as_deref().unwrap_or_default(),
                        warning = result.warning.as_deref().unwrap_or_default(),
                        "biometric challenge failed"
                    );
                }
                result.success
            }
            Err(e) => {
                error!("biometric challenge error: {}", e);
                false
            }
        }
    }
}
