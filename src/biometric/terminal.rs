use super::{AuthenticationResult, BiometricError, BiometricSensor};
use async_trait::async_trait;
use std::io::{self, BufRead, Write};
use tracing::debug;

/// Sensor stand-in for the command-line harness: the "biometric" is a
/// confirmation typed on the controlling terminal.
#[derive(Clone, Copy, Debug)]
pub struct TerminalSensor {
    hardware: bool,
    enrolled: bool,
}

impl TerminalSensor {
    #[must_use]
    pub const fn new(hardware: bool, enrolled: bool) -> Self {
        Self { hardware, enrolled }
    }
}

fn is_confirmation(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

#[async_trait]
impl BiometricSensor for TerminalSensor {
    async fn has_hardware(&self) -> Result<bool, BiometricError> {
        Ok(self.hardware)
    }

    async fn is_enrolled(&self) -> Result<bool, BiometricError> {
        Ok(self.enrolled)
    }

    async fn authenticate(
        &self,
        prompt: &str,
        disable_device_fallback: bool,
    ) -> Result<AuthenticationResult, BiometricError> {
        if !(self.hardware && self.enrolled) {
            return Ok(AuthenticationResult::failure("not_available"));
        }

        debug!(disable_device_fallback, "terminal biometric prompt");

        let prompt = prompt.to_string();
        let answer = tokio::task::spawn_blocking(move || -> io::Result<String> {
            let mut stdout = io::stdout();
            write!(stdout, "{prompt} [y/N]: ")?;
            stdout.flush()?;

            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            Ok(line)
        })
        .await
        .map_err(|e| BiometricError::Prompt(e.to_string()))?
        .map_err(|e| BiometricError::Prompt(e.to_string()))?;

        if is_confirmation(&answer) {
            Ok(AuthenticationResult::success())
        } else {
            Ok(AuthenticationResult::failure("user_cancel"))
        }
    }
}
