use crate::cli::actions::{biometrics, clock, login, logout, status, Action};
use anyhow::Result;

/// Execute the provided action.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Status(globals) => status::execute(globals).await,
        Action::Login(args) => login::execute(args).await,
        Action::Logout(globals) => logout::execute(globals).await,
        Action::EnableBiometrics(globals) => biometrics::execute(globals).await,
        Action::Clock(args) => clock::execute(args).await,
    }
}
