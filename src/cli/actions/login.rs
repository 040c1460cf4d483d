use crate::auth::{AuthError, BiometricLogin};
use crate::cli::globals::GlobalArgs;
use anyhow::{bail, Result};
use secrecy::SecretString;
use tracing::debug;

pub const ENABLE_BIOMETRICS_PROMPT: &str =
    "Would you like to use Face ID for faster login next time?";

pub const BIOMETRIC_FAILED: &str = "Face ID authentication failed. Device passcode is not allowed for security. Please sign in with email and password instead.";

#[derive(Debug)]
pub enum Method {
    /// Without an email the last one used on this device is taken.
    Password {
        email: Option<String>,
        password: SecretString,
    },
    Biometric,
}

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub method: Method,
    pub enable_biometrics: bool,
}

/// # Errors
/// Returns an error if signing in fails.
pub async fn execute(args: Args) -> Result<()> {
    let app = super::launch(&args.globals).await?;

    if app.auth().state().is_authenticated() {
        println!("Already signed in, sign out first to switch accounts");
        return Ok(());
    }

    let login = app.login();
    let options = login.options().await;

    match args.method {
        Method::Biometric => {
            if !options.show_biometric_sign_in {
                bail!("Biometric sign-in is not enabled on this device");
            }

            match login.biometric_sign_in().await {
                BiometricLogin::Restored(user) => {
                    println!(
                        "Signed in as {}",
                        user.email.as_deref().unwrap_or("unknown user")
                    );
                }
                BiometricLogin::PasswordOnly { email } => {
                    bail!("Session expired, sign in again with the password for {email}")
                }
                BiometricLogin::CredentialsRequired => {
                    bail!("Session expired, sign in again with email and password")
                }
                BiometricLogin::Denied => bail!(BIOMETRIC_FAILED),
            }
        }
        Method::Password { email, password } => {
            let result = match email.as_deref() {
                Some(email) => login.sign_in(email, &password).await,
                None => login.password_only_sign_in(&password).await,
            };

            let user = match result {
                Ok(user) => user,
                Err(AuthError::MissingEmail) => {
                    bail!("No email remembered on this device, pass --email")
                }
                Err(e) => bail!("Sign in failed: {e}"),
            };

            println!(
                "Signed in as {}",
                user.email.as_deref().unwrap_or("unknown user")
            );

            if options.can_offer_biometrics {
                let accepted =
                    args.enable_biometrics || super::confirm(ENABLE_BIOMETRICS_PROMPT).await?;
                debug!(accepted, "biometric enrollment offer");
                if accepted {
                    app.auth().enable_biometrics().await;
                    println!("Biometric unlock enabled");
                }
            }
        }
    }

    Ok(())
}
