pub mod biometrics;
pub mod clock;
pub mod login;
pub mod logout;
pub mod status;

// Single dispatch point from `Action` to the per-command executors.
mod run;

use crate::app::App;
use crate::auth::AuthPhase;
use crate::cli::globals::GlobalArgs;
use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};

#[derive(Debug)]
pub enum Action {
    Status(GlobalArgs),
    Login(login::Args),
    Logout(GlobalArgs),
    EnableBiometrics(GlobalArgs),
    Clock(clock::Args),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> Result<()> {
        run::execute(self).await
    }
}

/// Every command is one app launch: wire the adapters and decide the auth
/// phase before doing anything else.
async fn launch(globals: &GlobalArgs) -> Result<App> {
    let app = App::new(globals)?;
    let phase = app.launch().await?;

    match phase {
        AuthPhase::Authenticated => {
            let state = app.auth().state();
            let email = state
                .user
                .as_ref()
                .and_then(|user| user.email.as_deref())
                .unwrap_or("unknown user");
            println!("Signed in as {email}");
        }
        AuthPhase::Unauthenticated | AuthPhase::Initializing => println!("Not signed in"),
    }

    Ok(app)
}

/// Ask a yes/no question on the terminal. Anything but y/yes is a no.
async fn confirm(question: &str) -> Result<bool> {
    let question = question.to_string();
    let answer = tokio::task::spawn_blocking(move || -> io::Result<String> {
        let mut stdout = io::stdout();
        write!(stdout, "{question} [y/N]: ")?;
        stdout.flush()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line)
    })
    .await
    .context("terminal prompt task failed")??;

    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
