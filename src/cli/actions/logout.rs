use crate::cli::globals::GlobalArgs;
use anyhow::Result;

/// # Errors
/// Returns an error if the app can't be launched.
pub async fn execute(globals: GlobalArgs) -> Result<()> {
    let app = super::launch(&globals).await?;

    app.auth().sign_out().await;
    println!("Signed out");

    Ok(())
}
