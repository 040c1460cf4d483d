use crate::cli::globals::GlobalArgs;
use anyhow::{bail, Result};

/// Enable biometric unlock for the next launches.
///
/// # Errors
/// Returns an error if nobody is signed in or the device can't do biometrics.
pub async fn execute(globals: GlobalArgs) -> Result<()> {
    let app = super::launch(&globals).await?;

    if !app.auth().state().is_authenticated() {
        bail!("Sign in before enabling biometrics");
    }

    let options = app.login().options().await;
    if options.show_biometric_sign_in {
        println!("Biometric unlock is already enabled");
        return Ok(());
    }
    if !options.can_offer_biometrics {
        bail!("Biometrics are not available on this device");
    }

    app.auth().enable_biometrics().await;
    println!("Biometric unlock enabled");

    Ok(())
}
