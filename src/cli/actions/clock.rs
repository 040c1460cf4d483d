use crate::attendance::{success_alert, AttendanceDisplay, ClockFailure, ClockType, FixedLocation};
use crate::cli::globals::GlobalArgs;
use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub kind: ClockType,
    pub location: FixedLocation,
}

/// # Errors
/// Returns an error carrying the user-facing alert when the clock action fails.
pub async fn execute(args: Args) -> Result<()> {
    let app = super::launch(&args.globals).await?;

    // the Session Service may still hold a live session the launch refused
    let state = app.auth().state();
    let (Some(user), Some(session)) = (&state.user, &state.session) else {
        bail!("{}", ClockFailure::NotSignedIn.alert());
    };

    let flow = app.attendance(Arc::new(args.location));
    match app.history().last_event(session.access_token(), user.id).await {
        Ok(last) => flow.load(AttendanceDisplay::from_last_event(last)),
        Err(e) => warn!("unable to load last clock event: {}", e),
    }

    match flow.clock(args.kind).await {
        Ok(receipt) => {
            println!("{}", success_alert(args.kind, &receipt));
            let display = flow.display();
            println!(
                "Status: {}",
                if display.is_clocked_in {
                    "clocked in"
                } else {
                    "clocked out"
                }
            );
            Ok(())
        }
        Err(failure) => bail!("{}", failure.alert()),
    }
}
