use crate::attendance::{format_elapsed, AttendanceDisplay, DailySummary};
use crate::cli::globals::GlobalArgs;
use anyhow::Result;
use chrono::{Local, Utc};
use tracing::warn;

/// Print auth state, login options and today's worked hours.
///
/// # Errors
/// Returns an error if the app can't be launched.
pub async fn execute(globals: GlobalArgs) -> Result<()> {
    let app = super::launch(&globals).await?;

    let options = app.login().options().await;
    println!(
        "Biometric sign-in: {}",
        if options.show_biometric_sign_in {
            "enabled"
        } else if options.can_offer_biometrics {
            "available"
        } else {
            "unavailable"
        }
    );
    if let Some(email) = &options.stored_email {
        println!("Remembered email: {email}");
    }

    let state = app.auth().state();
    let (Some(user), Some(session)) = (&state.user, &state.session) else {
        return Ok(());
    };

    let history = app.history();
    let token = session.access_token();

    let display = match history.last_event(token, user.id).await {
        Ok(last) => AttendanceDisplay::from_last_event(last),
        Err(e) => {
            warn!("unable to load last clock event: {}", e);
            println!("Clock history unavailable");
            return Ok(());
        }
    };

    println!(
        "Status: {}{}",
        if display.is_clocked_in {
            "clocked in"
        } else {
            "clocked out"
        },
        display
            .site_name
            .as_deref()
            .map(|site| format!(" ({site})"))
            .unwrap_or_default()
    );

    match history.events_on(token, user.id, Local::now()).await {
        Ok(events) => {
            let summary = DailySummary::from_events(&events);
            println!("Worked today: {:.2} h", summary.total_hours());
            if summary.open_since.is_some() {
                println!(
                    "Current shift: {}",
                    format_elapsed(summary.open_shift(Utc::now()))
                );
            }
        }
        Err(e) => warn!("unable to load today's events: {}", e),
    }

    Ok(())
}
