//! Maps validated CLI matches to an [`Action`] carrying its full configuration.

use crate::attendance::{ClockType, FixedLocation};
use crate::auth::RestorePolicy;
use crate::cli::actions::{clock, login, Action};
use crate::cli::commands::{global, CMD_BIOMETRICS, CMD_CLOCK, CMD_LOGIN, CMD_LOGOUT, CMD_STATUS};
use crate::cli::globals::{default_device_label, default_store_path, GlobalArgs, SensorMode};
use anyhow::{anyhow, Context, Result};
use secrecy::SecretString;
use std::path::PathBuf;
use std::time::Duration;

fn globals(matches: &clap::ArgMatches) -> Result<GlobalArgs> {
    let api_url = matches
        .get_one::<String>(global::ARG_API_URL)
        .cloned()
        .context("missing required argument: --api-url")?;
    url::Url::parse(&api_url).context("invalid SHIFTCLOCK_API_URL")?;

    let api_key = matches
        .get_one::<String>(global::ARG_API_KEY)
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --api-key")?;

    let store_path = matches
        .get_one::<String>(global::ARG_STORE_PATH)
        .map_or_else(default_store_path, PathBuf::from);

    let mut args = GlobalArgs::new(api_url, api_key, store_path);

    if let Some(function) = matches.get_one::<String>(global::ARG_VALIDATOR_FUNCTION) {
        args.validator_function.clone_from(function);
    }

    args.restore_policy = RestorePolicy {
        attempts: matches
            .get_one::<u32>(global::ARG_RESTORE_ATTEMPTS)
            .copied()
            .unwrap_or(3),
        base_backoff: Duration::from_millis(
            matches
                .get_one::<u64>(global::ARG_RESTORE_BACKOFF_MS)
                .copied()
                .unwrap_or(1000),
        ),
    };

    args.device_label = matches
        .get_one::<String>(global::ARG_DEVICE_LABEL)
        .filter(|label| !label.trim().is_empty())
        .cloned()
        .unwrap_or_else(default_device_label);

    args.sensor = match matches
        .get_one::<String>(global::ARG_SENSOR)
        .map(String::as_str)
    {
        None | Some("terminal") => SensorMode::Terminal,
        Some("not-enrolled") => SensorMode::NotEnrolled,
        Some("absent") => SensorMode::Absent,
        Some(other) => return Err(anyhow!("invalid sensor mode: {other}")),
    };

    Ok(args)
}

/// Map validated CLI matches to an action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let globals = globals(matches)?;

    match matches.subcommand() {
        Some((CMD_STATUS, _)) => Ok(Action::Status(globals)),
        Some((CMD_LOGOUT, _)) => Ok(Action::Logout(globals)),
        Some((CMD_BIOMETRICS, sub_m)) => match sub_m.subcommand_name() {
            Some("enable") => Ok(Action::EnableBiometrics(globals)),
            _ => Err(anyhow!("missing biometrics subcommand")),
        },
        Some((CMD_LOGIN, sub_m)) => {
            let method = if sub_m.get_flag("biometric") {
                login::Method::Biometric
            } else {
                let password = sub_m
                    .get_one::<String>("password")
                    .cloned()
                    .map(SecretString::from)
                    .context("missing required argument: --password")?;
                login::Method::Password {
                    email: sub_m.get_one::<String>("email").cloned(),
                    password,
                }
            };

            Ok(Action::Login(login::Args {
                globals,
                method,
                enable_biometrics: sub_m.get_flag("enable-biometrics"),
            }))
        }
        Some((CMD_CLOCK, sub_m)) => {
            let kind = sub_m
                .get_one::<ClockType>("type")
                .copied()
                .context("missing clock type")?;
            let lat = sub_m
                .get_one::<f64>("lat")
                .copied()
                .context("missing required argument: --lat")?;
            let lng = sub_m
                .get_one::<f64>("lng")
                .copied()
                .context("missing required argument: --lng")?;
            let accuracy = sub_m.get_one::<f64>("accuracy").copied();

            Ok(Action::Clock(clock::Args {
                globals,
                kind,
                location: FixedLocation::new(lat, lng, accuracy)?,
            }))
        }
        _ => Err(anyhow!("missing subcommand")),
    }
}
