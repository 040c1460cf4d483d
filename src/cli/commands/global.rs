//! Arguments shared by every subcommand: logging, service endpoints, the
//! secure store and the device profile.

use clap::{builder::PossibleValuesParser, Arg, Command};

pub const ARG_VERBOSITY: &str = "verbosity";
pub const ARG_API_URL: &str = "api-url";
pub const ARG_API_KEY: &str = "api-key";
pub const ARG_VALIDATOR_FUNCTION: &str = "validator-function";
pub const ARG_STORE_PATH: &str = "store-path";
pub const ARG_RESTORE_ATTEMPTS: &str = "restore-attempts";
pub const ARG_RESTORE_BACKOFF_MS: &str = "restore-backoff-ms";
pub const ARG_DEVICE_LABEL: &str = "device-label";
pub const ARG_SENSOR: &str = "sensor";

/// Accepts a level name or a number from 0 (error) to 5.
///
/// # Errors
/// Returns an error for anything else.
pub fn parse_log_level(level: &str) -> Result<u8, String> {
    match level.parse::<u8>() {
        Ok(parsed) if parsed <= 5 => return Ok(parsed),
        _ => {}
    }

    ["error", "warn", "info", "debug", "trace"]
        .iter()
        .position(|name| name.eq_ignore_ascii_case(level))
        .and_then(|index| u8::try_from(index).ok())
        .ok_or_else(|| format!("invalid log level '{level}'"))
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_VERBOSITY)
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("SHIFTCLOCK_LOG_LEVEL")
                .global(true)
                .action(clap::ArgAction::Count)
                .value_parser(parse_log_level),
        )
        .arg(
            Arg::new(ARG_API_URL)
                .long(ARG_API_URL)
                .help("Base URL of the backend (auth, functions and REST APIs)")
                .env("SHIFTCLOCK_API_URL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_API_KEY)
                .long(ARG_API_KEY)
                .help("Public API key sent with every request")
                .env("SHIFTCLOCK_API_KEY")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_VALIDATOR_FUNCTION)
                .long(ARG_VALIDATOR_FUNCTION)
                .help("Name of the attendance validator function")
                .env("SHIFTCLOCK_VALIDATOR_FUNCTION")
                .default_value("norcal-edge"),
        )
        .arg(
            Arg::new(ARG_STORE_PATH)
                .long(ARG_STORE_PATH)
                .help("Secure store file (default: $HOME/.shiftclock/store.json)")
                .env("SHIFTCLOCK_STORE_PATH"),
        )
        .arg(
            Arg::new(ARG_RESTORE_ATTEMPTS)
                .long(ARG_RESTORE_ATTEMPTS)
                .help("Attempts to restore a stored session while the service is unreachable")
                .env("SHIFTCLOCK_RESTORE_ATTEMPTS")
                .default_value("3")
                .value_parser(clap::value_parser!(u32).range(1..=10)),
        )
        .arg(
            Arg::new(ARG_RESTORE_BACKOFF_MS)
                .long(ARG_RESTORE_BACKOFF_MS)
                .help("Base backoff between restore attempts, in milliseconds")
                .env("SHIFTCLOCK_RESTORE_BACKOFF_MS")
                .default_value("1000")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_DEVICE_LABEL)
                .long(ARG_DEVICE_LABEL)
                .help("Device label recorded with clock events (default: OS and architecture)")
                .env("SHIFTCLOCK_DEVICE_LABEL"),
        )
        .arg(
            Arg::new(ARG_SENSOR)
                .long(ARG_SENSOR)
                .help("Biometric sensor emulation")
                .env("SHIFTCLOCK_SENSOR")
                .default_value("terminal")
                .value_parser(PossibleValuesParser::new(["terminal", "not-enrolled", "absent"])),
        )
}
