pub mod global;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ArgAction, ColorChoice, Command,
};

pub const CMD_STATUS: &str = "status";
pub const CMD_LOGIN: &str = "login";
pub const CMD_LOGOUT: &str = "logout";
pub const CMD_BIOMETRICS: &str = "biometrics";
pub const CMD_CLOCK: &str = "clock";

fn login() -> Command {
    Command::new(CMD_LOGIN)
        .about("Sign in with email and password, or with biometrics")
        .arg(
            Arg::new("email")
                .long("email")
                .help("Account email (default: the last email used on this device)")
                .env("SHIFTCLOCK_EMAIL")
                .conflicts_with("biometric"),
        )
        .arg(
            Arg::new("password")
                .long("password")
                .help("Account password")
                .env("SHIFTCLOCK_PASSWORD")
                .hide_env_values(true)
                .required_unless_present("biometric")
                .conflicts_with("biometric"),
        )
        .arg(
            Arg::new("biometric")
                .long("biometric")
                .help("Sign in with biometrics")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("enable-biometrics")
                .long("enable-biometrics")
                .help("Enable biometric unlock after signing in without asking")
                .action(ArgAction::SetTrue)
                .conflicts_with("biometric"),
        )
}

fn clock() -> Command {
    Command::new(CMD_CLOCK)
        .about("Check in or out at the current location")
        .arg(
            Arg::new("type")
                .help("in or out")
                .required(true)
                .value_parser(clap::value_parser!(crate::attendance::ClockType)),
        )
        .arg(
            Arg::new("lat")
                .long("lat")
                .help("Latitude in decimal degrees")
                .env("SHIFTCLOCK_LAT")
                .required(true)
                .allow_negative_numbers(true)
                .value_parser(clap::value_parser!(f64)),
        )
        .arg(
            Arg::new("lng")
                .long("lng")
                .help("Longitude in decimal degrees")
                .env("SHIFTCLOCK_LNG")
                .required(true)
                .allow_negative_numbers(true)
                .value_parser(clap::value_parser!(f64)),
        )
        .arg(
            Arg::new("accuracy")
                .long("accuracy")
                .help("Horizontal accuracy in meters")
                .env("SHIFTCLOCK_ACCURACY")
                .value_parser(clap::value_parser!(f64)),
        )
}

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("shiftclock")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(Command::new(CMD_STATUS).about("Show auth state and today's hours"))
        .subcommand(login())
        .subcommand(Command::new(CMD_LOGOUT).about("Sign out of this device"))
        .subcommand(
            Command::new(CMD_BIOMETRICS)
                .about("Manage biometric unlock")
                .subcommand_required(true)
                .subcommand(
                    Command::new("enable").about("Require biometrics from the next launch on"),
                ),
        )
        .subcommand(clock());

    global::with_args(command)
}
