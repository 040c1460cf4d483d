use crate::auth::RestorePolicy;
use secrecy::SecretString;
use std::path::PathBuf;

/// How the biometric sensor is emulated on this device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SensorMode {
    /// Hardware present, biometrics enrolled, confirmed on the terminal.
    Terminal,
    /// Hardware present, nothing enrolled.
    NotEnrolled,
    /// No biometric hardware.
    Absent,
}

impl SensorMode {
    /// `(has_hardware, is_enrolled)`
    #[must_use]
    pub const fn capability(self) -> (bool, bool) {
        match self {
            Self::Terminal => (true, true),
            Self::NotEnrolled => (true, false),
            Self::Absent => (false, false),
        }
    }
}

/// Configuration shared by every command.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub api_url: String,
    pub api_key: SecretString,
    pub validator_function: String,
    pub store_path: PathBuf,
    pub restore_policy: RestorePolicy,
    pub device_label: String,
    pub sensor: SensorMode,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(api_url: String, api_key: SecretString, store_path: PathBuf) -> Self {
        Self {
            api_url,
            api_key,
            validator_function: String::from("norcal-edge"),
            store_path,
            restore_policy: RestorePolicy::default(),
            device_label: default_device_label(),
            sensor: SensorMode::Terminal,
        }
    }
}

#[must_use]
pub fn default_device_label() -> String {
    format!("{} {}", std::env::consts::OS, std::env::consts::ARCH)
}

/// `$HOME/.shiftclock/store.json`, or a file in the working directory.
#[must_use]
pub fn default_store_path() -> PathBuf {
    std::env::var_os("HOME").map_or_else(
        || PathBuf::from(".shiftclock-store.json"),
        |home| PathBuf::from(home).join(".shiftclock").join("store.json"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_global_args() {
        let args = GlobalArgs::new(
            "https://project.example.co".to_string(),
            SecretString::from("anon-key"),
            PathBuf::from("/tmp/store.json"),
        );
        assert_eq!(args.api_url, "https://project.example.co");
        assert_eq!(args.api_key.expose_secret(), "anon-key");
        assert_eq!(args.validator_function, "norcal-edge");
        assert_eq!(args.restore_policy, RestorePolicy::default());
        assert_eq!(args.sensor, SensorMode::Terminal);
        assert!(args.device_label.contains(std::env::consts::OS));
    }

    #[test]
    fn test_sensor_capability() {
        assert_eq!(SensorMode::Terminal.capability(), (true, true));
        assert_eq!(SensorMode::NotEnrolled.capability(), (true, false));
        assert_eq!(SensorMode::Absent.capability(), (false, false));
    }

    #[test]
    fn test_default_store_path() {
        temp_env::with_var("HOME", Some("/home/ana"), || {
            assert_eq!(
                default_store_path(),
                PathBuf::from("/home/ana/.shiftclock/store.json")
            );
        });
        temp_env::with_var_unset("HOME", || {
            assert_eq!(default_store_path(), PathBuf::from(".shiftclock-store.json"));
        });
    }
}
