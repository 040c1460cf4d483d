//! # Shiftclock (biometric-gated attendance client)
//!
//! `shiftclock` is the device side of a clock-in/clock-out system for shift
//! workers. It owns the authentication lifecycle of a device and the
//! per-event attendance flow; everything remote is reached through traits.
//!
//! ## Launch
//!
//! [`auth::AuthOrchestrator::initialize`] runs once per process. When the
//! biometrics flag is off it silently restores whatever session the Session
//! Service still holds. When the flag is on, a biometric challenge is
//! mandatory: an unusable sensor, a failed challenge or a rejected stored
//! session wipes the stored session, the flag and the remembered email, so
//! the worker has to sign in with credentials again.
//!
//! ## Persistence
//!
//! Only the token pair, the biometrics flag and the last sign-in email are
//! written to the [`store::SecureStore`]. Users are always re-derived from
//! the session through the Session Service. Sign-out clears the tokens and
//! the email but keeps the flag, so the next launch is still gated.
//!
//! ## Clock events
//!
//! Every clock-in and clock-out runs its own biometric challenge, independent
//! of how the session was restored, before the location and access token are
//! sent to the remote attendance validator. The geofence itself is checked
//! server-side.

pub mod app;
pub mod attendance;
pub mod auth;
pub mod biometric;
pub mod cli;
pub mod session;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
