//! Clock-in / clock-out.
//!
//! Every action is gated by its own biometric challenge, whatever happened
//! at launch. After the challenge the flow takes a location fix, reads the
//! live access token from the Session Service and submits the event to the
//! remote validator, which owns the geofence. Only an accepted event changes
//! the local [`AttendanceDisplay`].

pub mod history;
pub mod location;
pub mod summary;
pub mod validator;

pub use history::{ClockEvent, HistoryClient, HistoryError};
pub use location::{FixedLocation, Location, LocationError, LocationProvider};
pub use summary::{format_elapsed, DailySummary};
pub use validator::ValidatorClient;

use crate::biometric::BiometricGate;
use crate::session::SessionService;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

pub const OUT_OF_RANGE: &str = "OUT_OF_RANGE";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ClockType {
    In,
    Out,
}

impl ClockType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::In => "IN",
            Self::Out => "OUT",
        }
    }

    /// "In" / "Out", as used in prompts and messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::In => "In",
            Self::Out => "Out",
        }
    }

    #[must_use]
    pub fn challenge_reason(self) -> String {
        format!("Authenticate to Check {}", self.as_str())
    }
}

impl fmt::Display for ClockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClockType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "IN" => Ok(Self::In),
            "OUT" => Ok(Self::Out),
            _ => Err(format!("invalid clock type '{s}', expected 'in' or 'out'")),
        }
    }
}

/// Body submitted to the validator.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockRequest {
    #[serde(rename = "type")]
    pub kind: ClockType,
    pub lat: f64,
    pub lng: f64,
    pub accuracy: Option<f64>,
    pub device_label: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClockReceipt {
    pub event_id: String,
    pub site_name: String,
    pub site_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClockVerdict {
    Accepted(ClockReceipt),
    Refused {
        error_code: Option<String>,
        message: Option<String>,
    },
}

#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    #[error("validator returned {status}")]
    Status { status: u16, message: Option<String> },
    #[error("invalid validator response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait AttendanceValidator: Send + Sync {
    async fn submit(
        &self,
        request: &ClockRequest,
        access_token: &SecretString,
    ) -> Result<ClockVerdict, ValidatorError>;
}

/// User-facing title and message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub message: String,
}

impl Alert {
    fn new(title: &str, message: impl Into<String>) -> Self {
        Self {
            title: title.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.message)
    }
}

/// Why a clock action stopped. No failure changes the display state.
#[derive(Debug, Error)]
pub enum ClockFailure {
    #[error("biometric challenge failed")]
    BiometricRequired,
    #[error("location permission denied")]
    LocationDenied,
    #[error("location request timed out")]
    LocationTimeout,
    #[error("location unavailable: {0}")]
    Location(String),
    #[error("could not read current session: {0}")]
    SessionUnavailable(String),
    #[error("no signed-in session")]
    NotSignedIn,
    #[error("clock {kind} refused: {}", .message.as_deref().unwrap_or("no message"))]
    Refused {
        kind: ClockType,
        error_code: Option<String>,
        message: Option<String>,
    },
    #[error("validator unreachable: {0}")]
    Network(String),
}

impl From<LocationError> for ClockFailure {
    fn from(err: LocationError) -> Self {
        match err {
            LocationError::PermissionDenied => Self::LocationDenied,
            LocationError::Timeout => Self::LocationTimeout,
            LocationError::Unavailable(reason) => Self::Location(reason),
        }
    }
}

impl ClockFailure {
    fn from_validator(kind: ClockType, err: ValidatorError) -> Self {
        match err {
            ValidatorError::Transport(e) => Self::Network(e.to_string()),
            ValidatorError::Status { message, .. } => Self::Refused {
                kind,
                error_code: None,
                message,
            },
            ValidatorError::InvalidResponse(reason) => {
                warn!("unusable validator response: {}", reason);
                Self::Refused {
                    kind,
                    error_code: None,
                    message: None,
                }
            }
        }
    }

    #[must_use]
    pub fn alert(&self) -> Alert {
        match self {
            Self::BiometricRequired => Alert::new(
                "Face ID Required",
                "Face ID authentication is required to check in or out. Device passcode is not allowed for security. Please try again.",
            ),
            Self::LocationDenied => Alert::new(
                "Permission Denied",
                "Location permission is required for clocking",
            ),
            Self::LocationTimeout => Alert::new(
                "Location Timeout",
                "Unable to get your location quickly enough. Please ensure you have a clear view of the sky and try again.",
            ),
            Self::Location(reason) => Alert::new("Error", reason.as_str()),
            Self::SessionUnavailable(_) => Alert::new("Auth Error", "Could not get current session."),
            Self::NotSignedIn => Alert::new("Auth Error", "You must be logged in to clock in/out."),
            Self::Refused {
                kind,
                error_code,
                message,
            } => {
                let message = if error_code.as_deref() == Some(OUT_OF_RANGE) {
                    format!("Please move closer to the facility to Check {}.", kind.label())
                } else {
                    message.clone().filter(|m| !m.is_empty()).unwrap_or_else(|| {
                        format!(
                            "You need to be closer to the facility to Check {}.",
                            kind.label()
                        )
                    })
                };
                Alert::new("Clock Failed", message)
            }
            Self::Network(_) => Alert::new(
                "Network Error",
                "Unable to connect to the server. Please check your internet connection and try again.",
            ),
        }
    }
}

/// Confirmation shown after an accepted event.
#[must_use]
pub fn success_alert(kind: ClockType, receipt: &ClockReceipt) -> Alert {
    Alert::new(
        "Success",
        format!(
            "Checked {} at {}",
            kind.as_str().to_lowercase(),
            receipt.site_name
        ),
    )
}

/// What the clock screen shows. Changes only on accepted events.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttendanceDisplay {
    pub is_clocked_in: bool,
    pub last_event: Option<ClockEvent>,
    pub site_name: Option<String>,
}

impl AttendanceDisplay {
    /// Display for the most recent recorded event.
    #[must_use]
    pub fn from_last_event(event: Option<ClockEvent>) -> Self {
        match event {
            Some(event) => Self {
                is_clocked_in: event.kind == ClockType::In,
                site_name: event.site_name.clone(),
                last_event: Some(event),
            },
            None => Self::default(),
        }
    }
}

pub struct AttendanceFlow {
    gate: BiometricGate,
    location: Arc<dyn LocationProvider>,
    sessions: Arc<dyn SessionService>,
    validator: Arc<dyn AttendanceValidator>,
    device_label: String,
    display: watch::Sender<AttendanceDisplay>,
}

impl AttendanceFlow {
    #[must_use]
    pub fn new(
        gate: BiometricGate,
        location: Arc<dyn LocationProvider>,
        sessions: Arc<dyn SessionService>,
        validator: Arc<dyn AttendanceValidator>,
        device_label: impl Into<String>,
    ) -> Self {
        let (display, _) = watch::channel(AttendanceDisplay::default());

        Self {
            gate,
            location,
            sessions,
            validator,
            device_label: device_label.into(),
            display,
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AttendanceDisplay> {
        self.display.subscribe()
    }

    #[must_use]
    pub fn display(&self) -> AttendanceDisplay {
        self.display.borrow().clone()
    }

    /// Seed the display from recorded history.
    pub fn load(&self, display: AttendanceDisplay) {
        self.display.send_replace(display);
    }

    /// Run one clock action end to end.
    ///
    /// # Errors
    /// Returns the [`ClockFailure`] of the first step that failed; its
    /// [`ClockFailure::alert`] is what the user should see.
    #[instrument(skip(self))]
    pub async fn clock(&self, kind: ClockType) -> Result<ClockReceipt, ClockFailure> {
        if !self.gate.challenge(&kind.challenge_reason()).await {
            info!("clock {} aborted, biometric challenge failed", kind);
            return Err(ClockFailure::BiometricRequired);
        }

        let location = self.location.current_location().await.map_err(|e| {
            warn!("location fix failed: {}", e);
            ClockFailure::from(e)
        })?;
        debug!(
            lat = location.latitude,
            lng = location.longitude,
            accuracy = location.accuracy,
            "location acquired"
        );

        let session = match self.sessions.current_session().await {
            Ok(Some(session)) => session,
            Ok(None) => {
                warn!("no access token on the current session");
                return Err(ClockFailure::NotSignedIn);
            }
            Err(e) => {
                error!("error getting session: {}", e);
                return Err(ClockFailure::SessionUnavailable(e.to_string()));
            }
        };

        let request = ClockRequest {
            kind,
            lat: location.latitude,
            lng: location.longitude,
            accuracy: location.accuracy,
            device_label: self.device_label.clone(),
        };

        let verdict = self
            .validator
            .submit(&request, session.access_token())
            .await
            .map_err(|e| {
                warn!("clock {} submission failed: {}", kind, e);
                ClockFailure::from_validator(kind, e)
            })?;

        let receipt = match verdict {
            ClockVerdict::Accepted(receipt) => receipt,
            ClockVerdict::Refused {
                error_code,
                message,
            } => {
                info!(
                    error_code = error_code.as_deref().unwrap_or_default(),
                    "clock {} refused", kind
                );
                return Err(ClockFailure::Refused {
                    kind,
                    error_code,
                    message,
                });
            }
        };

        let event = ClockEvent {
            id: receipt.event_id.clone(),
            employee_id: None,
            site_id: receipt.site_id.clone(),
            site_name: Some(receipt.site_name.clone()),
            kind,
            timestamp: receipt.timestamp,
            lat: request.lat,
            lng: request.lng,
            accuracy_meters: request.accuracy,
            device_label: Some(request.device_label),
            status: "OK".to_string(),
        };

        self.display.send_replace(AttendanceDisplay {
            is_clocked_in: kind == ClockType::In,
            last_event: Some(event),
            site_name: Some(receipt.site_name.clone()),
        });

        info!(event_id = %receipt.event_id, site = %receipt.site_name, "clock {} accepted", kind);

        Ok(receipt)
    }
}
