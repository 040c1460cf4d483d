use async_trait::async_trait;
use thiserror::Error;

/// A single position fix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy in meters, when the provider reports one.
    pub accuracy: Option<f64>,
}

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("location request timed out")]
    Timeout,
    #[error("{0}")]
    Unavailable(String),
}

/// Device location source. Permission is requested as part of the fix.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_location(&self) -> Result<Location, LocationError>;
}

/// Location handed in from the outside, used by the command line harness.
#[derive(Clone, Copy, Debug)]
pub struct FixedLocation {
    location: Location,
}

impl FixedLocation {
    /// # Errors
    /// Returns [`LocationError::Unavailable`] for coordinates off the globe.
    pub fn new(
        latitude: f64,
        longitude: f64,
        accuracy: Option<f64>,
    ) -> Result<Self, LocationError> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(LocationError::Unavailable(format!(
                "invalid coordinates {latitude},{longitude}"
            )));
        }

        if accuracy.is_some_and(|meters| meters.is_sign_negative() || !meters.is_finite()) {
            return Err(LocationError::Unavailable(
                "accuracy must be a positive number of meters".to_string(),
            ));
        }

        Ok(Self {
            location: Location {
                latitude,
                longitude,
                accuracy,
            },
        })
    }
}

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn current_location(&self) -> Result<Location, LocationError> {
        Ok(self.location)
    }
}
