//! Rider location.
//!
//! The device location provider is an external collaborator; this module
//! defines its seam, the city-centre fallback, and distance computation.

use async_trait::async_trait;
use geo::{HaversineDistance, Point};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// São Paulo city centre, used when no fix is available.
pub const DEFAULT_LOCATION: Coordinates = Coordinates {
    latitude: -23.5505,
    longitude: -46.6333,
    accuracy: None,
};

/// A WGS84 position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy in metres, when the provider reports it.
    pub accuracy: Option<f64>,
}

impl Coordinates {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: None,
        }
    }

    fn point(self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }
}

/// Errors from a location provider.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("location unavailable: {0}")]
    Unavailable(String),
}

/// Source of the rider's position.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn has_permission(&self) -> bool;

    /// Ask the rider for permission. Returns whether it was granted.
    async fn request_permission(&self) -> bool;

    async fn current_location(&self) -> Result<Coordinates, LocationError>;
}

/// Current position, requesting permission if needed and falling back to
/// [`DEFAULT_LOCATION`] on any failure.
pub async fn current_location_or_default<P: LocationProvider + ?Sized>(
    provider: &P,
) -> Coordinates {
    if !provider.has_permission().await && !provider.request_permission().await {
        warn!("location permission denied, using default location");
        return DEFAULT_LOCATION;
    }

    match provider.current_location().await {
        Ok(location) => location,
        Err(e) => {
            warn!(error = %e, "failed to get location, using default location");
            DEFAULT_LOCATION
        }
    }
}

/// Provider that always reports the same position, e.g. a configured
/// kiosk location.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation(pub Coordinates);

impl Default for FixedLocation {
    fn default() -> Self {
        Self(DEFAULT_LOCATION)
    }
}

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn has_permission(&self) -> bool {
        true
    }

    async fn request_permission(&self) -> bool {
        true
    }

    async fn current_location(&self) -> Result<Coordinates, LocationError> {
        Ok(self.0)
    }
}

/// Great-circle distance in metres.
pub fn distance_m(a: Coordinates, b: Coordinates) -> f64 {
    a.point().haversine_distance(&b.point())
}
