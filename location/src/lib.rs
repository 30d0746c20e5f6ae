//! Device location for the map screen.
//!
//! Two layers live here:
//!
//! - [`GeolocationProvider`], the seam to the platform: one-shot position
//!   queries with accuracy/timeout/staleness options and a continuous watch
//!   stream. [`SystemGeolocation`] implements it on top of the platform
//!   backends in [`sys`].
//! - [`LocationAcquirer`], which runs the cached / precise / watch strategy
//!   against a provider and reports every result to a [`LocationDelegate`].

#![warn(missing_docs)]

mod acquirer;
mod cache;
mod geo;
/// Platform-specific implementations.
pub mod sys;
mod watch;

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{self, BoxFuture, Either};
use futures::Stream;
use serde::{Deserialize, Serialize};

pub use acquirer::{
    AcquisitionConfig, AcquisitionEvent, AcquisitionHandle, FixPhase, LocationAcquirer,
    LocationDelegate,
};
pub use cache::CachedGeolocation;
pub use geo::distance_meters;
pub use watch::{WatchFilter, sample_positions};

/// A latitude/longitude pair in degrees.
///
/// Values are not range-checked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees (-90 to 90).
    pub latitude: f64,
    /// Longitude in degrees (-180 to 180).
    pub longitude: f64,
}

impl Coordinate {
    /// Creates a coordinate.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Converts degrees scaled by 10^7, the fixed-point format GNSS
    /// transmitters send over the air.
    #[must_use]
    pub fn from_e7(latitude_e7: i32, longitude_e7: i32) -> Self {
        Self {
            latitude: f64::from(latitude_e7) / 1e7,
            longitude: f64::from(longitude_e7) / 1e7,
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

/// A geographic location with coordinates and metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    /// Latitude in degrees (-90 to 90).
    pub latitude: f64,
    /// Longitude in degrees (-180 to 180).
    pub longitude: f64,
    /// Altitude in meters above sea level, if available.
    pub altitude: Option<f64>,
    /// Horizontal accuracy in meters, if available.
    pub horizontal_accuracy: Option<f64>,
    /// Vertical accuracy in meters, if available.
    pub vertical_accuracy: Option<f64>,
    /// Timestamp as Unix epoch milliseconds.
    pub timestamp: u64,
}

impl Location {
    /// The position without metadata.
    #[must_use]
    pub const fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Errors that can occur when accessing location.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    /// Location permission was not granted.
    #[error("location permission denied")]
    PermissionDenied,
    /// Location services are disabled on the device.
    #[error("location services disabled")]
    ServiceDisabled,
    /// Location request timed out.
    #[error("location request timed out")]
    Timeout,
    /// Location is not available.
    #[error("location not available")]
    NotAvailable,
    /// An unknown error occurred.
    #[error("unknown error: {0}")]
    Unknown(String),
}

/// Result alias for location operations.
pub type LocationResult<T> = Result<T, LocationError>;

/// How hard the platform should try.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Accuracy {
    /// Network / Wi-Fi grade, cheap and fast.
    #[default]
    Balanced,
    /// Satellite grade.
    High,
}

/// Options for a one-shot position query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionRequest {
    /// Requested accuracy.
    pub accuracy: Accuracy,
    /// Give up after this long.
    pub timeout: Duration,
    /// Accept a previously obtained fix no older than this.
    /// `Duration::ZERO` demands a fresh fix.
    pub maximum_age: Duration,
}

/// Options for a continuous position watch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchOptions {
    /// Requested accuracy.
    pub accuracy: Accuracy,
    /// Minimum movement in meters between two deliveries.
    pub distance_filter: f64,
    /// Desired time between deliveries.
    pub interval: Duration,
    /// Deliveries never come closer together than this.
    pub fastest_interval: Duration,
}

/// A boxed stream of watch deliveries. Dropping it ends the watch.
pub type LocationStream = Pin<Box<dyn Stream<Item = LocationResult<Location>> + Send>>;

/// Access to the device's geolocation service.
pub trait GeolocationProvider: Send + Sync {
    /// Resolve a single position.
    fn current_position(&self, request: PositionRequest) -> BoxFuture<'static, LocationResult<Location>>;

    /// Subscribe to position updates.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform refuses to start the subscription.
    fn watch_position(&self, options: WatchOptions) -> LocationResult<LocationStream>;
}

/// The platform's one-shot backend, bounded by the request timeout.
#[derive(Debug, Clone, Copy)]
struct PlatformGeolocation;

impl GeolocationProvider for PlatformGeolocation {
    fn current_position(&self, request: PositionRequest) -> BoxFuture<'static, LocationResult<Location>> {
        Box::pin(with_timeout(sys::get_location(request.accuracy), request.timeout))
    }

    fn watch_position(&self, options: WatchOptions) -> LocationResult<LocationStream> {
        Ok(sample_positions(Arc::new(*self), options))
    }
}

/// The geolocation service of the platform this crate was built for.
///
/// One-shot queries go to the platform backend in [`sys`] through a
/// [`CachedGeolocation`]; the watch samples through the same cache.
#[derive(Debug, Clone)]
pub struct SystemGeolocation(CachedGeolocation);

impl Default for SystemGeolocation {
    fn default() -> Self {
        Self(CachedGeolocation::new(Arc::new(PlatformGeolocation)))
    }
}

impl SystemGeolocation {
    /// Creates a provider with an empty last-known cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent fix this provider resolved.
    #[must_use]
    pub fn last_known(&self) -> Option<Location> {
        self.0.last_known()
    }
}

impl GeolocationProvider for SystemGeolocation {
    fn current_position(&self, request: PositionRequest) -> BoxFuture<'static, LocationResult<Location>> {
        self.0.current_position(request)
    }

    fn watch_position(&self, options: WatchOptions) -> LocationResult<LocationStream> {
        self.0.watch_position(options)
    }
}

/// Race `fut` against a timer; the loser is dropped.
pub(crate) async fn with_timeout<F>(fut: F, timeout: Duration) -> LocationResult<Location>
where
    F: std::future::Future<Output = LocationResult<Location>>,
{
    let fut = std::pin::pin!(fut);
    let delay = futures_timer::Delay::new(timeout);
    match future::select(fut, delay).await {
        Either::Left((result, _)) => result,
        Either::Right(((), _)) => Err(LocationError::Timeout),
    }
}

pub(crate) fn timestamp_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
