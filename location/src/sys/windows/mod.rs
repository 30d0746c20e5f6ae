//! Windows location implementation using WinRT Geolocator.

use windows::Devices::Geolocation::{Geolocator, PositionAccuracy};

use crate::{Accuracy, Location, LocationError};

fn unknown(e: &windows::core::Error) -> LocationError {
    LocationError::Unknown(e.message().to_string())
}

// WinRT timestamps count 100ns ticks since 1601-01-01.
const TICKS_PER_MS: i64 = 10_000;
const UNIX_EPOCH_TICKS: i64 = 116_444_736_000_000_000;

pub(crate) async fn get_location(accuracy: Accuracy) -> Result<Location, LocationError> {
    let geolocator = Geolocator::new().map_err(|e| unknown(&e))?;
    geolocator
        .SetDesiredAccuracy(match accuracy {
            Accuracy::Balanced => PositionAccuracy::Default,
            Accuracy::High => PositionAccuracy::High,
        })
        .map_err(|e| unknown(&e))?;

    let position = geolocator
        .GetGeopositionAsync()
        .map_err(|e| unknown(&e))?
        .get()
        .map_err(|e| unknown(&e))?;

    let coord = position.Coordinate().map_err(|e| unknown(&e))?;
    let pos = coord
        .Point()
        .and_then(|point| point.Position())
        .map_err(|e| unknown(&e))?;

    let timestamp = coord
        .Timestamp()
        .map(|t| (t.UniversalTime - UNIX_EPOCH_TICKS) / TICKS_PER_MS)
        .ok()
        .and_then(|ms| u64::try_from(ms).ok())
        .unwrap_or_else(crate::timestamp_now);

    let accuracy = coord.Accuracy().ok();

    Ok(Location {
        latitude: pos.Latitude,
        longitude: pos.Longitude,
        altitude: Some(pos.Altitude),
        horizontal_accuracy: accuracy,
        vertical_accuracy: None,
        timestamp,
    })
}
