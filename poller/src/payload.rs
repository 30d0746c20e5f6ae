//! Interpretation of coordinate endpoint responses.

use serde_json::Value;
use trackkit_location::Coordinate;

use crate::{PollError, PollResult};

/// Turn a status and body into a [`PollResult`].
///
/// `local_timestamp` is only called when the server sent no timestamp.
pub fn interpret(status: u16, body: &[u8], local_timestamp: impl FnOnce() -> String) -> PollResult {
    if !(200..300).contains(&status) {
        return PollResult::Failed(PollError::Status(status));
    }

    let value: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(err) => return PollResult::Failed(PollError::Malformed(err.to_string())),
    };

    let latitude = value.get("latitude").and_then(Value::as_f64);
    let longitude = value.get("longitude").and_then(Value::as_f64);
    let (Some(latitude), Some(longitude)) = (latitude, longitude) else {
        return PollResult::Incomplete;
    };

    let timestamp = value
        .get("timestamp")
        .and_then(Value::as_str)
        .map_or_else(local_timestamp, str::to_owned);

    PollResult::Updated {
        coordinate: Coordinate::new(latitude, longitude),
        timestamp,
    }
}

/// Wall-clock time formatted the way the coordinate server formats it.
#[must_use]
pub fn local_timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}
