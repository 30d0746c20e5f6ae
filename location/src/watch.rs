//! Continuous position watch built from repeated one-shot samples.

use std::sync::Arc;
use std::time::Duration;

use futures::stream;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::{
    Coordinate, GeolocationProvider, Location, LocationStream, PositionRequest, WatchOptions,
    distance_meters,
};

/// Shortest sampling period, applied when `fastest_interval` is zero.
const MIN_SAMPLE_PERIOD: Duration = Duration::from_millis(100);

/// Decides which samples a watch delivers.
///
/// The first sample always passes. After that a sample passes once
/// `interval` has elapsed since the last delivery, or earlier when it
/// moved at least `distance_filter` meters from the last delivery and at
/// least `fastest_interval` has elapsed.
#[derive(Debug, Clone)]
pub struct WatchFilter {
    distance_filter: f64,
    interval: Duration,
    fastest_interval: Duration,
    last: Option<(Coordinate, Instant)>,
}

impl WatchFilter {
    /// Creates a filter for `options`.
    #[must_use]
    pub const fn new(options: &WatchOptions) -> Self {
        Self {
            distance_filter: options.distance_filter,
            interval: options.interval,
            fastest_interval: options.fastest_interval,
            last: None,
        }
    }

    /// Returns whether `location`, sampled at `now`, should be delivered,
    /// remembering it if so.
    pub fn admit(&mut self, location: &Location, now: Instant) -> bool {
        let here = location.coordinate();
        let pass = match self.last {
            None => true,
            Some((prev, at)) => {
                let elapsed = now.saturating_duration_since(at);
                elapsed >= self.interval
                    || (elapsed >= self.fastest_interval
                        && distance_meters(prev, here) >= self.distance_filter)
            }
        };
        if pass {
            self.last = Some((here, now));
        }
        pass
    }
}

struct Sampler {
    provider: Arc<dyn GeolocationProvider>,
    request: PositionRequest,
    ticks: Interval,
    filter: WatchFilter,
}

/// Samples `provider` every `fastest_interval` and yields the samples the
/// [`WatchFilter`] admits. Errors are yielded and the watch keeps going.
///
/// Each sample demands a fresh fix and may take at most `interval`.
/// Needs a tokio runtime; dropping the stream ends the watch.
pub fn sample_positions(provider: Arc<dyn GeolocationProvider>, options: WatchOptions) -> LocationStream {
    let request = PositionRequest {
        accuracy: options.accuracy,
        timeout: options.interval,
        maximum_age: Duration::ZERO,
    };
    let mut ticks = tokio::time::interval(options.fastest_interval.max(MIN_SAMPLE_PERIOD));
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let sampler = Sampler {
        provider,
        request,
        ticks,
        filter: WatchFilter::new(&options),
    };

    Box::pin(stream::unfold(sampler, |mut sampler| async move {
        loop {
            sampler.ticks.tick().await;
            match sampler.provider.current_position(sampler.request).await {
                Ok(location) => {
                    if sampler.filter.admit(&location, Instant::now()) {
                        return Some((Ok(location), sampler));
                    }
                }
                Err(err) => return Some((Err(err), sampler)),
            }
        }
    }))
}
