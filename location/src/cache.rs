//! Last-known-fix cache in front of a one-shot provider.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::{self, BoxFuture};

use crate::{
    GeolocationProvider, Location, LocationResult, LocationStream, PositionRequest, WatchOptions,
    sample_positions, timestamp_now,
};

/// Wraps a one-shot provider with a last-known fix.
///
/// Every fix the inner provider resolves is remembered, including the
/// samples taken for a watch, so a later request with a non-zero
/// `maximum_age` can be answered without touching the platform. The watch
/// samples through this cache.
#[derive(Clone)]
pub struct CachedGeolocation {
    inner: Arc<dyn GeolocationProvider>,
    last_known: Arc<Mutex<Option<Location>>>,
}

impl fmt::Debug for CachedGeolocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedGeolocation")
            .field("last_known", &self.last_known())
            .finish_non_exhaustive()
    }
}

impl CachedGeolocation {
    /// Puts an empty cache in front of `inner`.
    pub fn new(inner: Arc<dyn GeolocationProvider>) -> Self {
        Self {
            inner,
            last_known: Arc::new(Mutex::new(None)),
        }
    }

    /// The most recent fix, however old.
    #[must_use]
    pub fn last_known(&self) -> Option<Location> {
        self.last_known.lock().ok()?.clone()
    }

    fn fresh(&self, maximum_age: Duration) -> Option<Location> {
        if maximum_age.is_zero() {
            return None;
        }
        let location = self.last_known()?;
        let age = timestamp_now().saturating_sub(location.timestamp);
        (u128::from(age) <= maximum_age.as_millis()).then_some(location)
    }
}

impl GeolocationProvider for CachedGeolocation {
    fn current_position(&self, request: PositionRequest) -> BoxFuture<'static, LocationResult<Location>> {
        if let Some(location) = self.fresh(request.maximum_age) {
            return Box::pin(future::ready(Ok(location)));
        }

        let query = self.inner.current_position(request);
        let last_known = Arc::clone(&self.last_known);
        Box::pin(async move {
            let location = query.await?;
            if let Ok(mut guard) = last_known.lock() {
                *guard = Some(location.clone());
            }
            Ok(location)
        })
    }

    fn watch_position(&self, options: WatchOptions) -> LocationResult<LocationStream> {
        Ok(sample_positions(Arc::new(self.clone()), options))
    }
}
