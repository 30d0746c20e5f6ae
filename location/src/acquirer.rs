//! Three-phase acquisition of the user's position.
//!
//! On [`LocationAcquirer::start`] three requests run side by side:
//!
//! 1. a cached fix, issued immediately, that may be up to five minutes old;
//! 2. a precise fix, issued one second later, that must be fresh;
//! 3. a continuous watch that runs until [`LocationAcquirer::stop`].
//!
//! They complete in any order and every fix is forwarded as it arrives, so
//! the last one to land wins. Only the watch can be cancelled. The one-shot
//! requests run to completion, but each start is tagged with a generation
//! and anything a stopped generation tries to report is dropped.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::StreamExt;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::{Accuracy, GeolocationProvider, Location, LocationError, PositionRequest, WatchOptions};

/// Which request produced a fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixPhase {
    /// Low-accuracy request that accepts a stale fix.
    Cached,
    /// High-accuracy request that demands a fresh fix.
    Precise,
    /// Continuous watch delivery.
    Watch,
}

impl fmt::Display for FixPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cached => "cached",
            Self::Precise => "precise",
            Self::Watch => "watch",
        })
    }
}

/// Something the acquirer wants the screen to know.
#[derive(Debug, Clone, PartialEq)]
pub enum AcquisitionEvent {
    /// A phase resolved a position.
    Fix {
        /// The phase that produced it.
        phase: FixPhase,
        /// The position.
        location: Location,
    },
    /// The precise request failed.
    ///
    /// Cached and watch failures are only logged.
    PreciseFailed {
        /// Why it failed.
        error: LocationError,
    },
}

/// Receives acquisition events.
pub trait LocationDelegate: Send + Sync {
    /// Called for every event of a live acquisition.
    fn on_event(&self, event: AcquisitionEvent);
}

/// Tunables for the three phases.
///
/// Durations are in milliseconds so the struct reads naturally from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Timeout of the cached request.
    pub cached_timeout_ms: u64,
    /// Maximum age of a fix the cached request accepts.
    pub cached_maximum_age_ms: u64,
    /// Delay between start and the precise request.
    pub precise_delay_ms: u64,
    /// Timeout of the precise request.
    pub precise_timeout_ms: u64,
    /// Minimum movement between watch deliveries.
    pub watch_distance_filter_m: f64,
    /// Desired time between watch deliveries.
    pub watch_interval_ms: u64,
    /// Lower bound on time between watch deliveries.
    pub watch_fastest_interval_ms: u64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            cached_timeout_ms: 5_000,
            cached_maximum_age_ms: 300_000,
            precise_delay_ms: 1_000,
            precise_timeout_ms: 30_000,
            watch_distance_filter_m: 10.0,
            watch_interval_ms: 10_000,
            watch_fastest_interval_ms: 5_000,
        }
    }
}

impl AcquisitionConfig {
    /// Options of the cached request.
    #[must_use]
    pub const fn cached_request(&self) -> PositionRequest {
        PositionRequest {
            accuracy: Accuracy::Balanced,
            timeout: Duration::from_millis(self.cached_timeout_ms),
            maximum_age: Duration::from_millis(self.cached_maximum_age_ms),
        }
    }

    /// Options of the precise request.
    #[must_use]
    pub const fn precise_request(&self) -> PositionRequest {
        PositionRequest {
            accuracy: Accuracy::High,
            timeout: Duration::from_millis(self.precise_timeout_ms),
            maximum_age: Duration::ZERO,
        }
    }

    /// Options of the watch.
    #[must_use]
    pub const fn watch_options(&self) -> WatchOptions {
        WatchOptions {
            accuracy: Accuracy::Balanced,
            distance_filter: self.watch_distance_filter_m,
            interval: Duration::from_millis(self.watch_interval_ms),
            fastest_interval: Duration::from_millis(self.watch_fastest_interval_ms),
        }
    }
}

/// Forwards events of one generation while it is current.
#[derive(Clone)]
struct Emitter {
    token: u64,
    generation: Arc<AtomicU64>,
    delegate: Arc<dyn LocationDelegate>,
}

impl Emitter {
    fn is_live(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.token
    }

    fn emit(&self, event: AcquisitionEvent) -> bool {
        if !self.is_live() {
            debug!("discarding event of stopped acquisition {}: {event:?}", self.token);
            return false;
        }
        self.delegate.on_event(event);
        true
    }
}

/// Runs the three-phase strategy against a [`GeolocationProvider`].
///
/// Spawns onto the ambient tokio runtime.
#[derive(Clone)]
pub struct LocationAcquirer {
    provider: Arc<dyn GeolocationProvider>,
    delegate: Arc<dyn LocationDelegate>,
    config: AcquisitionConfig,
    generation: Arc<AtomicU64>,
}

impl fmt::Debug for LocationAcquirer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocationAcquirer")
            .field("config", &self.config)
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl LocationAcquirer {
    /// Creates an acquirer reporting to `delegate`.
    pub fn new(
        provider: Arc<dyn GeolocationProvider>,
        delegate: Arc<dyn LocationDelegate>,
        config: AcquisitionConfig,
    ) -> Self {
        Self {
            provider,
            delegate,
            config,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The phase options in use.
    #[must_use]
    pub const fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    /// Issue all three phases and return the handle that stops them.
    ///
    /// Starting again supersedes any earlier acquisition of this acquirer.
    #[must_use]
    pub fn start(&self) -> AcquisitionHandle {
        let token = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!("starting location acquisition {token}");

        let emitter = Emitter {
            token,
            generation: Arc::clone(&self.generation),
            delegate: Arc::clone(&self.delegate),
        };

        self.spawn_cached(emitter.clone());
        self.spawn_precise(emitter.clone());
        let watch = self.spawn_watch(emitter);

        AcquisitionHandle {
            token,
            generation: Arc::clone(&self.generation),
            watch,
        }
    }

    /// Release the acquisition behind `handle`.
    ///
    /// The watch is aborted; pending one-shot requests finish but their
    /// results are dropped.
    pub fn stop(&self, handle: AcquisitionHandle) {
        handle.stop();
    }

    fn spawn_cached(&self, emitter: Emitter) {
        let request = self.config.cached_request();
        let query = self.provider.current_position(request);
        tokio::spawn(async move {
            match query.await {
                Ok(location) => {
                    debug!("got cached position: {location:?}");
                    emitter.emit(AcquisitionEvent::Fix {
                        phase: FixPhase::Cached,
                        location,
                    });
                }
                Err(err) => debug!("no cached location: {err}"),
            }
        });
    }

    fn spawn_precise(&self, emitter: Emitter) {
        let request = self.config.precise_request();
        let delay = Duration::from_millis(self.config.precise_delay_ms);
        let provider = Arc::clone(&self.provider);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !emitter.is_live() {
                return;
            }
            match provider.current_position(request).await {
                Ok(location) => {
                    debug!("got accurate position: {location:?}");
                    emitter.emit(AcquisitionEvent::Fix {
                        phase: FixPhase::Precise,
                        location,
                    });
                }
                Err(error) => {
                    debug!("accurate position failed: {error}");
                    emitter.emit(AcquisitionEvent::PreciseFailed { error });
                }
            }
        });
    }

    fn spawn_watch(&self, emitter: Emitter) -> Option<JoinHandle<()>> {
        let mut updates = match self.provider.watch_position(self.config.watch_options()) {
            Ok(stream) => stream,
            Err(err) => {
                warn!("could not start position watch: {err}");
                return None;
            }
        };

        Some(tokio::spawn(async move {
            while let Some(update) = updates.next().await {
                match update {
                    Ok(location) => {
                        debug!("position update: {location:?}");
                        let live = emitter.emit(AcquisitionEvent::Fix {
                            phase: FixPhase::Watch,
                            location,
                        });
                        if !live {
                            break;
                        }
                    }
                    Err(err) => warn!("watch position error: {err}"),
                }
            }
        }))
    }
}

/// Handle to a running acquisition.
///
/// Dropping the handle stops the acquisition.
#[derive(Debug)]
pub struct AcquisitionHandle {
    token: u64,
    generation: Arc<AtomicU64>,
    watch: Option<JoinHandle<()>>,
}

impl AcquisitionHandle {
    /// Whether this acquisition still reports events.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.token
    }

    /// Stop reporting and cancel the watch. Idempotent.
    pub fn stop(mut self) {
        self.release();
    }

    fn release(&mut self) {
        // A newer start already retired this generation.
        let retired = self
            .generation
            .compare_exchange(self.token, self.token + 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if retired {
            info!("stopped location acquisition {}", self.token);
        }
        if let Some(watch) = self.watch.take() {
            watch.abort();
        }
    }
}

impl Drop for AcquisitionHandle {
    fn drop(&mut self) {
        self.release();
    }
}
