//! Periodic polling of a remote target coordinate.
//!
//! [`CoordinatePoller`] fetches from a [`CoordinateSource`] once on start
//! and then on a fixed interval, reporting every [`PollResult`] to a
//! [`PollDelegate`]. Ticks do not wait for each other: a slow fetch can
//! still be in flight when the next one starts, and whichever completes
//! last is reported last.
//!
//! [`HttpCoordinateSource`] is the production source: a JSON `GET` bounded
//! by an explicit timer rather than a transport option.

#![warn(missing_docs)]

mod http;
pub mod payload;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use log::{debug, info, warn};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use trackkit_location::Coordinate;

pub use http::HttpCoordinateSource;

/// Default time between two scheduled polls.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(5_000);

/// Shortest period the timer runs at; shorter requests are raised to it.
pub const MIN_INTERVAL: Duration = Duration::from_millis(100);

/// Default client-side timeout of one fetch.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3_000);

/// Why a poll failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollError {
    /// The endpoint answered outside the 2xx range.
    #[error("HTTP error! status: {0}")]
    Status(u16),
    /// The request never produced a response.
    #[error("network error: {0}")]
    Transport(String),
    /// The timer fired before the response arrived.
    #[error("request timed out after {} ms", .0.as_millis())]
    Timeout(Duration),
    /// The body was not JSON.
    #[error("malformed response: {0}")]
    Malformed(String),
    /// The endpoint URL could not be parsed.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Outcome of one poll.
#[derive(Debug, Clone, PartialEq)]
pub enum PollResult {
    /// The endpoint sent a usable coordinate.
    Updated {
        /// The new target.
        coordinate: Coordinate,
        /// Server-supplied timestamp, or local time when absent.
        timestamp: String,
    },
    /// The source answered without usable coordinates, such as JSON
    /// lacking numeric fields or a feed with nothing new.
    Incomplete,
    /// The poll failed.
    Failed(PollError),
}

/// Where target coordinates come from.
pub trait CoordinateSource: Send + Sync {
    /// Perform one fetch. Must not hang past its own timeout.
    fn fetch(&self) -> BoxFuture<'static, PollResult>;
}

/// Receives poll results.
pub trait PollDelegate: Send + Sync {
    /// Called for every poll that completes while the poller is live.
    fn on_poll(&self, result: PollResult);
}

/// Drives a [`CoordinateSource`] on a timer.
///
/// Spawns onto the ambient tokio runtime.
#[derive(Clone)]
pub struct CoordinatePoller {
    source: Arc<dyn CoordinateSource>,
    delegate: Arc<dyn PollDelegate>,
    generation: Arc<AtomicU64>,
}

impl fmt::Debug for CoordinatePoller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoordinatePoller")
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl CoordinatePoller {
    /// Creates a poller reporting to `delegate`.
    pub fn new(source: Arc<dyn CoordinateSource>, delegate: Arc<dyn PollDelegate>) -> Self {
        Self {
            source,
            delegate,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Poll now and then every `interval` until the handle is stopped.
    ///
    /// `interval` is raised to [`MIN_INTERVAL`] if shorter. Starting again
    /// supersedes any earlier timer's results; stopping a superseded handle
    /// only cancels its own timer.
    #[must_use]
    pub fn start(&self, interval: Duration) -> PollerHandle {
        let interval = if interval < MIN_INTERVAL {
            warn!(
                "poll interval of {} ms raised to {} ms",
                interval.as_millis(),
                MIN_INTERVAL.as_millis()
            );
            MIN_INTERVAL
        } else {
            interval
        };
        let token = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!("polling coordinates every {} ms ({token})", interval.as_millis());

        let this = self.clone();
        let timer = tokio::spawn(async move {
            let mut ticks = tokio::time::interval(interval);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticks.tick().await;
                let this = this.clone();
                tokio::spawn(async move {
                    this.poll(token).await;
                });
            }
        });

        PollerHandle {
            token,
            generation: Arc::clone(&self.generation),
            timer: Some(timer),
        }
    }

    /// Stop the timer behind `handle`. In-flight fetches finish unreported.
    pub fn stop(&self, handle: PollerHandle) {
        handle.stop();
    }

    /// Poll once, outside the schedule, without touching the timer.
    ///
    /// The result is returned and, unless the poller was stopped meanwhile,
    /// also reported to the delegate.
    pub async fn fetch_once(&self) -> PollResult {
        let token = self.generation.load(Ordering::SeqCst);
        self.poll(token).await
    }

    async fn poll(&self, token: u64) -> PollResult {
        let result = self.source.fetch().await;
        match &result {
            PollResult::Updated {
                coordinate,
                timestamp,
            } => debug!("received coordinates {coordinate} at {timestamp}"),
            PollResult::Incomplete => {
                warn!("no usable coordinates in poll, keeping target");
            }
            PollResult::Failed(err) => warn!("poll failed: {err}"),
        }

        if self.generation.load(Ordering::SeqCst) == token {
            self.delegate.on_poll(result.clone());
        } else {
            debug!("discarding poll result of stopped poller");
        }
        result
    }
}

/// Handle to a running poll timer.
///
/// Dropping the handle stops polling.
#[derive(Debug)]
pub struct PollerHandle {
    token: u64,
    generation: Arc<AtomicU64>,
    timer: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Whether results are still reported.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.token
    }

    /// Cancel the timer. Idempotent.
    pub fn stop(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
            let _ = self.generation.compare_exchange(
                self.token,
                self.token + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
            info!("stopped polling coordinates");
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.release();
    }
}
