use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_channel::{Receiver, Sender, unbounded};
use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use trackkit_location::{
    AcquisitionConfig, AcquisitionEvent, AcquisitionHandle, GeolocationProvider, LocationAcquirer,
    LocationDelegate, SystemGeolocation,
};
use trackkit_permission::{PermissionGate, PermissionProvider, SystemPermissions};
use trackkit_poller::{
    CoordinatePoller, CoordinateSource, HttpCoordinateSource, PollDelegate, PollResult, PollerHandle,
};

use crate::config::{ScreenConfig, ScreenError, TargetSource};
use crate::state::{ScreenEvent, ScreenState};
use crate::view::MapView;

/// The platform services a screen talks to.
#[derive(Clone)]
pub struct Collaborators {
    /// Permission dialog.
    pub permissions: Arc<dyn PermissionProvider>,
    /// Geolocation service.
    pub geolocation: Arc<dyn GeolocationProvider>,
    /// Polled target source. Required for a local feed; for a remote
    /// target, `None` builds an HTTP source from the configured endpoint.
    pub coordinates: Option<Arc<dyn CoordinateSource>>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("coordinates", &self.coordinates.is_some())
            .finish_non_exhaustive()
    }
}

impl Collaborators {
    /// The services of the platform this crate was built for.
    #[must_use]
    pub fn system() -> Self {
        Self {
            permissions: Arc::new(SystemPermissions),
            geolocation: Arc::new(SystemGeolocation::new()),
            coordinates: None,
        }
    }
}

fn forward(sender: &Sender<ScreenEvent>, event: ScreenEvent) {
    if let Err(err) = sender.try_send(event) {
        debug!("dropping screen event: {err}");
    }
}

/// Turns one acquisition's callbacks into screen events tagged with it.
struct LocationForwarder {
    sender: Sender<ScreenEvent>,
    acquisition: u64,
}

impl LocationDelegate for LocationForwarder {
    fn on_event(&self, event: AcquisitionEvent) {
        let acquisition = self.acquisition;
        forward(
            &self.sender,
            match event {
                AcquisitionEvent::Fix { phase, location } => ScreenEvent::UserLocationUpdated {
                    acquisition,
                    phase,
                    coordinate: location.coordinate(),
                },
                AcquisitionEvent::PreciseFailed { error } => ScreenEvent::PreciseFixFailed {
                    acquisition,
                    reason: error.to_string(),
                },
            },
        );
    }
}

/// Turns poller callbacks into screen events.
struct PollForwarder {
    sender: Sender<ScreenEvent>,
}

impl PollDelegate for PollForwarder {
    fn on_poll(&self, result: PollResult) {
        forward(&self.sender, match result {
            PollResult::Updated {
                coordinate,
                timestamp,
            } => ScreenEvent::TargetCoordinateUpdated {
                coordinate,
                timestamp,
            },
            PollResult::Incomplete => ScreenEvent::PollIncomplete,
            PollResult::Failed(err) => ScreenEvent::PollFailed(err.to_string()),
        });
    }
}

/// A mounted map screen.
///
/// Owns the reducer pump, the location acquisition and, for a polled
/// target, the poll timer. Needs a tokio runtime.
pub struct MapScreen {
    events: Sender<ScreenEvent>,
    state: watch::Receiver<ScreenState>,
    pump: JoinHandle<()>,
    geolocation: Arc<dyn GeolocationProvider>,
    acquisition_config: AcquisitionConfig,
    acquisition: Option<AcquisitionHandle>,
    acquisitions: u64,
    poller: Option<CoordinatePoller>,
    polling: Option<PollerHandle>,
    has_permission: bool,
}

impl fmt::Debug for MapScreen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapScreen")
            .field("has_permission", &self.has_permission)
            .field("tracking", &self.acquisition.is_some())
            .field("polling", &self.polling.is_some())
            .finish_non_exhaustive()
    }
}

impl MapScreen {
    /// Build the screen, start polling (for a polled target) and run the
    /// permission gate; location tracking starts once access is granted.
    ///
    /// # Errors
    ///
    /// Returns [`ScreenError::ZeroInterval`] if the config fails
    /// [`ScreenConfig::validate`], [`ScreenError::Poll`] if the remote
    /// endpoint is not a URL and [`ScreenError::MissingFeed`] for a local
    /// feed without a coordinate source.
    pub async fn mount(config: ScreenConfig, collaborators: Collaborators) -> Result<Self, ScreenError> {
        config.validate()?;
        let (events, receiver) = unbounded();
        let (state_tx, state) = watch::channel(ScreenState::new(config.fixed_target));
        let pump = spawn_reducer(receiver, state_tx);

        let mut screen = Self {
            events,
            state,
            pump,
            geolocation: Arc::clone(&collaborators.geolocation),
            acquisition_config: config.acquisition.clone(),
            acquisition: None,
            acquisitions: 0,
            poller: None,
            polling: None,
            has_permission: false,
        };

        let polled: Option<(Arc<dyn CoordinateSource>, u64)> = match &config.source {
            TargetSource::Static => None,
            TargetSource::RemotePoll {
                endpoint,
                interval_ms,
                timeout_ms,
            } => {
                let source: Arc<dyn CoordinateSource> = match collaborators.coordinates {
                    Some(source) => source,
                    None => Arc::new(
                        HttpCoordinateSource::new(endpoint)?
                            .with_timeout(Duration::from_millis(*timeout_ms)),
                    ),
                };
                Some((source, *interval_ms))
            }
            TargetSource::LocalFeed { interval_ms } => {
                let source = collaborators.coordinates.ok_or(ScreenError::MissingFeed)?;
                Some((source, *interval_ms))
            }
        };

        if let Some((source, interval_ms)) = polled {
            let forwarder = Arc::new(PollForwarder {
                sender: screen.events.clone(),
            });
            let poller = CoordinatePoller::new(source, forwarder);
            screen.polling = Some(poller.start(Duration::from_millis(interval_ms)));
            screen.poller = Some(poller);
        }

        let outcome = PermissionGate::new(collaborators.permissions).request_permission().await;
        screen.has_permission = outcome.is_granted();
        screen.send(ScreenEvent::PermissionResolved(outcome));
        if screen.has_permission {
            screen.start_acquisition();
        }

        info!("map screen mounted");
        Ok(screen)
    }

    /// Observe state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ScreenState> {
        self.state.clone()
    }

    /// A snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> ScreenState {
        self.state.borrow().clone()
    }

    /// The presenter's view of the current state.
    #[must_use]
    pub fn view(&self) -> MapView {
        MapView::from(&*self.state.borrow())
    }

    /// "Get Coordinates": restore the fixed target, or poll the target
    /// source right away without disturbing the timer.
    pub async fn refresh_coordinates(&self) {
        match &self.poller {
            Some(poller) => {
                poller.fetch_once().await;
            }
            None => self.send(ScreenEvent::TargetRestored),
        }
    }

    /// "Tap to retry": clear the location error and start acquisition over.
    ///
    /// Returns `false` without permission.
    pub fn retry_location(&mut self) -> bool {
        if !self.has_permission {
            warn!("location retry without permission ignored");
            return false;
        }
        if let Some(previous) = self.acquisition.take() {
            previous.stop();
        }
        let acquisition = self.start_acquisition();
        self.send(ScreenEvent::LocationRetryRequested { acquisition });
        true
    }

    /// Close the pending notice.
    pub fn dismiss_notice(&self) {
        self.send(ScreenEvent::NoticeDismissed);
    }

    /// Tear the screen down: stop the watch and the poll timer and ignore
    /// everything still in flight.
    pub fn unmount(self) {
        info!("map screen unmounted");
    }

    /// Start a new tagged acquisition and return its number.
    fn start_acquisition(&mut self) -> u64 {
        self.acquisitions += 1;
        let forwarder = Arc::new(LocationForwarder {
            sender: self.events.clone(),
            acquisition: self.acquisitions,
        });
        let acquirer = LocationAcquirer::new(
            Arc::clone(&self.geolocation),
            forwarder,
            self.acquisition_config.clone(),
        );
        self.acquisition = Some(acquirer.start());
        self.acquisitions
    }

    fn send(&self, event: ScreenEvent) {
        if let Err(err) = self.events.try_send(event) {
            warn!("screen event lost: {err}");
        }
    }
}

impl Drop for MapScreen {
    fn drop(&mut self) {
        if let Some(handle) = self.acquisition.take() {
            handle.stop();
        }
        if let (Some(poller), Some(handle)) = (&self.poller, self.polling.take()) {
            poller.stop(handle);
        }
        self.events.close();
        self.pump.abort();
    }
}

fn spawn_reducer(receiver: Receiver<ScreenEvent>, state: watch::Sender<ScreenState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Ok(event) = receiver.recv().await {
            state.send_if_modified(|current| current.apply(event));
        }
    })
}
