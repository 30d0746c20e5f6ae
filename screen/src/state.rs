//! Screen state and the reducer that owns every change to it.

use std::fmt;

use log::debug;
use trackkit_location::{Coordinate, FixPhase};
use trackkit_permission::GateOutcome;

/// Shown when the precise fix fails before any fix exists.
pub const LOWER_ACCURACY_ADVISORY: &str = "Using lower-accuracy location (GPS unavailable)";

/// Connection state of the remote coordinate source.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ServerStatus {
    /// No poll has completed yet, or the target is static.
    #[default]
    Idle,
    /// The last completed poll succeeded.
    Connected {
        /// Timestamp of the data received.
        timestamp: String,
    },
    /// The last completed poll failed.
    Offline {
        /// What went wrong.
        reason: String,
    },
}

impl ServerStatus {
    /// Whether the source is reachable.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("Waiting for server..."),
            Self::Connected { timestamp } => write!(f, "Connected: {timestamp}"),
            Self::Offline { reason } => write!(f, "Offline: {reason}"),
        }
    }
}

/// A one-shot message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Notice title.
    pub title: String,
    /// Notice body.
    pub message: String,
}

/// A change to the screen.
#[derive(Debug, Clone, PartialEq)]
pub enum ScreenEvent {
    /// The permission gate answered.
    PermissionResolved(GateOutcome),
    /// A location phase produced a fix.
    UserLocationUpdated {
        /// The acquisition that produced it.
        acquisition: u64,
        /// Which phase.
        phase: FixPhase,
        /// Where the user is.
        coordinate: Coordinate,
    },
    /// The precise request failed.
    PreciseFixFailed {
        /// The acquisition it belonged to.
        acquisition: u64,
        /// Why it failed.
        reason: String,
    },
    /// A poll delivered a new target.
    TargetCoordinateUpdated {
        /// The new target.
        coordinate: Coordinate,
        /// When the data was produced.
        timestamp: String,
    },
    /// A poll answered without usable coordinates.
    PollIncomplete,
    /// A poll failed.
    PollFailed(String),
    /// The user asked for the fixed target.
    TargetRestored,
    /// The user asked to retry location, and acquisition `acquisition`
    /// replaced the earlier ones.
    LocationRetryRequested {
        /// The acquisition now running.
        acquisition: u64,
    },
    /// The user closed the notice.
    NoticeDismissed,
}

/// Everything the screen shows.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenState {
    /// The target "Get Coordinates" restores.
    pub fixed_target: Coordinate,
    /// The target currently shown.
    pub target: Coordinate,
    /// The user's last known position.
    pub user_location: Option<Coordinate>,
    /// Phase of the last applied fix.
    pub last_fix_phase: Option<FixPhase>,
    /// Whether location access was granted.
    pub has_location_permission: bool,
    /// Latest location problem, cleared by any fix.
    pub location_error: Option<String>,
    /// Remote source status.
    pub server_status: ServerStatus,
    /// Timestamp of the last successful poll.
    pub last_data_received: Option<String>,
    /// Pending user notice.
    pub notice: Option<Notice>,
    /// Polls that answered without usable coordinates.
    pub incomplete_payloads: u64,
    /// Newest location acquisition heard from; older ones are ignored.
    pub acquisition: u64,
}

impl ScreenState {
    /// Fresh state showing `fixed_target`.
    #[must_use]
    pub const fn new(fixed_target: Coordinate) -> Self {
        Self {
            fixed_target,
            target: fixed_target,
            user_location: None,
            last_fix_phase: None,
            has_location_permission: false,
            location_error: None,
            server_status: ServerStatus::Idle,
            last_data_received: None,
            notice: None,
            incomplete_payloads: 0,
            acquisition: 0,
        }
    }

    /// Whether events of `acquisition` still count, adopting it if newer.
    fn admit_acquisition(&mut self, acquisition: u64) -> bool {
        if acquisition < self.acquisition {
            debug!("ignoring event of stopped acquisition {acquisition}");
            return false;
        }
        self.acquisition = acquisition;
        true
    }

    /// Apply `event`, returning whether anything changed.
    pub fn apply(&mut self, event: ScreenEvent) -> bool {
        match event {
            ScreenEvent::PermissionResolved(outcome) => match outcome {
                GateOutcome::Granted => {
                    let changed = !self.has_location_permission;
                    self.has_location_permission = true;
                    changed
                }
                GateOutcome::Denied { title, message } => {
                    self.notice = Some(Notice { title, message });
                    true
                }
                GateOutcome::Failed(message) => {
                    self.location_error = Some(message);
                    true
                }
            },
            ScreenEvent::UserLocationUpdated {
                acquisition,
                phase,
                coordinate,
            } => {
                if !self.admit_acquisition(acquisition) {
                    return false;
                }
                if let (Some(previous), Some(previous_phase)) = (self.user_location, self.last_fix_phase) {
                    debug!("{phase} fix {coordinate} supersedes {previous_phase} fix {previous}");
                }
                self.user_location = Some(coordinate);
                self.last_fix_phase = Some(phase);
                self.location_error = None;
                true
            }
            ScreenEvent::PreciseFixFailed { acquisition, reason } => {
                if !self.admit_acquisition(acquisition) {
                    return false;
                }
                if self.user_location.is_some() {
                    debug!("precise fix failed ({reason}), keeping existing fix");
                    return false;
                }
                self.location_error = Some(LOWER_ACCURACY_ADVISORY.to_owned());
                true
            }
            ScreenEvent::TargetCoordinateUpdated {
                coordinate,
                timestamp,
            } => {
                self.target = coordinate;
                self.last_data_received = Some(timestamp.clone());
                self.server_status = ServerStatus::Connected { timestamp };
                true
            }
            ScreenEvent::PollIncomplete => {
                self.incomplete_payloads += 1;
                true
            }
            ScreenEvent::PollFailed(reason) => {
                self.server_status = ServerStatus::Offline { reason };
                true
            }
            ScreenEvent::TargetRestored => {
                self.target = self.fixed_target;
                self.notice = Some(Notice {
                    title: "Coordinates Loaded".into(),
                    message: format!(
                        "Lat: {}\nLon: {}",
                        self.fixed_target.latitude, self.fixed_target.longitude
                    ),
                });
                true
            }
            ScreenEvent::LocationRetryRequested { acquisition } => {
                self.acquisition = self.acquisition.max(acquisition);
                self.location_error.take();
                true
            }
            ScreenEvent::NoticeDismissed => self.notice.take().is_some(),
        }
    }
}
