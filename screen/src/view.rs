//! What the map presenter draws, derived from [`ScreenState`].

use trackkit_location::Coordinate;

use crate::state::{Notice, ScreenState, ServerStatus};

/// Zoom level of the camera.
pub const CAMERA_ZOOM: f64 = 14.0;

/// Camera animation length in milliseconds.
pub const CAMERA_ANIMATION_MS: u32 = 1_000;

/// Camera placement.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Map center.
    pub center: Coordinate,
    /// Zoom level.
    pub zoom: f64,
    /// Animation length in milliseconds.
    pub animation_ms: u32,
}

/// A labelled point annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    /// Stable annotation id.
    pub id: &'static str,
    /// Caption under the dot.
    pub label: &'static str,
    /// Position.
    pub coordinate: Coordinate,
}

/// Color cue of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// Things are fine.
    Affirmative,
    /// Something needs attention.
    Alert,
}

/// A line of status text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    /// The text.
    pub text: String,
    /// Its color cue.
    pub tone: Tone,
}

/// The location error line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorLine {
    /// The text.
    pub text: String,
    /// Whether to offer "Tap to retry". Only location failures can be
    /// retried, so this is off without permission.
    pub retry: bool,
}

/// Everything the presenter renders for one state.
#[derive(Debug, Clone, PartialEq)]
pub struct MapView {
    /// Camera, centered on the target.
    pub camera: Camera,
    /// Target marker.
    pub target: Marker,
    /// User marker, only with permission and a fix.
    pub user: Option<Marker>,
    /// Plain info lines.
    pub info: Vec<String>,
    /// Server status, when the target is remote.
    pub server_status: Option<StatusLine>,
    /// Location or permission error, drawn in the alert color.
    pub error: Option<ErrorLine>,
    /// Pending notice.
    pub notice: Option<Notice>,
}

impl From<&ScreenState> for MapView {
    fn from(state: &ScreenState) -> Self {
        let user = state
            .user_location
            .filter(|_| state.has_location_permission)
            .map(|coordinate| Marker {
                id: "userLocation",
                label: "You",
                coordinate,
            });

        let mut info = vec![format!("Target: {}", state.target)];
        match (&user, state.has_location_permission) {
            (Some(marker), _) => info.push(format!("You: {}", marker.coordinate)),
            (None, true) => info.push("Getting your location...".to_owned()),
            (None, false) => {}
        }

        let server_status = match &state.server_status {
            ServerStatus::Idle => None,
            status => Some(StatusLine {
                text: status.to_string(),
                tone: if status.is_connected() {
                    Tone::Affirmative
                } else {
                    Tone::Alert
                },
            }),
        };

        let error = state.location_error.as_ref().map(|message| ErrorLine {
            text: format!("Error: {message}"),
            retry: state.has_location_permission,
        });

        Self {
            camera: Camera {
                center: state.target,
                zoom: CAMERA_ZOOM,
                animation_ms: CAMERA_ANIMATION_MS,
            },
            target: Marker {
                id: "target",
                label: "Target",
                coordinate: state.target,
            },
            user,
            info,
            server_status,
            error,
            notice: state.notice.clone(),
        }
    }
}
