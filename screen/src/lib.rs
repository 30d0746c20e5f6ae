//! The map screen: a target marker, the user's live position and the
//! status text around them.
//!
//! All state lives in one [`ScreenState`] that only changes by applying a
//! [`ScreenEvent`]. [`MapScreen`] wires the permission gate, the location
//! acquirer and (for a remote or local-feed target) the coordinate poller to a single
//! reducer task and publishes a snapshot after every change. The map SDK
//! renders from [`MapView`].
//!
//! ```rust,ignore
//! use trackkit_screen::{Collaborators, MapScreen, ScreenConfig, TargetSource};
//!
//! let config = ScreenConfig {
//!     source: TargetSource::remote("http://192.168.0.10:8080/coordinates"),
//!     ..ScreenConfig::default()
//! };
//! let screen = MapScreen::mount(config, Collaborators::system()).await?;
//! let mut updates = screen.subscribe();
//! while updates.changed().await.is_ok() {
//!     render(&screen.view());
//! }
//! ```

#![warn(missing_docs)]

mod config;
mod controller;
mod state;
mod view;

pub use config::{FIXED_TARGET, ScreenConfig, ScreenError, TargetSource};
pub use controller::{Collaborators, MapScreen};
pub use state::{LOWER_ACCURACY_ADVISORY, Notice, ScreenEvent, ScreenState, ServerStatus};
pub use view::{CAMERA_ANIMATION_MS, CAMERA_ZOOM, Camera, ErrorLine, MapView, Marker, StatusLine, Tone};
