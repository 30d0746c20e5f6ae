//! # Trackkit
//!
//! The pieces of a map screen that shows a target coordinate and the
//! user's live position next to it.
//!
//! ## Features
//!
//! - `permission`: the location permission gate.
//! - `location`: cached / precise / continuous location acquisition.
//! - `poller`: fixed-interval polling of a remote target coordinate.
//! - `feed`: target coordinates from a local radio receiver or GNSS serial
//!   line.
//! - `screen` (default): screen state, reducer and controller wiring the
//!   three together.
//!
//! Use the `full` feature to enable everything.
//!
//! ## Example
//!
//! ```toml
//! [dependencies]
//! trackkit = { version = "0.1", features = ["screen"] }
//! ```
//!
//! ```rust,ignore
//! use trackkit::screen::{Collaborators, MapScreen, ScreenConfig};
//!
//! async fn show() -> Result<(), trackkit::screen::ScreenError> {
//!     let screen = MapScreen::mount(ScreenConfig::default(), Collaborators::system()).await?;
//!     println!("{:?}", screen.view().info);
//!     Ok(())
//! }
//! ```

#[cfg(feature = "feed")]
pub use trackkit_feed as feed;

#[cfg(feature = "location")]
pub use trackkit_location as location;

#[cfg(feature = "permission")]
pub use trackkit_permission as permission;

#[cfg(feature = "poller")]
pub use trackkit_poller as poller;

#[cfg(feature = "screen")]
pub use trackkit_screen as screen;
