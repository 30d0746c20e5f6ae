//! Local coordinate feeds.
//!
//! The target can come from hardware next to the screen instead of an HTTP
//! endpoint: a radio receiver handing over encrypted position packets, or
//! a GNSS module printing NMEA sentences. Both carry positions as degrees
//! scaled by 10^7 ([`E7Coordinate`]).
//!
//! [`FeedSource`] turns a channel of such frames into a
//! [`CoordinateSource`](trackkit_poller::CoordinateSource), so the regular
//! poller drains it on its timer.
//!
//! ```rust,ignore
//! use trackkit_feed::{FeedSource, PacketCodec};
//!
//! let (frames, receiver) = async_channel::unbounded();
//! let source = FeedSource::packets(receiver, PacketCodec::new(SHARED_KEY));
//! // radio task: frames.send(packet.to_vec()).await?;
//! ```

#![warn(missing_docs)]

mod nmea;
mod packet;
mod source;

use trackkit_location::Coordinate;

pub use nmea::{GgaError, parse_gga};
pub use packet::{COORDINATE_LEN, KEY_LEN, NONCE_LEN, PacketCodec, PacketError};
pub use source::FeedSource;

/// A position in degrees scaled by 10^7, as transmitters send it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct E7Coordinate {
    /// Latitude × 10^7.
    pub latitude_e7: i32,
    /// Longitude × 10^7.
    pub longitude_e7: i32,
}

impl E7Coordinate {
    /// Creates a fixed-point position.
    #[must_use]
    pub const fn new(latitude_e7: i32, longitude_e7: i32) -> Self {
        Self {
            latitude_e7,
            longitude_e7,
        }
    }
}

impl From<E7Coordinate> for Coordinate {
    fn from(value: E7Coordinate) -> Self {
        Self::from_e7(value.latitude_e7, value.longitude_e7)
    }
}
