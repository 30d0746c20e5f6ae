use std::fmt;

use async_channel::{Receiver, TryRecvError};
use futures::future::{self, BoxFuture};
use log::{debug, warn};
use trackkit_location::Coordinate;
use trackkit_poller::payload::local_timestamp;
use trackkit_poller::{CoordinateSource, PollError, PollResult};

use crate::{GgaError, PacketCodec, parse_gga};

/// Frame decoder: `Ok(None)` skips the frame without complaint.
type Decode<F> = dyn Fn(&F) -> Result<Option<Coordinate>, String> + Send + Sync;

/// A [`CoordinateSource`] over a channel of raw frames.
///
/// Each fetch drains whatever arrived since the last one and reports the
/// newest decodable position, stamped with local time. Nothing new is
/// [`PollResult::Incomplete`]; only undecodable frames with no good one
/// among them fail the poll.
pub struct FeedSource<F> {
    frames: Receiver<F>,
    decode: Box<Decode<F>>,
}

impl<F> fmt::Debug for FeedSource<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedSource")
            .field("pending", &self.frames.len())
            .finish_non_exhaustive()
    }
}

impl FeedSource<Vec<u8>> {
    /// Encrypted radio packets opened with `codec`.
    #[must_use]
    pub fn packets(frames: Receiver<Vec<u8>>, codec: PacketCodec) -> Self {
        Self::new(frames, move |packet: &Vec<u8>| {
            codec
                .open(packet)
                .map(|position| Some(position.into()))
                .map_err(|err| err.to_string())
        })
    }
}

impl FeedSource<String> {
    /// NMEA sentences from a GNSS module. Sentences other than GGA and GGA
    /// without a fix are skipped.
    #[must_use]
    pub fn sentences(frames: Receiver<String>) -> Self {
        Self::new(frames, |sentence: &String| match parse_gga(sentence) {
            Ok(position) => Ok(Some(position.into())),
            Err(GgaError::NotGga) => Ok(None),
            Err(GgaError::NoFix(quality)) => {
                debug!("GGA without fix (quality {quality:?})");
                Ok(None)
            }
            Err(err) => Err(err.to_string()),
        })
    }
}

impl<F> FeedSource<F> {
    /// A feed with a custom decoder.
    pub fn new(
        frames: Receiver<F>,
        decode: impl Fn(&F) -> Result<Option<Coordinate>, String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            frames,
            decode: Box::new(decode),
        }
    }

    fn drain(&self) -> PollResult {
        let mut latest = None;
        let mut failure = None;
        loop {
            match self.frames.try_recv() {
                Ok(frame) => match (self.decode)(&frame) {
                    Ok(Some(coordinate)) => latest = Some(coordinate),
                    Ok(None) => {}
                    Err(err) => {
                        warn!("undecodable feed frame: {err}");
                        failure = Some(err);
                    }
                },
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Closed) => {
                    if latest.is_none() && failure.is_none() {
                        return PollResult::Failed(PollError::Transport("coordinate feed closed".into()));
                    }
                    break;
                }
            }
        }

        match (latest, failure) {
            (Some(coordinate), _) => PollResult::Updated {
                coordinate,
                timestamp: local_timestamp(),
            },
            (None, Some(err)) => PollResult::Failed(PollError::Malformed(err)),
            (None, None) => PollResult::Incomplete,
        }
    }
}

impl<F: Send + 'static> CoordinateSource for FeedSource<F> {
    fn fetch(&self) -> BoxFuture<'static, PollResult> {
        Box::pin(future::ready(self.drain()))
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::*;
    use crate::{E7Coordinate, KEY_LEN, NONCE_LEN};

    const KEY: [u8; KEY_LEN] = [0x5a; KEY_LEN];

    fn packet(nonce: u8, latitude_e7: i32, longitude_e7: i32) -> Vec<u8> {
        PacketCodec::new(KEY)
            .seal([nonce; NONCE_LEN], E7Coordinate::new(latitude_e7, longitude_e7))
            .unwrap()
    }

    fn coordinate(result: PollResult) -> Option<Coordinate> {
        match result {
            PollResult::Updated { coordinate, .. } => Some(coordinate),
            _ => None,
        }
    }

    #[test]
    fn newest_packet_wins() {
        let (tx, rx) = async_channel::unbounded();
        let source = FeedSource::packets(rx, PacketCodec::new(KEY));

        tx.try_send(packet(1, 498_174_252, 240_246_498)).unwrap();
        tx.try_send(packet(2, 498_175_252, 240_246_998)).unwrap();
        let result = block_on(source.fetch());

        assert_eq!(coordinate(result), Some(Coordinate::from_e7(498_175_252, 240_246_998)));
        assert_eq!(block_on(source.fetch()), PollResult::Incomplete);
    }

    #[test]
    fn bad_packets_fail_only_without_a_good_one() {
        let (tx, rx) = async_channel::unbounded();
        let source = FeedSource::packets(rx, PacketCodec::new(KEY));

        tx.try_send(vec![0; 5]).unwrap();
        assert_eq!(
            block_on(source.fetch()),
            PollResult::Failed(PollError::Malformed("packet too short: 5 bytes".into()))
        );

        tx.try_send(vec![0; 5]).unwrap();
        tx.try_send(packet(3, 10, 20)).unwrap();
        assert_eq!(coordinate(block_on(source.fetch())), Some(Coordinate::from_e7(10, 20)));
    }

    #[test]
    fn sentences_skip_chatter() {
        let (tx, rx) = async_channel::unbounded();
        let source = FeedSource::sentences(rx);

        for line in [
            "$GNGGA,092750.000,4949.08097,N,02401.35372,E,1,08,1.03,290.0,M,35.5,M,,*6A",
            "$GNGSA,A,3,10,32,,,,,,,,,,,1.33,1.03,0.85*1A",
            "$GNGGA,092751.000,,,,,0,00,99.99,,,,,,*56",
        ] {
            tx.try_send(line.to_owned()).unwrap();
        }

        assert_eq!(
            coordinate(block_on(source.fetch())),
            Some(Coordinate::from_e7(498_180_162, 240_225_620))
        );
    }

    #[test]
    fn closed_feed_is_a_transport_failure() {
        let (tx, rx) = async_channel::unbounded::<String>();
        let source = FeedSource::sentences(rx);
        drop(tx);
        assert!(matches!(
            block_on(source.fetch()),
            PollResult::Failed(PollError::Transport(_))
        ));
    }
}
