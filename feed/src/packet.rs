//! Encrypted position packets.
//!
//! Wire format: a 12-byte nonce followed by the ChaCha20-encrypted
//! position, latitude then longitude, each a little-endian `i32` in
//! degrees × 10^7. Bytes past the position are ignored. There is no
//! authentication tag; a wrong key decodes to a wrong position.

use std::fmt;

use chacha20::ChaCha20;
use chacha20::cipher::{KeyIvInit, StreamCipher};

use crate::E7Coordinate;

/// Length of the shared key.
pub const KEY_LEN: usize = 32;
/// Length of the per-packet nonce.
pub const NONCE_LEN: usize = 12;
/// Length of the encrypted position.
pub const COORDINATE_LEN: usize = 8;

/// Why a packet could not be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PacketError {
    /// Fewer than nonce plus position bytes.
    #[error("packet too short: {0} bytes")]
    TooShort(usize),
    /// The cipher rejected the key or nonce.
    #[error("cipher init failed")]
    Cipher,
}

/// Seals and opens position packets with a shared key.
#[derive(Clone)]
pub struct PacketCodec {
    key: [u8; KEY_LEN],
}

impl fmt::Debug for PacketCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketCodec").finish_non_exhaustive()
    }
}

impl PacketCodec {
    /// Creates a codec for `key`.
    #[must_use]
    pub const fn new(key: [u8; KEY_LEN]) -> Self {
        Self { key }
    }

    /// Decrypts the position carried by `packet`.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::TooShort`] for packets under 20 bytes.
    pub fn open(&self, packet: &[u8]) -> Result<E7Coordinate, PacketError> {
        if packet.len() < NONCE_LEN + COORDINATE_LEN {
            return Err(PacketError::TooShort(packet.len()));
        }
        let (nonce, body) = packet.split_at(NONCE_LEN);
        let mut plain = [0_u8; COORDINATE_LEN];
        plain.copy_from_slice(&body[..COORDINATE_LEN]);
        self.apply(nonce, &mut plain)?;

        let [a, b, c, d, e, f, g, h] = plain;
        Ok(E7Coordinate::new(
            i32::from_le_bytes([a, b, c, d]),
            i32::from_le_bytes([e, f, g, h]),
        ))
    }

    /// Encrypts `coordinate` under `nonce`. Never reuse a nonce with the
    /// same key.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::Cipher`] if the cipher cannot be set up.
    pub fn seal(&self, nonce: [u8; NONCE_LEN], coordinate: E7Coordinate) -> Result<Vec<u8>, PacketError> {
        let mut body = [0_u8; COORDINATE_LEN];
        body[..4].copy_from_slice(&coordinate.latitude_e7.to_le_bytes());
        body[4..].copy_from_slice(&coordinate.longitude_e7.to_le_bytes());
        self.apply(&nonce, &mut body)?;

        let mut packet = Vec::with_capacity(NONCE_LEN + COORDINATE_LEN);
        packet.extend_from_slice(&nonce);
        packet.extend_from_slice(&body);
        Ok(packet)
    }

    fn apply(&self, nonce: &[u8], buf: &mut [u8]) -> Result<(), PacketError> {
        let mut cipher = ChaCha20::new_from_slices(&self.key, nonce).map_err(|_| PacketError::Cipher)?;
        cipher.apply_keystream(buf);
        Ok(())
    }
}
