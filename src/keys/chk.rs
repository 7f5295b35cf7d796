//! Node-level CHK: routing key plus crypto algorithm.

use std::fmt;
use std::io::{Read, Write};

use thiserror::Error;
use tracing::{debug, error};

/// Length of a routing key in bytes.
pub const KEY_LENGTH: usize = 32;

/// Length of a full key: 2 bytes of type tag followed by the routing key.
pub const FULL_KEY_LENGTH: usize = 34;

/// High byte of every CHK type tag.
pub const BASE_TYPE: u8 = 1;

/// Size of a CHK data block in bytes.
pub const BLOCK_SIZE: usize = 32 * 1024;

/// AES in PCFB mode with a 256-bit key, SHA-256 verification.
pub const ALGO_AES_PCFB_256_SHA256: u8 = 2;

/// AES in CTR mode with a 256-bit key, SHA-256 verification.
pub const ALGO_AES_CTR_256_SHA256: u8 = 3;

/// A 32-byte routing key.
pub type RoutingKey = [u8; KEY_LENGTH];

/// Errors from constructing or decoding content keys.
#[derive(Error, Debug)]
pub enum KeyError {
    /// The routing key was not exactly [`KEY_LENGTH`] bytes.
    #[error("invalid routing key length: {actual} bytes, should be {KEY_LENGTH}")]
    InvalidKeyLength {
        /// Length that was supplied.
        actual: usize,
    },

    /// A full key did not have the expected length or type header.
    #[error("invalid full key: {0}")]
    InvalidFullKey(String),

    /// Buffer too short to hold any routing key.
    #[error("buffer of {len} bytes is too short to hold a routing key")]
    TooShort {
        /// Length of the buffer.
        len: usize,
    },

    /// Reading the routing key from a stream failed.
    #[error("failed to read routing key: {0}")]
    Read(#[from] std::io::Error),
}

/// Which recovery branch fired when a buffer was not a clean full key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDecodeAnomaly {
    /// Two trailing null bytes: a routing key stored with two bytes of
    /// padding. The recovered key is reliable.
    Recoverable,
    /// No recognisable header and no null padding. The first 32 bytes were
    /// used and the result may be garbage.
    Severe,
}

/// Immutable node-level content key.
///
/// Two keys are equal only if both the routing key and the algorithm match;
/// `Hash` and `Ord` use the same fields so the type works as a map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentKey {
    routing_key: RoutingKey,
    crypto_algorithm: u8,
}

impl ContentKey {
    /// Create a key from a routing key slice.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidKeyLength`] unless `routing_key` is exactly
    /// [`KEY_LENGTH`] bytes.
    pub fn new(routing_key: &[u8], crypto_algorithm: u8) -> Result<Self, KeyError> {
        let fixed: RoutingKey = routing_key
            .try_into()
            .map_err(|_| KeyError::InvalidKeyLength {
                actual: routing_key.len(),
            })?;
        Ok(Self::from_routing_key(fixed, crypto_algorithm))
    }

    /// Create a key from a routing key that is already the right size.
    #[must_use]
    pub const fn from_routing_key(routing_key: RoutingKey, crypto_algorithm: u8) -> Self {
        Self {
            routing_key,
            crypto_algorithm,
        }
    }

    /// Parse a strict full key, taking the algorithm from its header.
    ///
    /// Unlike [`routing_key_from_full_key`] this applies no legacy recovery.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidFullKey`] if `buf` is not
    /// [`FULL_KEY_LENGTH`] bytes or does not start with [`BASE_TYPE`].
    pub fn from_full_key(buf: &[u8]) -> Result<Self, KeyError> {
        if buf.len() != FULL_KEY_LENGTH {
            return Err(KeyError::InvalidFullKey(format!(
                "{} bytes, should be {FULL_KEY_LENGTH}",
                buf.len()
            )));
        }
        if buf[0] != BASE_TYPE {
            return Err(KeyError::InvalidFullKey(format!(
                "type {:#04x}{:02x} is not a CHK",
                buf[0], buf[1]
            )));
        }
        Self::new(&buf[2..], buf[1])
    }

    /// Read a routing key from `reader`; the algorithm comes from elsewhere
    /// (usually the store the key was read from).
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Read`] if fewer than [`KEY_LENGTH`] bytes are
    /// available.
    pub fn read_from<R: Read + ?Sized>(
        reader: &mut R,
        crypto_algorithm: u8,
    ) -> Result<Self, KeyError> {
        let mut routing_key = [0u8; KEY_LENGTH];
        reader.read_exact(&mut routing_key)?;
        Ok(Self::from_routing_key(routing_key, crypto_algorithm))
    }

    /// Write the full key to `writer`.
    ///
    /// # Errors
    ///
    /// Returns any error from the writer.
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&self.encode_full())
    }

    /// The routing key.
    #[must_use]
    pub const fn routing_key(&self) -> &RoutingKey {
        &self.routing_key
    }

    /// The crypto algorithm tag.
    #[must_use]
    pub const fn crypto_algorithm(&self) -> u8 {
        self.crypto_algorithm
    }

    /// Type tag: `0x0100 | crypto_algorithm`.
    #[must_use]
    pub const fn type_tag(&self) -> u16 {
        ((BASE_TYPE as u16) << 8) | self.crypto_algorithm as u16
    }

    /// Encode the 34-byte full key.
    #[must_use]
    pub fn encode_full(&self) -> [u8; FULL_KEY_LENGTH] {
        let mut buf = [0u8; FULL_KEY_LENGTH];
        buf[..2].copy_from_slice(&self.type_tag().to_be_bytes());
        buf[2..].copy_from_slice(&self.routing_key);
        buf
    }

    /// Routing key as lowercase hex.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.routing_key)
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CHK@{}:{:04x}", self.to_hex(), self.type_tag())
    }
}

/// Extract the routing key from a full key, tolerating legacy encodings.
///
/// Equivalent to [`recover_routing_key`] with [`ALGO_AES_PCFB_256_SHA256`]
/// as the expected header algorithm, discarding the anomaly (it is logged).
///
/// # Errors
///
/// Returns [`KeyError::TooShort`] if `buf` holds fewer than
/// [`KEY_LENGTH`] bytes.
pub fn routing_key_from_full_key(buf: &[u8]) -> Result<RoutingKey, KeyError> {
    recover_routing_key(buf, ALGO_AES_PCFB_256_SHA256).map(|(key, _)| key)
}

/// Extract the routing key from `buf`, reporting any recovery applied.
///
/// Persisted data contains keys written by older, buggy encoders, so this
/// never rejects a buffer that is long enough:
///
/// | input | result |
/// |---|---|
/// | 32 bytes | returned unchanged |
/// | header `0x01, expected_algorithm`, at least 34 bytes | bytes `2..34` |
/// | last two bytes zero | first 32 bytes, [`KeyDecodeAnomaly::Recoverable`] |
/// | anything else | first 32 bytes, [`KeyDecodeAnomaly::Severe`] |
///
/// A length other than 32 or 34 is logged as an error but processing
/// continues down the table.
///
/// # Errors
///
/// Returns [`KeyError::TooShort`] if `buf` holds fewer than
/// [`KEY_LENGTH`] bytes.
pub fn recover_routing_key(
    buf: &[u8],
    expected_algorithm: u8,
) -> Result<(RoutingKey, Option<KeyDecodeAnomaly>), KeyError> {
    if buf.len() == KEY_LENGTH {
        let mut out = [0u8; KEY_LENGTH];
        out.copy_from_slice(buf);
        return Ok((out, None));
    }
    if buf.len() != FULL_KEY_LENGTH {
        error!("routing_key_from_full_key() on {} bytes", buf.len());
    }
    if buf.len() < KEY_LENGTH {
        return Err(KeyError::TooShort { len: buf.len() });
    }

    let mut out = [0u8; KEY_LENGTH];
    if buf.len() >= FULL_KEY_LENGTH && buf[0] == BASE_TYPE && buf[1] == expected_algorithm {
        out.copy_from_slice(&buf[2..FULL_KEY_LENGTH]);
        return Ok((out, None));
    }

    let anomaly = if buf[buf.len() - 1] == 0 && buf[buf.len() - 2] == 0 {
        debug!(
            "Recovering routing key stored as full key (two trailing nulls): {}",
            hex::encode(buf)
        );
        KeyDecodeAnomaly::Recoverable
    } else {
        error!(
            "Maybe recovering routing key stored as full key, result may be unreliable: {}",
            hex::encode(buf)
        );
        KeyDecodeAnomaly::Severe
    };
    out.copy_from_slice(&buf[..KEY_LENGTH]);
    Ok((out, Some(anomaly)))
}
