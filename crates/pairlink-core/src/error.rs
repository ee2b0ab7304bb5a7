//! Error types for the Pairlink protocol core.
//!
//! [`PairingError`] is the caller-facing error for both roles. Every failure
//! mode is a distinct variant so callers can tell a stale device from a bad
//! frame from a dead transport without parsing messages.

use pairlink_crypto::CryptoError;
use pairlink_proto::{DeviceId, MessageKind, ProtocolError};
use thiserror::Error;

use crate::transport::TransportError;

/// Errors from device and hub operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PairingError {
    /// Frame tag does not match the kind expected in this context
    #[error("invalid frame tag: expected {expected:?}, got {actual:?}")]
    InvalidFrameTag {
        /// Kind the handler accepts
        expected: MessageKind,
        /// Kind that was received
        actual: MessageKind,
    },

    /// Regular or `KeyUpdate` for a device with no hub session
    #[error("unknown device: {0}")]
    UnknownDevice(DeviceId),

    /// Key index does not address a key in the stored schedule
    #[error("key index {index} out of range for schedule of {len} keys")]
    KeyIndexOutOfRange {
        /// Index carried by the frame
        index: u8,
        /// Length of the stored schedule
        len: usize,
    },

    /// Device operation attempted without an active key schedule
    #[error("no active key schedule: cannot {operation} before first contact")]
    SessionNotEstablished {
        /// Operation that was attempted
        operation: &'static str,
    },

    /// Transport failed to deliver or receive a frame
    #[error("transport unavailable: {0}")]
    TransportUnavailable(#[from] TransportError),

    /// Frame could not be parsed
    #[error("malformed frame: {0}")]
    MalformedFrame(ProtocolError),

    /// Parameter generation or decryption failed
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

impl PairingError {
    /// Returns true if retrying the same operation may succeed.
    ///
    /// Only transport failures qualify. Protocol violations and unknown
    /// devices fail the same way on every retry. The core never retries on
    /// its own; this is a hint for the transport owner.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransportUnavailable(_))
    }
}

/// Tag mismatches keep their own variant; every other proto failure is a
/// malformed frame.
impl From<ProtocolError> for PairingError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::InvalidFrameTag { expected, actual } => {
                Self::InvalidFrameTag { expected, actual }
            },
            other => Self::MalformedFrame(other),
        }
    }
}
