//! Error types for the Pairlink wire format.
//!
//! All errors are structured and comparable so tests can match on them.

use thiserror::Error;

use crate::MessageKind;

/// Protocol-level errors from frame encoding and decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer is shorter than the frame its header announces
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Expected minimum size in bytes
        expected: usize,
        /// Actual size received
        actual: usize,
    },

    /// Header tag does not match the kind the caller expected
    #[error("invalid frame tag: expected {expected:?}, got {actual:?}")]
    InvalidFrameTag {
        /// Kind the caller was parsing
        expected: MessageKind,
        /// Kind found in the header byte
        actual: MessageKind,
    },

    /// Device identity does not fit in 6 bits
    #[error("device id out of range: {0} (maximum 63)")]
    DeviceIdOutOfRange(u8),
}

/// Convenient Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;
