//! Header byte: 6-bit device identity plus 2-bit message tag.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{ProtocolError, Result};

/// 6-bit device identity.
///
/// Chosen once when a device is created and never changed. The protocol
/// does not enforce uniqueness, so two devices may share an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(u8);

impl DeviceId {
    /// Largest representable identity.
    pub const MAX: u8 = 0x3F;

    /// Create an identity, rejecting values that do not fit in 6 bits.
    pub fn new(id: u8) -> Result<Self> {
        if id > Self::MAX {
            return Err(ProtocolError::DeviceIdOutOfRange(id));
        }
        Ok(Self(id))
    }

    /// Create an identity from the low 6 bits of `bits`, discarding the rest.
    ///
    /// Used when deriving an identity from random input.
    pub fn from_low_bits(bits: u64) -> Self {
        Self((bits & u64::from(Self::MAX)) as u8)
    }

    /// Raw identity value (0..=63).
    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message kind, encoded in the low 2 bits of the header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// Pairing request carrying key schedule parameters (FCM)
    FirstContact,
    /// Encrypted application data (RM)
    Regular,
    /// Fresh key schedule parameters replacing the active schedule (KUM)
    KeyUpdate,
    /// Session teardown (LCM)
    LastContact,
}

impl MessageKind {
    /// Mask selecting the tag bits of a header byte.
    pub const TAG_MASK: u8 = 0b11;

    /// 2-bit wire tag.
    pub fn tag(self) -> u8 {
        match self {
            Self::FirstContact => 0,
            Self::Regular => 1,
            Self::KeyUpdate => 2,
            Self::LastContact => 3,
        }
    }

    /// Kind for the low 2 bits of `tag`. Every 2-bit value is a valid kind.
    pub fn from_tag(tag: u8) -> Self {
        match tag & Self::TAG_MASK {
            0 => Self::FirstContact,
            1 => Self::Regular,
            2 => Self::KeyUpdate,
            _ => Self::LastContact,
        }
    }

    /// Total frame length in bytes (header included) for this kind.
    pub fn frame_len(self) -> usize {
        match self {
            Self::FirstContact | Self::KeyUpdate => 25,
            Self::Regular => 10,
            Self::LastContact => 1,
        }
    }

    /// Short protocol mnemonic (FCM, RM, KUM, LCM).
    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::FirstContact => "FCM",
            Self::Regular => "RM",
            Self::KeyUpdate => "KUM",
            Self::LastContact => "LCM",
        }
    }
}

/// Decoded header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Header {
    /// Sending device
    pub device: DeviceId,
    /// Message kind
    pub kind: MessageKind,
}

impl Header {
    /// Size of the serialized header.
    pub const SIZE: usize = 1;

    /// Create a header.
    pub fn new(device: DeviceId, kind: MessageKind) -> Self {
        Self { device, kind }
    }

    /// Pack into the wire byte: `(device << 2) | tag`.
    pub fn to_byte(self) -> u8 {
        (self.device.get() << 2) | self.kind.tag()
    }

    /// Unpack a wire byte. Infallible: every byte is a valid header.
    pub fn from_byte(byte: u8) -> Self {
        Self { device: DeviceId(byte >> 2), kind: MessageKind::from_tag(byte) }
    }

    /// Parse the header from the first byte of a frame.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTooShort` if `bytes` is empty
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let byte = bytes
            .first()
            .ok_or(ProtocolError::FrameTooShort { expected: Self::SIZE, actual: 0 })?;
        Ok(Self::from_byte(*byte))
    }
}
