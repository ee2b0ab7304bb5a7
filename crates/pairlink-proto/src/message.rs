//! The four Pairlink messages and their binary codec.
//!
//! A `Message` is the logical content of one frame. Encoding writes the
//! header byte followed by the kind-specific body; decoding reads the header,
//! checks the buffer covers the whole frame and copies the body out.
//!
//! # Invariants
//!
//! - Decoding an encoded message yields the same message.
//! - Encoded length always equals `kind().frame_len()`.

use bytes::{BufMut, Bytes, BytesMut};
use pairlink_crypto::KeyScheduleParams;
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned, byteorder::little_endian::U64,
};

use crate::{
    DeviceId, Header, MessageKind,
    errors::{ProtocolError, Result},
};

/// Body of `FirstContact` and `KeyUpdate` frames (24 bytes).
#[repr(C)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
struct ParamsBody {
    p: U64,
    q: U64,
    s: U64,
}

impl ParamsBody {
    fn from_params(params: &KeyScheduleParams) -> Self {
        Self { p: U64::new(params.p), q: U64::new(params.q), s: U64::new(params.s) }
    }

    fn to_params(self) -> KeyScheduleParams {
        KeyScheduleParams::new(self.p.get(), self.q.get(), self.s.get())
    }
}

/// Body of `Regular` frames (9 bytes).
#[repr(C)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
struct RegularBody {
    key_index: u8,
    ciphertext: U64,
}

/// A protocol message.
///
/// Every variant carries the sending device's identity. The variant itself
/// determines the header tag, so a message can never be encoded with a tag
/// that disagrees with its body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    /// Pairing request with the parameters for the first key schedule.
    FirstContact {
        /// Sending device
        device: DeviceId,
        /// Key schedule parameters
        params: KeyScheduleParams,
    },

    /// Encrypted 8-byte block.
    Regular {
        /// Sending device
        device: DeviceId,
        /// Index into the device's current key schedule
        key_index: u8,
        /// Encrypted plaintext block
        ciphertext: u64,
    },

    /// Replacement parameters for the active key schedule.
    KeyUpdate {
        /// Sending device
        device: DeviceId,
        /// New key schedule parameters
        params: KeyScheduleParams,
    },

    /// Session teardown.
    LastContact {
        /// Sending device
        device: DeviceId,
    },
}

impl Message {
    /// Sending device.
    pub fn device(&self) -> DeviceId {
        match self {
            Self::FirstContact { device, .. }
            | Self::Regular { device, .. }
            | Self::KeyUpdate { device, .. }
            | Self::LastContact { device } => *device,
        }
    }

    /// Message kind (header tag).
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::FirstContact { .. } => MessageKind::FirstContact,
            Self::Regular { .. } => MessageKind::Regular,
            Self::KeyUpdate { .. } => MessageKind::KeyUpdate,
            Self::LastContact { .. } => MessageKind::LastContact,
        }
    }

    /// Header byte contents.
    pub fn header(&self) -> Header {
        Header::new(self.device(), self.kind())
    }

    /// Key schedule parameters, for the kinds that carry them.
    pub fn params(&self) -> Option<&KeyScheduleParams> {
        match self {
            Self::FirstContact { params, .. } | Self::KeyUpdate { params, .. } => Some(params),
            Self::Regular { .. } | Self::LastContact { .. } => None,
        }
    }

    /// Encoded length in bytes.
    pub fn encoded_len(&self) -> usize {
        self.kind().frame_len()
    }

    /// Encode into `dst`: header byte followed by the fixed body.
    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_u8(self.header().to_byte());

        match self {
            Self::FirstContact { params, .. } | Self::KeyUpdate { params, .. } => {
                dst.put_slice(ParamsBody::from_params(params).as_bytes());
            },
            Self::Regular { key_index, ciphertext, .. } => {
                let body = RegularBody { key_index: *key_index, ciphertext: U64::new(*ciphertext) };
                dst.put_slice(body.as_bytes());
            },
            Self::LastContact { .. } => {},
        }
    }

    /// Encode into a freshly allocated buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        debug_assert_eq!(buf.len(), self.encoded_len());
        buf.freeze()
    }

    /// Decode a frame of any kind, dispatching on the header tag.
    ///
    /// Bytes past the end of the frame are ignored.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTooShort` if the buffer is empty or shorter than
    ///   the frame length for the tag it carries
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = Header::from_bytes(bytes)?;
        let expected = header.kind.frame_len();
        if bytes.len() < expected {
            return Err(ProtocolError::FrameTooShort { expected, actual: bytes.len() });
        }

        let body = &bytes[Header::SIZE..expected];
        let device = header.device;

        let message = match header.kind {
            MessageKind::FirstContact => {
                Self::FirstContact { device, params: read_body::<ParamsBody>(body)?.to_params() }
            },
            MessageKind::KeyUpdate => {
                Self::KeyUpdate { device, params: read_body::<ParamsBody>(body)?.to_params() }
            },
            MessageKind::Regular => {
                let body = read_body::<RegularBody>(body)?;
                Self::Regular {
                    device,
                    key_index: body.key_index,
                    ciphertext: body.ciphertext.get(),
                }
            },
            MessageKind::LastContact => Self::LastContact { device },
        };

        Ok(message)
    }

    /// Decode a frame that must be of kind `expected`.
    ///
    /// The tag is checked before the body, so a mismatched frame is reported
    /// as a tag error even when it is also truncated.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::InvalidFrameTag` if the header tag is not `expected`
    /// - `ProtocolError::FrameTooShort` as for [`Message::decode`]
    pub fn decode_as(bytes: &[u8], expected: MessageKind) -> Result<Self> {
        let header = Header::from_bytes(bytes)?;
        if header.kind != expected {
            return Err(ProtocolError::InvalidFrameTag { expected, actual: header.kind });
        }
        Self::decode(bytes)
    }
}

/// Copy a fixed-size body out of `body`.
fn read_body<T: FromBytes>(body: &[u8]) -> Result<T> {
    T::read_from_prefix(body).map(|(value, _rest)| value).map_err(|_| {
        ProtocolError::FrameTooShort {
            expected: Header::SIZE + std::mem::size_of::<T>(),
            actual: Header::SIZE + body.len(),
        }
    })
}
