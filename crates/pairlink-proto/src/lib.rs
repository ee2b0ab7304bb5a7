//! # Pairlink Protocol: Wire Format
//!
//! Binary framing for the four Pairlink message kinds exchanged between a
//! device and its hub.
//!
//! ## Frame Layout
//!
//! Every frame starts with a single header byte:
//!
//! ```text
//!   7                 2   1   0
//! +---------------------+-------+
//! |  device id (6 bit)  |  tag  |
//! +---------------------+-------+
//! ```
//!
//! followed by a fixed, kind-specific body:
//!
//! | Kind           | Tag | Body                               | Total |
//! |----------------|-----|------------------------------------|-------|
//! | `FirstContact` | 0   | P, Q, S as `u64`                   | 25    |
//! | `Regular`      | 1   | key index `u8`, ciphertext `u64`   | 10    |
//! | `KeyUpdate`    | 2   | P, Q, S as `u64`                   | 25    |
//! | `LastContact`  | 3   | none                               | 1     |
//!
//! ## Implementation Notes
//!
//! - **Byte Order**: body integers are little-endian. The ciphertext is a
//!   big-endian plaintext block transformed by the cipher, but travels as a
//!   little-endian `u64` like every other field.
//!
//! - **Zero-Copy Bodies**: bodies are `#[repr(C)]` structs of unaligned
//!   `zerocopy` integers, so parsing is a bounds check plus a copy.
//!
//! - **Self-Delimiting**: frame length depends only on the tag, so stream
//!   transports can split frames after reading the header byte (see
//!   [`MessageKind::frame_len`]).
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod errors;
pub mod header;
pub mod message;

pub use errors::{ProtocolError, Result};
pub use header::{DeviceId, Header, MessageKind};
pub use message::Message;
