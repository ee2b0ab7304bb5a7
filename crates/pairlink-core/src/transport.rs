//! Transport abstraction for frame delivery.
//!
//! The `Transport` trait moves whole encoded frames between a device and a
//! hub. Protocol logic never touches sockets, so the same device and hub code
//! runs over:
//!
//! - **In-process channels** ([`ChannelTransport`], tests and the CLI)
//! - **TCP streams** (simulation via Turmoil, see `pairlink-harness`)
//!
//! A transport only carries bytes. Framing beyond "one `Bytes` per protocol
//! frame" is the implementation's business.

use std::{io, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;

/// Transport failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Peer went away; no more frames will arrive
    #[error("transport closed")]
    Closed,

    /// Underlying I/O failed
    #[error("I/O error: {0}")]
    Io(String),

    /// No frame arrived within the configured window
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => Self::Closed,
            _ => Self::Io(err.to_string()),
        }
    }
}

/// Reliable, ordered delivery of whole frames.
///
/// # Guarantees
///
/// - **Framing**: each `send_frame` arrives as exactly one `receive_frame`
/// - **Ordering**: frames arrive in the order they were sent
/// - **Closure**: once the peer is gone, `receive_frame` returns
///   `TransportError::Closed`
#[async_trait]
pub trait Transport: Send + 'static {
    /// Deliver one encoded frame to the peer.
    async fn send_frame(&mut self, frame: Bytes) -> Result<(), TransportError>;

    /// Wait for the next encoded frame from the peer.
    async fn receive_frame(&mut self) -> Result<Bytes, TransportError>;
}

/// In-memory transport backed by a pair of bounded tokio channels.
#[derive(Debug)]
pub struct ChannelTransport {
    tx: mpsc::Sender<Bytes>,
    rx: mpsc::Receiver<Bytes>,
}

impl ChannelTransport {
    /// Create two connected endpoints. Each buffers up to `capacity` frames
    /// before `send_frame` waits.
    pub fn pair(capacity: usize) -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::channel(capacity);
        let (b_tx, a_rx) = mpsc::channel(capacity);

        (Self { tx: a_tx, rx: a_rx }, Self { tx: b_tx, rx: b_rx })
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send_frame(&mut self, frame: Bytes) -> Result<(), TransportError> {
        self.tx.send(frame).await.map_err(|_| TransportError::Closed)
    }

    async fn receive_frame(&mut self) -> Result<Bytes, TransportError> {
        self.rx.recv().await.ok_or(TransportError::Closed)
    }
}
