//! Turmoil-based Transport implementation using TCP streams.
//!
//! Pairlink frames carry no length prefix. The receiver reads the header
//! byte, looks up the fixed frame length for its tag and reads the rest.

use std::io;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use pairlink_core::{Transport, TransportError};
use pairlink_proto::Header;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use turmoil::net::{TcpListener, TcpStream};

/// Frame transport over one of Turmoil's deterministic TCP streams.
///
/// Turmoil controls delivery order and timing and can inject partitions and
/// latency, so device/hub exchanges replay identically for a given seed.
pub struct SimTransport {
    stream: TcpStream,
}

impl SimTransport {
    /// Connect to a listening hub.
    ///
    /// # Errors
    ///
    /// Returns error if the host is unreachable or refuses the connection.
    pub async fn connect(address: &str) -> io::Result<Self> {
        let stream = TcpStream::connect(address).await?;
        Ok(Self { stream })
    }

    /// Wrap an accepted stream.
    pub fn from_stream(stream: TcpStream) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl Transport for SimTransport {
    async fn send_frame(&mut self, frame: Bytes) -> Result<(), TransportError> {
        self.stream.write_all(&frame).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn receive_frame(&mut self) -> Result<Bytes, TransportError> {
        let header_byte = self.stream.read_u8().await?;
        let frame_len = Header::from_byte(header_byte).kind.frame_len();

        let mut frame = BytesMut::zeroed(frame_len);
        frame[0] = header_byte;
        self.stream.read_exact(&mut frame[Header::SIZE..]).await?;

        tracing::trace!(len = frame_len, "frame received");
        Ok(frame.freeze())
    }
}

/// Hub-side listener producing one [`SimTransport`] per device connection.
pub struct SimListener {
    listener: TcpListener,
}

impl SimListener {
    /// Bind to `address` (e.g. `"0.0.0.0:7000"`).
    ///
    /// # Errors
    ///
    /// Returns error if the address is in use or malformed.
    pub async fn bind(address: &str) -> io::Result<Self> {
        let listener = TcpListener::bind(address).await?;
        Ok(Self { listener })
    }

    /// Wait for the next device connection.
    pub async fn accept(&self) -> io::Result<SimTransport> {
        let (stream, addr) = self.listener.accept().await?;
        tracing::debug!(%addr, "device connected");
        Ok(SimTransport::from_stream(stream))
    }
}
