//! Drivers that connect the state machines to a transport.
//!
//! [`DeviceLink`] runs a [`Device`] against one transport: each operation
//! updates the device, encodes the resulting message and sends it.
//! [`HubEndpoint`] receives frames from one transport and dispatches them to
//! a shared [`SessionTable`]. Several endpoints may share one table.
//!
//! Neither driver retries. A transport failure is returned as
//! `TransportUnavailable` and the caller decides what to do.

use std::sync::Arc;

use bytes::Bytes;
use pairlink_crypto::KeyScheduleParams;
use pairlink_proto::{DeviceId, Header, Message};

use crate::{
    Device, HubConfig, PairingError,
    audit::{MessageRecord, RecordSink},
    env::Environment,
    hub::{self, HubOutcome, SessionTable},
    transport::{Transport, TransportError},
};

/// Device driver: a device plus the transport to its hub.
///
/// Device state changes before the frame is sent, so a failed send leaves
/// the device ahead of the hub. Callers recover by re-pairing.
pub struct DeviceLink<E: Environment, T: Transport> {
    device: Device<E>,
    transport: T,
    sink: Option<Arc<dyn RecordSink>>,
}

impl<E: Environment, T: Transport> DeviceLink<E, T> {
    /// Create a driver without an audit sink.
    pub fn new(device: Device<E>, transport: T) -> Self {
        Self { device, transport, sink: None }
    }

    /// Report every sent frame to `sink`.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// The driven device.
    pub fn device(&self) -> &Device<E> {
        &self.device
    }

    /// Device identity.
    pub fn identity(&self) -> DeviceId {
        self.device.identity()
    }

    /// Pair with fresh parameters and send the `FirstContact`.
    pub async fn open_session(&mut self) -> Result<Message, PairingError> {
        let message = self.device.open_session()?;
        self.transmit(message, None).await
    }

    /// Pair with `params` and send the `FirstContact`.
    pub async fn open_session_with(
        &mut self,
        params: KeyScheduleParams,
    ) -> Result<Message, PairingError> {
        let message = self.device.open_session_with(params);
        self.transmit(message, None).await
    }

    /// Encrypt `text` and send the `Regular` message.
    pub async fn send(&mut self, text: &str) -> Result<Message, PairingError> {
        let message = self.device.send(text)?;
        self.transmit(message, Some(text)).await
    }

    /// Rotate to fresh parameters and send the `KeyUpdate`.
    pub async fn rotate_keys(&mut self) -> Result<Message, PairingError> {
        let message = self.device.rotate_keys()?;
        self.transmit(message, None).await
    }

    /// Rotate to `params` and send the `KeyUpdate`.
    pub async fn rotate_keys_with(
        &mut self,
        params: KeyScheduleParams,
    ) -> Result<Message, PairingError> {
        let message = self.device.rotate_keys_with(params)?;
        self.transmit(message, None).await
    }

    /// Tear down and send the `LastContact`.
    pub async fn close_session(&mut self) -> Result<Message, PairingError> {
        let message = self.device.close_session()?;
        self.transmit(message, None).await
    }

    /// Release the device and transport.
    pub fn into_parts(self) -> (Device<E>, T) {
        (self.device, self.transport)
    }

    async fn transmit(
        &mut self,
        message: Message,
        plaintext: Option<&str>,
    ) -> Result<Message, PairingError> {
        self.transport.send_frame(message.to_bytes()).await?;

        if let Some(sink) = &self.sink {
            sink.record(&MessageRecord::sent(&message, self.device.schedule(), plaintext));
        }

        Ok(message)
    }
}

/// Hub driver: one transport feeding a shared session table.
pub struct HubEndpoint<T: Transport> {
    table: Arc<SessionTable>,
    transport: T,
    config: HubConfig,
    sink: Option<Arc<dyn RecordSink>>,
}

impl<T: Transport> HubEndpoint<T> {
    /// Create an endpoint without an audit sink.
    pub fn new(table: Arc<SessionTable>, transport: T, config: HubConfig) -> Self {
        Self { table, transport, config, sink: None }
    }

    /// Report every processed frame to `sink`.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Shared session table.
    pub fn table(&self) -> &Arc<SessionTable> {
        &self.table
    }

    /// Receive one frame and dispatch it.
    ///
    /// # Errors
    ///
    /// - `PairingError::TransportUnavailable` if no frame could be received,
    ///   including expiry of the configured receive timeout
    /// - any dispatch error; the frame is consumed and the table unchanged
    pub async fn serve_one(&mut self) -> Result<HubOutcome, PairingError> {
        let frame = self.receive().await?;

        match hub::dispatch(&self.table, &frame) {
            Ok(outcome) => {
                if let Some(sink) = &self.sink {
                    sink.record(&MessageRecord::from_outcome(&outcome));
                }
                Ok(outcome)
            },
            Err(err) => {
                // Every non-empty frame has a readable header
                if let Ok(header) = Header::from_bytes(&frame) {
                    tracing::warn!(
                        device = %header.device,
                        kind = ?header.kind,
                        error = %err,
                        "frame rejected"
                    );
                    if let Some(sink) = &self.sink {
                        sink.record(&MessageRecord::rejected(header, &err));
                    }
                } else {
                    tracing::warn!(error = %err, "empty frame rejected");
                }
                Err(err)
            },
        }
    }

    /// Process `count` frames, skipping rejected ones.
    ///
    /// Returns the outcomes of the accepted frames in arrival order.
    ///
    /// # Errors
    ///
    /// `PairingError::TransportUnavailable` as soon as receiving fails.
    pub async fn serve(&mut self, count: usize) -> Result<Vec<HubOutcome>, PairingError> {
        let mut outcomes = Vec::with_capacity(count);

        for _ in 0..count {
            match self.serve_one().await {
                Ok(outcome) => outcomes.push(outcome),
                Err(err @ PairingError::TransportUnavailable(_)) => return Err(err),
                Err(_) => {},
            }
        }

        Ok(outcomes)
    }

    /// Process frames until the peer closes the transport.
    ///
    /// Returns the number of frames received, rejected ones included.
    ///
    /// # Errors
    ///
    /// `PairingError::TransportUnavailable` for any transport failure other
    /// than a clean close.
    pub async fn run(&mut self) -> Result<usize, PairingError> {
        let mut processed = 0;

        loop {
            match self.serve_one().await {
                Ok(_) => processed += 1,
                Err(PairingError::TransportUnavailable(TransportError::Closed)) => {
                    tracing::info!(processed, "transport closed");
                    return Ok(processed);
                },
                Err(err @ PairingError::TransportUnavailable(_)) => return Err(err),
                Err(_) => processed += 1,
            }
        }
    }

    async fn receive(&mut self) -> Result<Bytes, TransportError> {
        match self.config.receive_timeout {
            Some(limit) => tokio::time::timeout(limit, self.transport.receive_frame())
                .await
                .map_err(|_| TransportError::TimedOut(limit))?,
            None => self.transport.receive_frame().await,
        }
    }
}
