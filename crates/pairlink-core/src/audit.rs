//! Per-message audit records.
//!
//! Every frame a device sends or a hub processes can be reported to a
//! [`RecordSink`] as a [`MessageRecord`]. Sinks are observers only: whether a
//! sink is installed, and whether it manages to write, never changes what
//! the protocol does.

use std::{
    io::Write,
    sync::{Mutex, PoisonError},
};

use pairlink_crypto::{KeySchedule, KeyScheduleParams};
use pairlink_proto::{DeviceId, Header, Message, MessageKind};
use serde::Serialize;

use crate::{
    PairingError,
    hub::{HubOutcome, Teardown},
};

/// Which side produced the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Device sent the frame
    Device,
    /// Hub processed the frame
    Hub,
}

/// What happened to the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Frame handed to the transport
    Sent,
    /// Hub stored a new session
    Paired,
    /// Hub decrypted a regular message
    Delivered,
    /// Hub replaced a session's schedule
    KeysUpdated,
    /// Hub removed a session
    Disconnected,
    /// `LastContact` for an identity with no session
    NotConnected,
    /// Hub rejected the frame
    Rejected,
}

/// One processed message, flattened for serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageRecord {
    /// Producing side
    pub role: Role,
    /// Device identity from the header
    pub device: DeviceId,
    /// Three-letter kind mnemonic
    pub kind: &'static str,
    /// Parameters carried or in effect
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<KeyScheduleParams>,
    /// Derived keys as hex strings
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
    /// Key index of a regular message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_index: Option<u8>,
    /// Ciphertext of a regular message as hex
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ciphertext: Option<String>,
    /// Plaintext of a regular message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plaintext: Option<String>,
    /// Outcome
    pub status: RecordStatus,
    /// Rejection reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MessageRecord {
    fn empty(role: Role, device: DeviceId, kind: MessageKind, status: RecordStatus) -> Self {
        Self {
            role,
            device,
            kind: kind.mnemonic(),
            params: None,
            keys: Vec::new(),
            key_index: None,
            ciphertext: None,
            plaintext: None,
            status,
            error: None,
        }
    }

    /// Record for a frame a device sent.
    ///
    /// `schedule` is the schedule in effect after the send; `plaintext` is the
    /// text of a regular message.
    pub fn sent(message: &Message, schedule: Option<&KeySchedule>, plaintext: Option<&str>) -> Self {
        let mut record =
            Self::empty(Role::Device, message.device(), message.kind(), RecordStatus::Sent);
        record.params = message.params().copied();
        record.keys = schedule.map(hex_keys).unwrap_or_default();
        record.plaintext = plaintext.map(str::to_owned);

        if let Message::Regular { key_index, ciphertext, .. } = *message {
            record.key_index = Some(key_index);
            record.ciphertext = Some(format!("{ciphertext:016x}"));
        }

        record
    }

    /// Record for a frame the hub processed successfully.
    pub fn from_outcome(outcome: &HubOutcome) -> Self {
        let device = outcome.device();
        let kind = outcome.kind();

        match outcome {
            HubOutcome::Paired { params, schedule, .. } => {
                let mut record = Self::empty(Role::Hub, device, kind, RecordStatus::Paired);
                record.params = Some(*params);
                record.keys = hex_keys(schedule);
                record
            },
            HubOutcome::KeysUpdated { params, schedule, .. } => {
                let mut record = Self::empty(Role::Hub, device, kind, RecordStatus::KeysUpdated);
                record.params = Some(*params);
                record.keys = hex_keys(schedule);
                record
            },
            HubOutcome::Delivered { delivery, .. } => {
                let mut record = Self::empty(Role::Hub, device, kind, RecordStatus::Delivered);
                record.keys = vec![format!("{:016x}", delivery.key)];
                record.key_index = Some(delivery.key_index);
                record.ciphertext = Some(format!("{:016x}", delivery.ciphertext));
                record.plaintext = Some(delivery.text.clone());
                record
            },
            HubOutcome::Disconnected { teardown, .. } => {
                let status = match teardown {
                    Teardown::Removed => RecordStatus::Disconnected,
                    Teardown::WasNotConnected => RecordStatus::NotConnected,
                };
                Self::empty(Role::Hub, device, kind, status)
            },
        }
    }

    /// Record for a frame the hub rejected.
    pub fn rejected(header: Header, err: &PairingError) -> Self {
        let mut record = Self::empty(Role::Hub, header.device, header.kind, RecordStatus::Rejected);
        record.error = Some(err.to_string());
        record
    }
}

fn hex_keys(schedule: &KeySchedule) -> Vec<String> {
    schedule.keys().iter().map(|key| format!("{key:016x}")).collect()
}

/// Destination for audit records.
pub trait RecordSink: Send + Sync {
    /// Consume one record. Failures are the sink's to handle.
    fn record(&self, record: &MessageRecord);
}

/// Emits each record as a structured `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl RecordSink for TracingSink {
    fn record(&self, record: &MessageRecord) {
        tracing::info!(
            role = ?record.role,
            device = %record.device,
            kind = record.kind,
            status = ?record.status,
            params = ?record.params,
            keys = ?record.keys,
            key_index = ?record.key_index,
            ciphertext = ?record.ciphertext,
            plaintext = ?record.plaintext,
            error = ?record.error,
            "message processed"
        );
    }
}

/// Writes one JSON object per line.
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    /// Wrap a writer.
    pub fn new(writer: W) -> Self {
        Self { writer: Mutex::new(writer) }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> RecordSink for JsonLinesSink<W> {
    fn record(&self, record: &MessageRecord) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let result = serde_json::to_writer(&mut *writer, record)
            .map_err(std::io::Error::from)
            .and_then(|()| writer.write_all(b"\n"))
            .and_then(|()| writer.flush());

        if let Err(e) = result {
            tracing::warn!(device = %record.device, error = %e, "failed to write audit record");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{io, sync::Arc};

    use serde_json::Value;

    use super::*;
    use crate::hub::Delivery;

    fn device(id: u8) -> DeviceId {
        DeviceId::new(id).unwrap()
    }

    fn reference_params() -> KeyScheduleParams {
        KeyScheduleParams::new(104_729, 65_537, 0)
    }

    #[test]
    fn sent_first_contact_lists_params_and_keys() {
        let params = reference_params();
        let schedule = params.derive();
        let record =
            MessageRecord::sent(&Message::FirstContact { device: device(5), params }, Some(&schedule), None);

        assert_eq!(record.role, Role::Device);
        assert_eq!(record.kind, "FCM");
        assert_eq!(record.params, Some(params));
        assert_eq!(record.keys[0], "0002323200010001");
        assert_eq!(record.keys.len(), 4);
    }

    #[test]
    fn sent_regular_carries_ciphertext() {
        let message = Message::Regular { device: device(5), key_index: 0, ciphertext: 0x1686_b323_2000_1000 };
        let record = MessageRecord::sent(&message, None, Some("hi"));

        assert_eq!(record.key_index, Some(0));
        assert_eq!(record.ciphertext.as_deref(), Some("1686b32320001000"));
        assert_eq!(record.plaintext.as_deref(), Some("hi"));
    }

    #[test]
    fn outcome_statuses() {
        let delivered = HubOutcome::Delivered {
            device: device(5),
            delivery: Delivery {
                key_index: 0,
                key: 0x0002_3232_0001_0001,
                ciphertext: 0x1686_b323_2000_1000,
                text: "hi".to_string(),
            },
        };
        let record = MessageRecord::from_outcome(&delivered);
        assert_eq!(record.status, RecordStatus::Delivered);
        assert_eq!(record.plaintext.as_deref(), Some("hi"));

        let gone = HubOutcome::Disconnected { device: device(5), teardown: Teardown::WasNotConnected };
        assert_eq!(MessageRecord::from_outcome(&gone).status, RecordStatus::NotConnected);
    }

    #[test]
    fn rejected_record_keeps_reason() {
        let header = Header::new(device(9), MessageKind::Regular);
        let record = MessageRecord::rejected(header, &PairingError::UnknownDevice(device(9)));

        assert_eq!(record.status, RecordStatus::Rejected);
        assert_eq!(record.error.as_deref(), Some("unknown device: 9"));
    }

    #[test]
    fn json_lines_sink_writes_one_object_per_line() {
        let sink = JsonLinesSink::new(Vec::new());
        let message = Message::LastContact { device: device(5) };

        sink.record(&MessageRecord::sent(&message, None, None));
        sink.record(&MessageRecord::sent(&message, None, None));

        let output = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);

        let value: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["role"], "device");
        assert_eq!(value["device"], 5);
        assert_eq!(value["kind"], "LCM");
        assert_eq!(value["status"], "sent");
        assert!(value.get("params").is_none());
    }

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn captured(record: &MessageRecord) -> String {
        let buf = SharedBuf::default();
        let writer = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || TracingSink.record(record));

        let bytes = buf.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn tracing_sink_logs_recovered_plaintext() {
        let delivered = HubOutcome::Delivered {
            device: device(5),
            delivery: Delivery {
                key_index: 0,
                key: 0x0002_3232_0001_0001,
                ciphertext: 0x1686_b323_2000_1000,
                text: "hi".to_string(),
            },
        };

        let output = captured(&MessageRecord::from_outcome(&delivered));

        assert!(output.contains(r#"plaintext=Some("hi")"#), "{output}");
        assert!(output.contains(r#"keys=["0002323200010001"]"#), "{output}");
        assert!(output.contains(r#"ciphertext=Some("1686b32320001000")"#), "{output}");
    }

    #[test]
    fn tracing_sink_logs_params_and_keys() {
        let params = reference_params();
        let paired =
            HubOutcome::Paired { device: device(5), params, schedule: params.derive() };

        let output = captured(&MessageRecord::from_outcome(&paired));

        assert!(output.contains("p: 104729"), "{output}");
        assert!(output.contains("q: 65537"), "{output}");
        assert!(output.contains(r#"keys=["0002323200010001", ""#), "{output}");
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failing_writer_is_swallowed() {
        let sink = JsonLinesSink::new(FailingWriter);
        sink.record(&MessageRecord::sent(&Message::LastContact { device: device(1) }, None, None));
    }
}
