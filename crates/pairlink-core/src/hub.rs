//! Hub (server role) session table and frame handlers.
//!
//! The hub keeps one entry per paired device identity: the parameters the
//! device last announced and the key schedule derived from them. Each
//! handler validates the message kind, then performs its read-modify-write
//! under the table lock.
//!
//! # Invariants
//!
//! - An entry exists for a device iff its last processed frame was a
//!   `FirstContact` or `KeyUpdate`.
//! - A stored schedule always equals `KeySchedule::derive(&params)` for the
//!   stored params.
//! - A handler that returns an error leaves the table unchanged.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use pairlink_crypto::{KeySchedule, KeyScheduleParams, cipher};
use pairlink_proto::{DeviceId, Message, MessageKind};

use crate::PairingError;

/// Hub-side state for one paired device.
#[derive(Debug, Clone, PartialEq)]
pub struct HubSession {
    /// Parameters from the latest `FirstContact` or `KeyUpdate`
    pub params: KeyScheduleParams,
    /// Schedule derived from `params`
    pub schedule: KeySchedule,
}

impl HubSession {
    fn derive(params: KeyScheduleParams) -> Self {
        Self { params, schedule: params.derive() }
    }
}

/// Mapping from device identity to hub session.
///
/// Shared across tasks through `Arc`. A single table-wide lock makes every
/// handler atomic with respect to the others.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: Mutex<HashMap<DeviceId, HubSession>>,
}

impl SessionTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of paired devices.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no device is paired.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether `device` has a session.
    pub fn contains(&self, device: DeviceId) -> bool {
        self.lock().contains_key(&device)
    }

    /// Snapshot of the session for `device`.
    pub fn session(&self, device: DeviceId) -> Option<HubSession> {
        self.lock().get(&device).cloned()
    }

    /// Paired identities in ascending order.
    pub fn devices(&self) -> Vec<DeviceId> {
        let mut devices: Vec<DeviceId> = self.lock().keys().copied().collect();
        devices.sort_unstable();
        devices
    }

    // The map is never left half-updated, so a poisoned lock is still usable
    fn lock(&self) -> MutexGuard<'_, HashMap<DeviceId, HubSession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Result of a `LastContact`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    /// Session existed and was removed
    Removed,
    /// No session existed for the identity
    WasNotConnected,
}

/// A decrypted regular message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Index carried by the frame
    pub key_index: u8,
    /// Key the hub used
    pub key: u64,
    /// Ciphertext carried by the frame
    pub ciphertext: u64,
    /// Recovered plaintext
    pub text: String,
}

/// What the hub did with a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum HubOutcome {
    /// `FirstContact` stored a new session
    Paired {
        /// Sending device
        device: DeviceId,
        /// Announced parameters
        params: KeyScheduleParams,
        /// Derived schedule
        schedule: KeySchedule,
    },
    /// `Regular` was decrypted
    Delivered {
        /// Sending device
        device: DeviceId,
        /// Decryption details
        delivery: Delivery,
    },
    /// `KeyUpdate` replaced a session
    KeysUpdated {
        /// Sending device
        device: DeviceId,
        /// New parameters
        params: KeyScheduleParams,
        /// New schedule
        schedule: KeySchedule,
    },
    /// `LastContact` was processed
    Disconnected {
        /// Sending device
        device: DeviceId,
        /// Whether a session was removed
        teardown: Teardown,
    },
}

impl HubOutcome {
    /// Device the outcome concerns.
    pub fn device(&self) -> DeviceId {
        match self {
            Self::Paired { device, .. }
            | Self::Delivered { device, .. }
            | Self::KeysUpdated { device, .. }
            | Self::Disconnected { device, .. } => *device,
        }
    }

    /// Kind of the frame that produced this outcome.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Paired { .. } => MessageKind::FirstContact,
            Self::Delivered { .. } => MessageKind::Regular,
            Self::KeysUpdated { .. } => MessageKind::KeyUpdate,
            Self::Disconnected { .. } => MessageKind::LastContact,
        }
    }
}

/// Pair a device: derive its schedule and store it, replacing any existing
/// entry for the same identity.
///
/// # Errors
///
/// `PairingError::InvalidFrameTag` if `message` is not a `FirstContact`.
pub fn on_first_contact(
    table: &SessionTable,
    message: &Message,
) -> Result<KeySchedule, PairingError> {
    let Message::FirstContact { device, params } = *message else {
        return Err(wrong_kind(MessageKind::FirstContact, message));
    };

    let session = HubSession::derive(params);
    let schedule = session.schedule.clone();

    if table.lock().insert(device, session).is_some() {
        tracing::debug!(%device, "first contact replaced an existing session");
    }
    tracing::info!(%device, "device paired");

    Ok(schedule)
}

/// Decrypt a regular message with the sender's stored schedule.
///
/// # Errors
///
/// - `PairingError::InvalidFrameTag` if `message` is not a `Regular`
/// - `PairingError::UnknownDevice` if the sender has no session
/// - `PairingError::KeyIndexOutOfRange` if the index does not address a key
/// - `PairingError::Crypto` if the recovered block is not UTF-8
pub fn on_regular(table: &SessionTable, message: &Message) -> Result<String, PairingError> {
    deliver(table, message).map(|delivery| delivery.text)
}

/// Replace a paired device's schedule.
///
/// # Errors
///
/// - `PairingError::InvalidFrameTag` if `message` is not a `KeyUpdate`
/// - `PairingError::UnknownDevice` if the sender has no session
pub fn on_key_update(table: &SessionTable, message: &Message) -> Result<KeySchedule, PairingError> {
    let Message::KeyUpdate { device, params } = *message else {
        return Err(wrong_kind(MessageKind::KeyUpdate, message));
    };

    let mut sessions = table.lock();
    let entry = sessions.get_mut(&device).ok_or(PairingError::UnknownDevice(device))?;

    *entry = HubSession::derive(params);
    let schedule = entry.schedule.clone();
    drop(sessions);

    tracing::info!(%device, "device keys updated");
    Ok(schedule)
}

/// Remove a device's session if it has one.
///
/// Tearing down an unknown identity is not an error.
///
/// # Errors
///
/// `PairingError::InvalidFrameTag` if `message` is not a `LastContact`.
pub fn on_last_contact(table: &SessionTable, message: &Message) -> Result<Teardown, PairingError> {
    let Message::LastContact { device } = *message else {
        return Err(wrong_kind(MessageKind::LastContact, message));
    };

    let teardown = match table.lock().remove(&device) {
        Some(_) => Teardown::Removed,
        None => Teardown::WasNotConnected,
    };
    tracing::info!(%device, ?teardown, "device disconnected");

    Ok(teardown)
}

/// Decode a frame of any kind and route it to its handler.
///
/// # Errors
///
/// - `PairingError::MalformedFrame` if the bytes do not decode
/// - any error of the selected handler
pub fn dispatch(table: &SessionTable, frame: &[u8]) -> Result<HubOutcome, PairingError> {
    let message = Message::decode(frame)?;
    let device = message.device();

    tracing::debug!(%device, kind = ?message.kind(), "dispatching frame");

    let outcome = match message {
        Message::FirstContact { params, .. } => {
            let schedule = on_first_contact(table, &message)?;
            HubOutcome::Paired { device, params, schedule }
        },
        Message::Regular { .. } => {
            HubOutcome::Delivered { device, delivery: deliver(table, &message)? }
        },
        Message::KeyUpdate { params, .. } => {
            let schedule = on_key_update(table, &message)?;
            HubOutcome::KeysUpdated { device, params, schedule }
        },
        Message::LastContact { .. } => {
            HubOutcome::Disconnected { device, teardown: on_last_contact(table, &message)? }
        },
    };

    Ok(outcome)
}

fn deliver(table: &SessionTable, message: &Message) -> Result<Delivery, PairingError> {
    let Message::Regular { device, key_index, ciphertext } = *message else {
        return Err(wrong_kind(MessageKind::Regular, message));
    };

    let key = {
        let sessions = table.lock();
        let session = sessions.get(&device).ok_or(PairingError::UnknownDevice(device))?;
        session
            .schedule
            .key(usize::from(key_index))
            .ok_or(PairingError::KeyIndexOutOfRange { index: key_index, len: session.schedule.len() })?
    };

    let text = cipher::decode(ciphertext, key)?;
    tracing::debug!(%device, key_index, "regular message decrypted");

    Ok(Delivery { key_index, key, ciphertext, text })
}

fn wrong_kind(expected: MessageKind, message: &Message) -> PairingError {
    PairingError::InvalidFrameTag { expected, actual: message.kind() }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use pairlink_crypto::CryptoError;

    use super::*;

    fn device(id: u8) -> DeviceId {
        DeviceId::new(id).unwrap()
    }

    fn reference_params() -> KeyScheduleParams {
        KeyScheduleParams::new(104_729, 65_537, 0)
    }

    fn paired(id: u8, params: KeyScheduleParams) -> SessionTable {
        let table = SessionTable::new();
        on_first_contact(&table, &Message::FirstContact { device: device(id), params }).unwrap();
        table
    }

    fn regular(id: u8, key_index: u8, text: &str, key: u64) -> Message {
        Message::Regular { device: device(id), key_index, ciphertext: cipher::encode(text.as_bytes(), key) }
    }

    #[test]
    fn first_contact_stores_derived_schedule() {
        let table = SessionTable::new();
        let schedule = on_first_contact(
            &table,
            &Message::FirstContact { device: device(5), params: reference_params() },
        )
        .unwrap();

        assert_eq!(schedule.keys()[0], 0x0002_3232_0001_0001);
        let session = table.session(device(5)).unwrap();
        assert_eq!(session.params, reference_params());
        assert_eq!(session.schedule, schedule);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn first_contact_overwrites_existing_entry() {
        let table = paired(5, reference_params());
        let fresh = KeyScheduleParams::new(7919, 65521, 0xDEAD_BEEF);

        on_first_contact(&table, &Message::FirstContact { device: device(5), params: fresh }).unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(table.session(device(5)).unwrap().params, fresh);
    }

    #[test]
    fn regular_recovers_text() {
        let table = paired(5, reference_params());
        let message = Message::Regular { device: device(5), key_index: 0, ciphertext: 0x1686_b323_2000_1000 };

        assert_eq!(on_regular(&table, &message).unwrap(), "hi");
    }

    #[test]
    fn regular_uses_indexed_key() {
        let table = paired(5, reference_params());
        let key = reference_params().derive().keys()[3];

        assert_eq!(on_regular(&table, &regular(5, 3, "pairlink", key)).unwrap(), "pairlink");
    }

    #[test]
    fn regular_from_unknown_device_is_rejected() {
        let table = SessionTable::new();

        assert_eq!(
            on_regular(&table, &regular(9, 0, "hi", 1)),
            Err(PairingError::UnknownDevice(device(9)))
        );
        assert!(table.is_empty());
    }

    #[test]
    fn regular_with_index_past_schedule_is_rejected() {
        let table = paired(5, reference_params());
        let before = table.session(device(5));

        assert_eq!(
            on_regular(&table, &regular(5, 4, "hi", 1)),
            Err(PairingError::KeyIndexOutOfRange { index: 4, len: 4 })
        );
        assert_eq!(table.session(device(5)), before);
    }

    #[test]
    fn regular_with_non_utf8_block_is_crypto_error() {
        let table = paired(5, reference_params());
        let key = reference_params().derive().keys()[0];
        let ciphertext = cipher::encode(&[0xFF, 0xFE], key);
        let message = Message::Regular { device: device(5), key_index: 0, ciphertext };

        assert_eq!(on_regular(&table, &message), Err(PairingError::Crypto(CryptoError::InvalidUtf8)));
    }

    #[test]
    fn key_update_replaces_schedule() {
        let table = paired(5, reference_params());
        let fresh = KeyScheduleParams::new(7919, 65521, 0xDEAD_BEEF);

        let schedule =
            on_key_update(&table, &Message::KeyUpdate { device: device(5), params: fresh }).unwrap();

        assert_eq!(schedule.keys()[0], 0x9d9c_beef_0000_215f);
        assert_eq!(table.session(device(5)).unwrap(), HubSession { params: fresh, schedule });
    }

    #[test]
    fn stale_key_fails_after_key_update() {
        let table = paired(5, reference_params());
        let stale = regular(5, 0, "hi", reference_params().derive().keys()[0]);

        let fresh = KeyScheduleParams::new(7919, 65521, 0xDEAD_BEEF);
        on_key_update(&table, &Message::KeyUpdate { device: device(5), params: fresh }).unwrap();

        assert_ne!(on_regular(&table, &stale).ok().as_deref(), Some("hi"));
    }

    #[test]
    fn key_update_for_unknown_device_is_rejected() {
        let table = SessionTable::new();
        let message = Message::KeyUpdate { device: device(2), params: reference_params() };

        assert_eq!(on_key_update(&table, &message), Err(PairingError::UnknownDevice(device(2))));
        assert!(!table.contains(device(2)));
    }

    #[test]
    fn last_contact_is_idempotent() {
        let table = paired(5, reference_params());
        let message = Message::LastContact { device: device(5) };

        assert_eq!(on_last_contact(&table, &message), Ok(Teardown::Removed));
        assert_eq!(on_last_contact(&table, &message), Ok(Teardown::WasNotConnected));
        assert!(!table.contains(device(5)));
    }

    #[test]
    fn last_contact_leaves_other_devices() {
        let table = paired(5, reference_params());
        on_first_contact(&table, &Message::FirstContact { device: device(6), params: reference_params() })
            .unwrap();

        on_last_contact(&table, &Message::LastContact { device: device(5) }).unwrap();

        assert_eq!(table.devices(), vec![device(6)]);
    }

    #[test]
    fn handlers_reject_wrong_variant() {
        let table = paired(5, reference_params());
        let last = Message::LastContact { device: device(5) };

        assert_eq!(
            on_first_contact(&table, &last),
            Err(PairingError::InvalidFrameTag {
                expected: MessageKind::FirstContact,
                actual: MessageKind::LastContact,
            })
        );
        assert!(matches!(on_regular(&table, &last), Err(PairingError::InvalidFrameTag { .. })));
        assert!(matches!(on_key_update(&table, &last), Err(PairingError::InvalidFrameTag { .. })));
        assert!(matches!(
            on_last_contact(&table, &regular(5, 0, "x", 0)),
            Err(PairingError::InvalidFrameTag { .. })
        ));
        assert!(table.contains(device(5)));
    }

    #[test]
    fn dispatch_routes_every_kind() {
        let table = SessionTable::new();
        let first = Message::FirstContact { device: device(5), params: reference_params() };

        let outcome = dispatch(&table, &first.to_bytes()).unwrap();
        assert!(matches!(outcome, HubOutcome::Paired { .. }));
        assert_eq!(outcome.kind(), MessageKind::FirstContact);

        let frame = Message::Regular { device: device(5), key_index: 0, ciphertext: 0x1686_b323_2000_1000 };
        let HubOutcome::Delivered { delivery, .. } = dispatch(&table, &frame.to_bytes()).unwrap() else {
            unreachable!("regular frames are delivered");
        };
        assert_eq!(delivery.text, "hi");
        assert_eq!(delivery.key, 0x0002_3232_0001_0001);

        let update = Message::KeyUpdate { device: device(5), params: reference_params() };
        assert!(matches!(dispatch(&table, &update.to_bytes()), Ok(HubOutcome::KeysUpdated { .. })));

        let last = Message::LastContact { device: device(5) };
        assert_eq!(
            dispatch(&table, &last.to_bytes()).unwrap(),
            HubOutcome::Disconnected { device: device(5), teardown: Teardown::Removed }
        );
    }

    #[test]
    fn dispatch_rejects_truncated_frame() {
        let table = SessionTable::new();
        assert!(matches!(dispatch(&table, &[0x14, 0x00]), Err(PairingError::MalformedFrame(_))));
        assert!(matches!(dispatch(&table, &[]), Err(PairingError::MalformedFrame(_))));
    }

    #[test]
    fn concurrent_devices_do_not_interfere() {
        let table = Arc::new(SessionTable::new());

        thread::scope(|scope| {
            for id in 0..16u8 {
                let table = Arc::clone(&table);
                scope.spawn(move || {
                    let params = KeyScheduleParams::new(104_729, 65_537, u64::from(id));
                    on_first_contact(&table, &Message::FirstContact { device: device(id), params })
                        .unwrap();

                    let keys = params.derive();
                    for round in 0..8u8 {
                        let index = round % 4;
                        let message = regular(id, index, "ping", keys.keys()[usize::from(index)]);
                        assert_eq!(on_regular(&table, &message).unwrap(), "ping");
                    }
                });
            }
        });

        assert_eq!(table.len(), 16);
    }
}
