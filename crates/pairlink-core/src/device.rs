//! Device (client role) session state machine.
//!
//! A device owns one identity, at most one key schedule and a rotating key
//! index. Operations return the [`Message`] to put on the wire; moving the
//! bytes is the caller's job (see [`crate::DeviceLink`]).
//!
//! # State Machine
//!
//! ```text
//!                 open_session()
//! Unestablished ─────────────────► Established ──┐ send() / rotate_keys()
//!       ▲                               │  ◄──────┘
//!       └───────── close_session() ─────┘
//! ```
//!
//! `send`, `rotate_keys` and `close_session` fail with
//! `SessionNotEstablished` while Unestablished. `open_session` while
//! Established re-pairs with fresh parameters.

use pairlink_crypto::{KeySchedule, KeyScheduleParams, SCHEDULE_LEN, cipher};
use pairlink_proto::{DeviceId, Message};

use crate::{DeviceConfig, PairingError, env::Environment};

/// Device session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// No key schedule: before first contact or after last contact
    Unestablished,
    /// Key schedule installed; regular messages may be sent
    Established,
}

/// Active schedule plus the parameters it was derived from.
#[derive(Debug)]
struct ActiveSchedule {
    params: KeyScheduleParams,
    schedule: KeySchedule,
    key_index: u8,
}

/// Device (client) side of the protocol.
///
/// # Invariants
///
/// - The identity never changes after construction.
/// - `key_index() < SCHEDULE_LEN` whenever Established.
/// - Installing a schedule (first contact or key update) resets the key
///   index to 0.
pub struct Device<E: Environment> {
    env: E,
    identity: DeviceId,
    prime_bits: u32,
    active: Option<ActiveSchedule>,
}

impl<E: Environment> Device<E> {
    /// Create an Unestablished device.
    ///
    /// Draws a random identity from `env` unless the config fixes one.
    ///
    /// # Errors
    ///
    /// `PairingError::Crypto` if the configured prime width is unusable.
    pub fn new(env: E, config: DeviceConfig) -> Result<Self, PairingError> {
        config.validate()?;

        let identity =
            config.identity.unwrap_or_else(|| DeviceId::from_low_bits(env.random_u64()));

        tracing::debug!(device = %identity, prime_bits = config.prime_bits, "device created");

        Ok(Self { env, identity, prime_bits: config.prime_bits, active: None })
    }

    /// Device identity.
    pub fn identity(&self) -> DeviceId {
        self.identity
    }

    /// Current state.
    pub fn state(&self) -> DeviceState {
        if self.active.is_some() { DeviceState::Established } else { DeviceState::Unestablished }
    }

    /// Index of the key the next regular message will use. `None` while
    /// Unestablished.
    pub fn key_index(&self) -> Option<u8> {
        self.active.as_ref().map(|active| active.key_index)
    }

    /// Active key schedule. `None` while Unestablished.
    pub fn schedule(&self) -> Option<&KeySchedule> {
        self.active.as_ref().map(|active| &active.schedule)
    }

    /// Parameters of the active schedule. `None` while Unestablished.
    pub fn params(&self) -> Option<&KeyScheduleParams> {
        self.active.as_ref().map(|active| &active.params)
    }

    /// Pair with the hub using freshly generated parameters.
    ///
    /// Returns the `FirstContact` message carrying them.
    ///
    /// # Errors
    ///
    /// `PairingError::Crypto` if parameter generation fails.
    pub fn open_session(&mut self) -> Result<Message, PairingError> {
        let params = self.fresh_params()?;
        Ok(self.open_session_with(params))
    }

    /// Pair with the hub using caller-chosen parameters.
    pub fn open_session_with(&mut self, params: KeyScheduleParams) -> Message {
        if self.active.is_some() {
            tracing::debug!(device = %self.identity, "re-pairing over an active schedule");
        }

        self.install(params);
        tracing::info!(device = %self.identity, "session opened");

        Message::FirstContact { device: self.identity, params }
    }

    /// Encrypt `text` under the current key and advance the key index.
    ///
    /// At most the first 8 bytes of `text` are sent.
    ///
    /// # Errors
    ///
    /// `PairingError::SessionNotEstablished` while Unestablished.
    pub fn send(&mut self, text: &str) -> Result<Message, PairingError> {
        let active =
            self.active.as_mut().ok_or(PairingError::SessionNotEstablished { operation: "send" })?;

        let key_index = active.key_index;
        let key = active
            .schedule
            .key(usize::from(key_index))
            .ok_or(PairingError::KeyIndexOutOfRange { index: key_index, len: active.schedule.len() })?;

        let ciphertext = cipher::encode(text.as_bytes(), key);
        active.key_index = next_key_index(key_index);

        tracing::debug!(device = %self.identity, key_index, "regular message composed");

        Ok(Message::Regular { device: self.identity, key_index, ciphertext })
    }

    /// Replace the active schedule with freshly generated parameters.
    ///
    /// Returns the `KeyUpdate` message carrying them.
    ///
    /// # Errors
    ///
    /// - `PairingError::SessionNotEstablished` while Unestablished
    /// - `PairingError::Crypto` if parameter generation fails
    pub fn rotate_keys(&mut self) -> Result<Message, PairingError> {
        self.require_established("rotate keys")?;
        let params = self.fresh_params()?;
        self.rotate_keys_with(params)
    }

    /// Replace the active schedule with caller-chosen parameters.
    ///
    /// # Errors
    ///
    /// `PairingError::SessionNotEstablished` while Unestablished.
    pub fn rotate_keys_with(&mut self, params: KeyScheduleParams) -> Result<Message, PairingError> {
        self.require_established("rotate keys")?;

        self.install(params);
        tracing::info!(device = %self.identity, "keys rotated");

        Ok(Message::KeyUpdate { device: self.identity, params })
    }

    /// Tear down the session and wipe the local schedule.
    ///
    /// # Errors
    ///
    /// `PairingError::SessionNotEstablished` while Unestablished.
    pub fn close_session(&mut self) -> Result<Message, PairingError> {
        self.require_established("close session")?;

        // Dropping the schedule zeroizes it
        self.active = None;
        tracing::info!(device = %self.identity, "session closed");

        Ok(Message::LastContact { device: self.identity })
    }

    fn install(&mut self, params: KeyScheduleParams) {
        let schedule = params.derive();
        tracing::debug!(device = %self.identity, p = params.p, q = params.q, "key schedule derived");
        self.active = Some(ActiveSchedule { params, schedule, key_index: 0 });
    }

    fn fresh_params(&self) -> Result<KeyScheduleParams, PairingError> {
        Ok(KeyScheduleParams::generate(self.prime_bits, || self.env.random_u64())?)
    }

    fn require_established(&self, operation: &'static str) -> Result<(), PairingError> {
        if self.active.is_none() {
            return Err(PairingError::SessionNotEstablished { operation });
        }
        Ok(())
    }
}

fn next_key_index(index: u8) -> u8 {
    (index + 1) % SCHEDULE_LEN as u8
}
