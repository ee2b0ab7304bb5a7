//! Pairlink Protocol Core
//!
//! Device and hub state machines, the shared session table, the transport
//! seam and the drivers that join them. Protocol logic is synchronous and
//! owns no I/O; the drivers in [`link`] add async transport on top.
//!
//! # Session Lifecycle
//!
//! ```text
//! Device                                  Hub
//!   │ open_session()  ── FirstContact ──►  on_first_contact: derive + store
//!   │ send(text)      ── Regular ───────►  on_regular: decrypt with stored key
//!   │ rotate_keys()   ── KeyUpdate ─────►  on_key_update: replace schedule
//!   │ close_session() ── LastContact ───►  on_last_contact: remove entry
//! ```
//!
//! # Invariants
//!
//! - The device key index cycles 0, 1, 2, 3, 0 and resets to 0 whenever a
//!   schedule is installed.
//! - The hub holds at most one session per identity and never mutates the
//!   table on a failed handler.
//! - Both roles derive schedules with the same functions, so a device and a
//!   hub that saw the same parameters hold identical keys.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod audit;
mod config;
pub mod device;
pub mod env;
mod error;
pub mod hub;
pub mod link;
pub mod transport;

pub use audit::{JsonLinesSink, MessageRecord, RecordSink, TracingSink};
pub use config::{DeviceConfig, HubConfig};
pub use device::{Device, DeviceState};
pub use env::{Environment, SystemEnv};
pub use error::PairingError;
pub use hub::{
    Delivery, HubOutcome, HubSession, SessionTable, Teardown, dispatch, on_first_contact,
    on_key_update, on_last_contact, on_regular,
};
pub use link::{DeviceLink, HubEndpoint};
pub use transport::{ChannelTransport, Transport, TransportError};
