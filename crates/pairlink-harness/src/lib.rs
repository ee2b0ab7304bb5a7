//! Deterministic simulation harness for Pairlink protocol testing.
//!
//! Seeded and Turmoil-based implementations of the Environment and Transport
//! traits, plus an in-memory audit sink, for reproducible device/hub runs
//! under simulated network conditions.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod memory_sink;
pub mod sim_env;
pub mod sim_transport;

pub use memory_sink::MemorySink;
pub use sim_env::SeededEnv;
pub use sim_transport::{SimListener, SimTransport};
