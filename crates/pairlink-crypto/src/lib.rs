//! Pairlink Key Schedule and Cipher Primitives
//!
//! Arithmetic building blocks shared by both protocol roles. Pure functions
//! with deterministic outputs. Callers provide randomness through a draw
//! closure so tests can replay exact parameter sequences.
//!
//! # Key Lifecycle
//!
//! ```text
//! (P, Q, S) parameters
//!        │
//!        ▼
//! mix → generate → mutate  (x4)
//!        │
//!        ▼
//! KeySchedule [K0, K1, K2, K3]
//!        │
//!        ▼
//! XOR + 4-bit rotation → 8-byte ciphertext block
//! ```
//!
//! # Security
//!
//! NONE. The primality test only rejects multiples of the first six primes
//! and the mixing functions are linear enough to be inverted by hand. These
//! algorithms are reproduced bit for bit so that independently built devices
//! and hubs agree on every key. Do not use them to protect real data.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cipher;
mod error;
pub mod primitives;
pub mod schedule;

pub use cipher::{BLOCK_LEN, decode, decode_block, encode};
pub use error::CryptoError;
pub use primitives::{generate, generate_pseudoprime, is_pseudoprime, mix, mutate};
pub use schedule::{DEFAULT_PRIME_BITS, KeySchedule, KeyScheduleParams, SCHEDULE_LEN};
