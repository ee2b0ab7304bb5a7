//! Key schedule derivation from (P, Q, S) parameters.

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{
    CryptoError,
    primitives::{generate, generate_pseudoprime, mix, mutate},
};

/// Number of keys in every schedule.
pub const SCHEDULE_LEN: usize = 4;

/// Default bit width for the P and Q pseudoprimes.
pub const DEFAULT_PRIME_BITS: u32 = 16;

/// Seed parameters carried by `FirstContact` and `KeyUpdate` messages.
///
/// P and Q only pass the weak trial division check (see
/// [`crate::is_pseudoprime`]); S is an arbitrary 64-bit seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyScheduleParams {
    /// First pseudoprime, mixed with the evolving seed
    pub p: u64,
    /// Second pseudoprime, folded into every key and seed update
    pub q: u64,
    /// Initial seed
    pub s: u64,
}

impl KeyScheduleParams {
    /// Create parameters from explicit values.
    pub fn new(p: u64, q: u64, s: u64) -> Self {
        Self { p, q, s }
    }

    /// Draw fresh parameters: two pseudoprimes of `prime_bits` width, then a
    /// full 64-bit seed.
    ///
    /// Draw order is fixed (P, then Q, then S) so a seeded source always
    /// yields the same parameters.
    pub fn generate(prime_bits: u32, mut draw: impl FnMut() -> u64) -> Result<Self, CryptoError> {
        let p = generate_pseudoprime(prime_bits, &mut draw)?;
        let q = generate_pseudoprime(prime_bits, &mut draw)?;
        let s = draw();
        Ok(Self { p, q, s })
    }

    /// Derive the key schedule for these parameters.
    pub fn derive(&self) -> KeySchedule {
        KeySchedule::derive(self)
    }
}

/// Ordered sequence of exactly [`SCHEDULE_LEN`] derived keys.
///
/// Regeneration always replaces the whole schedule. Key material is wiped
/// when the schedule is dropped.
///
/// # Invariants
///
/// - Always holds exactly [`SCHEDULE_LEN`] keys.
/// - Identical parameters always derive identical schedules.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct KeySchedule {
    keys: [u64; SCHEDULE_LEN],
}

impl KeySchedule {
    /// Derive the schedule.
    ///
    /// Starting from `s = S`, each round computes `p0 = mix(P, s)`, appends
    /// `generate(p0, Q)` and evolves `s = mutate(s, Q)`. The evolved seed is
    /// discarded afterwards.
    pub fn derive(params: &KeyScheduleParams) -> Self {
        let mut keys = [0u64; SCHEDULE_LEN];
        let mut seed = params.s;

        for key in &mut keys {
            let p0 = mix(params.p, seed);
            *key = generate(p0, params.q);
            seed = mutate(seed, params.q);
        }

        seed.zeroize();
        Self { keys }
    }

    /// Key at `index`. `None` if `index >= SCHEDULE_LEN`.
    pub fn key(&self, index: usize) -> Option<u64> {
        self.keys.get(index).copied()
    }

    /// All keys in schedule order.
    pub fn keys(&self) -> &[u64; SCHEDULE_LEN] {
        &self.keys
    }

    /// Number of keys (always [`SCHEDULE_LEN`]).
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.keys.len()
    }
}

// Keys stay out of debug output
impl std::fmt::Debug for KeySchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySchedule").field("len", &self.len()).finish_non_exhaustive()
    }
}
