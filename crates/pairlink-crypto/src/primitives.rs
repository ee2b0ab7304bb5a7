//! Fixed-width arithmetic primitives driving key derivation.
//!
//! Every operation is unsigned 64-bit arithmetic that wraps silently. The
//! workspace builds with `overflow-checks = true`, so wrapping is spelled out
//! with the `wrapping_*` methods rather than left to the profile.

use crate::CryptoError;

/// Trial divisors used by [`is_pseudoprime`].
const TRIAL_DIVISORS: [u64; 6] = [2, 3, 5, 7, 11, 13];

/// Narrowest width that can produce a value passing [`is_pseudoprime`] (17).
pub const MIN_PRIME_BITS: u32 = 5;

/// Widest supported width.
pub const MAX_PRIME_BITS: u32 = 64;

/// Weak primality check: `n > 1` and not divisible by 2, 3, 5, 7, 11 or 13.
///
/// Accepts many composites (e.g. `17 * 19`). This is the protocol's
/// definition of "prime" and must stay as weak as it is: both roles generate
/// and accept parameters with it.
pub fn is_pseudoprime(n: u64) -> bool {
    n > 1 && TRIAL_DIVISORS.iter().all(|d| n % d != 0)
}

/// Draw `bits`-wide values from `draw` until one passes [`is_pseudoprime`].
///
/// `draw` is expected to return uniformly random `u64` values; only the low
/// `bits` bits are used. There is no iteration cap. With the weak check
/// roughly one draw in five succeeds, so the loop terminates quickly for any
/// reasonable source.
///
/// # Errors
///
/// `CryptoError::InvalidPrimeWidth` if `bits` is outside
/// `MIN_PRIME_BITS..=MAX_PRIME_BITS`.
pub fn generate_pseudoprime(
    bits: u32,
    mut draw: impl FnMut() -> u64,
) -> Result<u64, CryptoError> {
    if !(MIN_PRIME_BITS..=MAX_PRIME_BITS).contains(&bits) {
        return Err(CryptoError::InvalidPrimeWidth {
            bits,
            min: MIN_PRIME_BITS,
            max: MAX_PRIME_BITS,
        });
    }

    let mask = u64::MAX >> (64 - bits);
    loop {
        let candidate = draw() & mask;
        if is_pseudoprime(candidate) {
            return Ok(candidate);
        }
    }
}

/// `(x ^ y) + ((x & 0xFFFF) | (y << 16))`, wrapping.
pub fn mix(x: u64, y: u64) -> u64 {
    (x ^ y).wrapping_add((x & 0xFFFF) | (y << 16))
}

/// Rotate `x` right by 32 bits, then XOR with `y`.
pub fn generate(x: u64, y: u64) -> u64 {
    x.rotate_right(32) ^ y
}

/// `(x + y) ^ ((x << 8) | (y >> 8))`, wrapping.
pub fn mutate(x: u64, y: u64) -> u64 {
    x.wrapping_add(y) ^ ((x << 8) | (y >> 8))
}
