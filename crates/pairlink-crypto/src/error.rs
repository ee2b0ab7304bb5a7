//! Error types for key schedule and cipher operations.

use thiserror::Error;

/// Errors from the crypto primitives.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Requested pseudoprime width can never yield a passing value.
    ///
    /// The smallest value accepted by the trial division check is 17, so
    /// widths below 5 bits would loop forever. Widths above 64 do not fit.
    #[error("invalid pseudoprime width: {bits} bits (supported: {min}..={max})")]
    InvalidPrimeWidth {
        /// Width that was requested
        bits: u32,
        /// Smallest supported width
        min: u32,
        /// Largest supported width
        max: u32,
    },

    /// Decrypted block is not valid UTF-8 text.
    #[error("decoded block is not valid UTF-8 text")]
    InvalidUtf8,
}
