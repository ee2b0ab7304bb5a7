//! Device and hub configuration.

use std::time::Duration;

use pairlink_crypto::{
    CryptoError, DEFAULT_PRIME_BITS,
    primitives::{MAX_PRIME_BITS, MIN_PRIME_BITS},
};
use pairlink_proto::DeviceId;

/// Device configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Fixed identity. `None` draws a random 6-bit identity at creation.
    pub identity: Option<DeviceId>,
    /// Bit width of the P and Q pseudoprimes
    pub prime_bits: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self { identity: None, prime_bits: DEFAULT_PRIME_BITS }
    }
}

impl DeviceConfig {
    /// Configuration with a fixed identity and default prime width.
    pub fn with_identity(identity: DeviceId) -> Self {
        Self { identity: Some(identity), ..Self::default() }
    }

    /// Check the configuration can be used to generate parameters.
    ///
    /// # Errors
    ///
    /// `CryptoError::InvalidPrimeWidth` if `prime_bits` can never produce a
    /// pseudoprime.
    pub fn validate(&self) -> Result<(), CryptoError> {
        if !(MIN_PRIME_BITS..=MAX_PRIME_BITS).contains(&self.prime_bits) {
            return Err(CryptoError::InvalidPrimeWidth {
                bits: self.prime_bits,
                min: MIN_PRIME_BITS,
                max: MAX_PRIME_BITS,
            });
        }
        Ok(())
    }
}

/// Hub endpoint configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubConfig {
    /// How long to wait for the next frame. `None` waits indefinitely.
    pub receive_timeout: Option<Duration>,
}
