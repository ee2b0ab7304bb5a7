//! Single-block XOR/rotation cipher used by Regular messages.
//!
//! A plaintext is at most one 8-byte block. Encoding pads (or truncates) the
//! text to 8 bytes, reads it as a big-endian `u64`, XORs the key in and
//! rotates right by 4 bits. Decoding is the exact algebraic inverse.
//!
//! The block is big-endian even though every other integer on the wire is
//! little-endian. Both roles must keep this asymmetry.

use crate::CryptoError;

/// Plaintext block length in bytes.
pub const BLOCK_LEN: usize = 8;

/// Rotation applied after the XOR.
const ROTATION: u32 = 4;

/// Encode up to [`BLOCK_LEN`] bytes of plaintext under `key`.
///
/// Shorter input is right-padded with zero bytes; longer input is truncated.
pub fn encode(plaintext: &[u8], key: u64) -> u64 {
    let mut block = [0u8; BLOCK_LEN];
    let len = plaintext.len().min(BLOCK_LEN);
    block[..len].copy_from_slice(&plaintext[..len]);

    (u64::from_be_bytes(block) ^ key).rotate_right(ROTATION)
}

/// Invert [`encode`], returning the raw 8-byte block (padding included).
pub fn decode_block(ciphertext: u64, key: u64) -> [u8; BLOCK_LEN] {
    (ciphertext.rotate_left(ROTATION) ^ key).to_be_bytes()
}

/// Invert [`encode`] and interpret the block as text.
///
/// Trailing zero bytes (the padding) are stripped. Interior zero bytes are
/// kept, so texts containing NUL do not round-trip exactly.
///
/// # Errors
///
/// `CryptoError::InvalidUtf8` if the block is not UTF-8. This is the normal
/// outcome of decoding with the wrong key, or of a multi-byte character cut
/// by truncation during [`encode`].
pub fn decode(ciphertext: u64, key: u64) -> Result<String, CryptoError> {
    let block = decode_block(ciphertext, key);
    let end = block.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);

    std::str::from_utf8(&block[..end])
        .map(str::to_owned)
        .map_err(|_| CryptoError::InvalidUtf8)
}
