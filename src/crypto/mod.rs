//! Cryptographic building blocks for the engines.
//!
//! Provides key derivation, the `IV || Salt` frame header and the chunked
//! AES-256-CBC transform.

pub mod frame;
pub mod kdf;
pub mod stream;

use std::io;

use getrandom::fill;

pub use frame::FrameHeader;
pub use kdf::{KdfParams, Prf, derive_key};
pub use stream::{ChunkDecryptor, ChunkEncryptor};

use crate::error::{CryptError, CryptResult};

/// Length of the symmetric key (32 bytes / 256 bits).
pub const KEY_LEN: usize = 32;
/// Length of the salt; equal to the key size in bytes.
pub const SALT_LEN: usize = KEY_LEN;
/// Length of the IV; equal to the AES block size.
pub const IV_LEN: usize = 16;
/// AES block size.
pub const BLOCK_LEN: usize = 16;

/// Fill buffer with cryptographically secure random bytes
pub(crate) fn secure_random(buf: &mut [u8]) -> CryptResult<()> {
    fill(buf).map_err(|_| CryptError::CannotRead(io::Error::other("OS random generator unavailable")))
}

/// Generate salt
pub fn generate_salt() -> CryptResult<[u8; SALT_LEN]> {
    let mut salt = [0u8; SALT_LEN];
    secure_random(&mut salt)?;
    Ok(salt)
}

/// Generate IV
pub fn generate_iv() -> CryptResult<[u8; IV_LEN]> {
    let mut iv = [0u8; IV_LEN];
    secure_random(&mut iv)?;
    Ok(iv)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn salts_are_not_reused() {
        let a = generate_salt().unwrap();
        let b = generate_salt().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn iv_has_block_length() {
        assert_eq!(generate_iv().unwrap().len(), BLOCK_LEN);
    }
}
