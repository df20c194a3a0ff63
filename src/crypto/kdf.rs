use pbkdf2::pbkdf2_hmac;
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use zeroize::Zeroizing;

use super::KEY_LEN;
use crate::error::{CryptError, CryptResult};

/// Pseudo-random function used inside PBKDF2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prf {
    HmacSha1,
    HmacSha256,
    HmacSha512,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    iterations: u32,
    prf: Prf,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            // fixed iteration count; frames do not record it
            iterations: 10_000,
            prf: Prf::HmacSha512,
        }
    }
}

impl KdfParams {
    pub fn new(iterations: u32, prf: Prf) -> CryptResult<Self> {
        let params = Self { iterations, prf };
        params.validate()?;
        Ok(params)
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn prf(&self) -> Prf {
        self.prf
    }

    pub fn validate(&self) -> CryptResult<()> {
        if self.iterations < 1 {
            return Err(CryptError::InvalidParameter(
                "pbkdf2 iterations must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

/// Trims surrounding whitespace and rejects blank passwords.
pub(crate) fn checked_password(password: &str) -> CryptResult<&str> {
    let trimmed = password.trim();
    if trimmed.is_empty() {
        return Err(CryptError::InvalidKey("password is null or blank".into()));
    }
    Ok(trimmed)
}

/// Derive a 256-bit key from the trimmed password and salt.
pub fn derive_key(
    password: &str,
    salt: &[u8],
    kdf: &KdfParams,
) -> CryptResult<Zeroizing<[u8; KEY_LEN]>> {
    kdf.validate()?;
    let password = checked_password(password)?.as_bytes();

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    match kdf.prf {
        Prf::HmacSha1 => pbkdf2_hmac::<Sha1>(password, salt, kdf.iterations, key.as_mut()),
        Prf::HmacSha256 => pbkdf2_hmac::<Sha256>(password, salt, kdf.iterations, key.as_mut()),
        Prf::HmacSha512 => pbkdf2_hmac::<Sha512>(password, salt, kdf.iterations, key.as_mut()),
    }

    Ok(key)
}
