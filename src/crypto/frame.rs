use std::io::{self, Read};

use super::{IV_LEN, SALT_LEN, generate_iv, generate_salt};
use crate::error::{CryptError, CryptResult};

/// Fixed-size prefix of every symmetric frame: `IV || Salt`.
///
/// No magic, no version and no KDF parameters are stored; the iteration
/// count is implied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    iv: [u8; IV_LEN],
    salt: [u8; SALT_LEN],
}

impl FrameHeader {
    pub const LEN: usize = IV_LEN + SALT_LEN;

    pub fn new(iv: [u8; IV_LEN], salt: [u8; SALT_LEN]) -> Self {
        Self { iv, salt }
    }

    /// Fresh header with random IV and salt.
    pub fn random() -> CryptResult<Self> {
        Ok(Self::new(generate_iv()?, generate_salt()?))
    }

    pub fn iv(&self) -> &[u8; IV_LEN] {
        &self.iv
    }

    pub fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut buf = [0u8; Self::LEN];
        buf[..IV_LEN].copy_from_slice(&self.iv);
        buf[IV_LEN..].copy_from_slice(&self.salt);
        buf
    }

    pub fn from_bytes(data: &[u8]) -> CryptResult<(Self, usize)> {
        if data.len() < Self::LEN {
            return Err(truncated());
        }

        let mut offset = 0;
        let iv: [u8; IV_LEN] = data[offset..offset + IV_LEN]
            .try_into()
            .map_err(|_| truncated())?;
        offset += IV_LEN;

        let salt: [u8; SALT_LEN] = data[offset..offset + SALT_LEN]
            .try_into()
            .map_err(|_| truncated())?;
        offset += SALT_LEN;

        Ok((Self { iv, salt }, offset))
    }

    /// Reads exactly [`FrameHeader::LEN`] bytes from a stream.
    ///
    /// A stream that ends early is reported as invalid input, not as an I/O
    /// failure.
    pub fn read_from<R: Read + ?Sized>(reader: &mut R) -> CryptResult<Self> {
        let mut buf = [0u8; Self::LEN];
        match reader.read_exact(&mut buf) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Err(truncated()),
            Err(e) => return Err(CryptError::CannotRead(e)),
        }
        let (header, _) = Self::from_bytes(&buf)?;
        Ok(header)
    }
}

fn truncated() -> CryptError {
    CryptError::InvalidInputData("frame too short for IV and salt".into())
}
