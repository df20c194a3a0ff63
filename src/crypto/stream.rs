//! AES-256-CBC with PKCS#7 padding, fed in arbitrary-sized chunks.
//!
//! Produces byte-identical output to a one-shot encryption of the
//! concatenated input, so chunk boundaries never show up in the ciphertext.

use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::generic_array::GenericArray;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use zeroize::Zeroizing;

use super::{BLOCK_LEN, IV_LEN, KEY_LEN};
use crate::error::{CryptError, CryptResult};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

pub struct ChunkEncryptor {
    cipher: Aes256CbcEnc,
    pending: Zeroizing<Vec<u8>>,
}

impl ChunkEncryptor {
    pub fn new(key: &[u8; KEY_LEN], iv: &[u8; IV_LEN]) -> Self {
        Self {
            cipher: Aes256CbcEnc::new(&(*key).into(), &(*iv).into()),
            pending: Zeroizing::new(Vec::with_capacity(BLOCK_LEN)),
        }
    }

    /// Encrypts every complete block available and appends it to `out`.
    pub fn update(&mut self, input: &[u8], out: &mut Vec<u8>) {
        self.pending.extend_from_slice(input);
        let full = self.pending.len() / BLOCK_LEN * BLOCK_LEN;
        if full == 0 {
            return;
        }

        let start = out.len();
        out.extend_from_slice(&self.pending[..full]);
        for block in out[start..].chunks_exact_mut(BLOCK_LEN) {
            self.cipher
                .encrypt_block_mut(GenericArray::from_mut_slice(block));
        }
        self.pending.drain(..full);
    }

    /// Pads and encrypts the remainder. Always emits exactly one block.
    pub fn finish(self, out: &mut Vec<u8>) {
        let tail = self.cipher.encrypt_padded_vec_mut::<Pkcs7>(&self.pending);
        out.extend_from_slice(&tail);
    }
}

pub struct ChunkDecryptor {
    cipher: Aes256CbcDec,
    pending: Vec<u8>,
}

impl ChunkDecryptor {
    pub fn new(key: &[u8; KEY_LEN], iv: &[u8; IV_LEN]) -> Self {
        Self {
            cipher: Aes256CbcDec::new(&(*key).into(), &(*iv).into()),
            pending: Vec::with_capacity(2 * BLOCK_LEN),
        }
    }

    /// Decrypts complete blocks, always holding back the last one so that
    /// padding can be stripped in [`ChunkDecryptor::finish`].
    pub fn update(&mut self, input: &[u8], out: &mut Vec<u8>) {
        self.pending.extend_from_slice(input);
        if self.pending.len() <= BLOCK_LEN {
            return;
        }

        let ready = (self.pending.len() - 1) / BLOCK_LEN * BLOCK_LEN;
        let start = out.len();
        out.extend_from_slice(&self.pending[..ready]);
        for block in out[start..].chunks_exact_mut(BLOCK_LEN) {
            self.cipher
                .decrypt_block_mut(GenericArray::from_mut_slice(block));
        }
        self.pending.drain(..ready);
    }

    pub fn finish(self, out: &mut Vec<u8>) -> CryptResult<()> {
        if self.pending.len() != BLOCK_LEN {
            return Err(CryptError::InvalidInputData(
                "ciphertext is not a whole number of blocks".into(),
            ));
        }
        let tail = self
            .cipher
            .decrypt_padded_vec_mut::<Pkcs7>(&self.pending)
            .map_err(|_| bad_padding())?;
        out.extend_from_slice(&tail);
        Ok(())
    }
}

/// Single-shot encryption of a buffer already in memory.
pub fn encrypt_buffer(key: &[u8; KEY_LEN], iv: &[u8; IV_LEN], plaintext: &[u8]) -> Vec<u8> {
    Aes256CbcEnc::new(&(*key).into(), &(*iv).into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// Single-shot decryption of a buffer already in memory.
pub fn decrypt_buffer(
    key: &[u8; KEY_LEN],
    iv: &[u8; IV_LEN],
    ciphertext: &[u8],
) -> CryptResult<Zeroizing<Vec<u8>>> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
        return Err(CryptError::InvalidInputData(
            "ciphertext is not a whole number of blocks".into(),
        ));
    }
    Aes256CbcDec::new(&(*key).into(), &(*iv).into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| bad_padding())
}

fn bad_padding() -> CryptError {
    CryptError::InvalidInputData("bad padding; wrong password or corrupted data".into())
}
