//! RSA-OAEP encryption with a hybrid envelope for long inputs.
//!
//! Inputs up to [`allowed_input_size`] bytes are encrypted directly with
//! RSA/OAEP (SHA-256, MGF1-SHA-256). Longer inputs become an envelope:
//!
//! ```text
//! RSA-OAEP(password)  ||  IV(16) || Salt(32) || AES-256-CBC ciphertext
//! ^ modulus bytes        ^ symmetric frame under `password`
//! ```
//!
//! where `password` is a fresh random alphanumeric string.

use std::fmt;
use std::io::{Cursor, Read};
use std::str::FromStr;

use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::config::CryptoConfig;
use crate::crypto::FrameHeader;
use crate::error::{CryptError, CryptResult};
use crate::input::{
    Input, Source, TextEncoding, decode_base64, encode_base64, normalize, read_prefix,
};
use crate::output::{Destination, Outcome, Role, resolve};
use crate::password::{generate_secure_random_password, standard_symbols};
use crate::progress::Monitor;
use crate::symmetric;

/// Digest output length of the OAEP hash (SHA-256).
const OAEP_HASH_LEN: usize = 32;

/// RSA modulus sizes offered for key generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeySize {
    Bits2048,
    #[default]
    Bits4096,
}

impl KeySize {
    pub fn bits(self) -> usize {
        match self {
            KeySize::Bits2048 => 2048,
            KeySize::Bits4096 => 4096,
        }
    }
}

impl fmt::Display for KeySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

impl FromStr for KeySize {
    type Err = CryptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "2048" => Ok(KeySize::Bits2048),
            "4096" => Ok(KeySize::Bits4096),
            other => Err(CryptError::InvalidParameter(format!(
                "unsupported key size: {other} (expected 2048 or 4096)"
            ))),
        }
    }
}

#[derive(Clone)]
pub struct KeyPair {
    private: RsaPrivateKey,
    public: RsaPublicKey,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("bits", &self.public.n().bits())
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    pub fn generate(size: KeySize) -> CryptResult<Self> {
        debug!(bits = size.bits(), "generating RSA key pair");
        let private = RsaPrivateKey::new(&mut OsRng, size.bits())
            .map_err(|e| CryptError::InvalidParameter(format!("key generation failed: {e}")))?;
        Ok(Self::from_private(private))
    }

    pub fn from_private(private: RsaPrivateKey) -> Self {
        let public = private.to_public_key();
        Self { private, public }
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private
    }
}

/// SubjectPublicKeyInfo DER, URL-safe base64.
pub fn public_key_to_base64(key: &RsaPublicKey) -> CryptResult<String> {
    let der = key
        .to_public_key_der()
        .map_err(|e| CryptError::InvalidKey(e.to_string()))?;
    Ok(encode_base64(der.as_bytes()))
}

pub fn public_key_from_base64(encoded: &str) -> CryptResult<RsaPublicKey> {
    let der = decode_base64(encoded)?;
    RsaPublicKey::from_public_key_der(&der)
        .map_err(|e| CryptError::InvalidKey(format!("not an RSA public key: {e}")))
}

/// PKCS#8 DER.
pub fn private_key_to_der(key: &RsaPrivateKey) -> CryptResult<Zeroizing<Vec<u8>>> {
    let doc = key
        .to_pkcs8_der()
        .map_err(|e| CryptError::InvalidKey(e.to_string()))?;
    Ok(Zeroizing::new(doc.as_bytes().to_vec()))
}

pub fn private_key_from_der(der: &[u8]) -> CryptResult<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs8_der(der)
        .map_err(|e| CryptError::InvalidKey(format!("not an RSA private key: {e}")))
}

pub fn private_key_to_base64(key: &RsaPrivateKey) -> CryptResult<Zeroizing<String>> {
    Ok(Zeroizing::new(encode_base64(&private_key_to_der(key)?)))
}

pub fn private_key_from_base64(encoded: &str) -> CryptResult<RsaPrivateKey> {
    let der = Zeroizing::new(decode_base64(encoded)?);
    private_key_from_der(&der)
}

/// Largest plaintext encrypted directly: `floor(bits / 8) - 2 * 32 - 2`.
pub fn allowed_input_size(key: &RsaPublicKey) -> usize {
    (key.n().bits() / 8).saturating_sub(2 * OAEP_HASH_LEN + 2)
}

pub fn encrypt(
    config: &CryptoConfig,
    input: Input,
    public_key: &RsaPublicKey,
    destination: Destination,
    monitor: &mut Monitor,
) -> CryptResult<Outcome> {
    let input = normalize(input, TextEncoding::Utf8)?;
    let mut sink = resolve(config, destination, &input, Role::Encrypt)?.open()?;
    let allowed = allowed_input_size(public_key);

    match input.source {
        Source::Memory(data) => {
            let data = Zeroizing::new(data);
            if data.len() <= allowed {
                sink.put(&oaep_encrypt(public_key, &data)?)?;
            } else {
                debug!(len = data.len(), allowed, "input too long for RSA, using envelope");
                let password = envelope_password(config)?;
                sink.put(&oaep_encrypt(public_key, password.as_bytes())?)?;
                sink.put(&symmetric::encrypt_buffer(config.kdf(), &data, &password)?)?;
            }
        }
        Source::Stream { mut reader, len } => {
            let prefix = Zeroizing::new(read_prefix(&mut reader, allowed + 1)?);
            if prefix.len() <= allowed {
                monitor.start(len);
                monitor.checkpoint()?;
                sink.put(&oaep_encrypt(public_key, &prefix)?)?;
                monitor.advance(prefix.len());
            } else {
                debug!(allowed, "stream too long for RSA, using envelope");
                let password = envelope_password(config)?;
                sink.put(&oaep_encrypt(public_key, password.as_bytes())?)?;

                monitor.start(len);
                let mut payload = Cursor::new(prefix).chain(reader);
                symmetric::encrypt_stream(config, &mut payload, &mut sink, &password, monitor)?;
            }
        }
    }

    let outcome = sink.finish()?;
    info!("asymmetric encryption finished");
    Ok(outcome)
}

pub fn decrypt(
    config: &CryptoConfig,
    input: Input,
    private_key: &RsaPrivateKey,
    destination: Destination,
    monitor: &mut Monitor,
) -> CryptResult<Outcome> {
    let input = normalize(input, TextEncoding::Base64)?;
    let mut sink = resolve(config, destination, &input, Role::Decrypt)?.open()?;
    let k = private_key.size();

    match input.source {
        Source::Memory(data) if data.len() <= k => {
            sink.put(&oaep_decrypt(private_key, &data)?)?;
        }
        Source::Memory(data) => {
            let password = recover_password(private_key, &data[..k])?;
            let plaintext = symmetric::decrypt_buffer(config.kdf(), &data[k..], &password)?;
            sink.put(&plaintext)?;
        }
        Source::Stream { mut reader, len } => {
            let mut prefix = read_prefix(&mut reader, k + 1)?;
            if prefix.len() <= k {
                monitor.start(len);
                monitor.checkpoint()?;
                sink.put(&oaep_decrypt(private_key, &prefix)?)?;
                monitor.advance(prefix.len());
            } else {
                let password = recover_password(private_key, &prefix[..k])?;
                let rest = prefix.split_off(k);

                monitor.start(len.map(|l| l.saturating_sub((k + FrameHeader::LEN) as u64)));
                let mut payload = Cursor::new(rest).chain(reader);
                symmetric::decrypt_stream(config, &mut payload, &mut sink, &password, monitor)?;
            }
        }
    }

    let outcome = sink.finish()?;
    info!("asymmetric decryption finished");
    Ok(outcome)
}

fn envelope_password(config: &CryptoConfig) -> CryptResult<Zeroizing<String>> {
    generate_secure_random_password(config.hybrid_password_len(), &standard_symbols())
}

fn oaep_encrypt(key: &RsaPublicKey, data: &[u8]) -> CryptResult<Vec<u8>> {
    key.encrypt(&mut OsRng, Oaep::new::<Sha256>(), data)
        .map_err(|e| CryptError::InvalidKey(format!("RSA encryption failed: {e}")))
}

fn oaep_decrypt(key: &RsaPrivateKey, data: &[u8]) -> CryptResult<Vec<u8>> {
    key.decrypt(Oaep::new::<Sha256>(), data)
        .map_err(|_| CryptError::InvalidInputData("RSA decryption failed".into()))
}

/// Unwraps the envelope password. A key mismatch is a key problem; a
/// password that is not usable text means the envelope itself is broken.
fn recover_password(key: &RsaPrivateKey, wrapped: &[u8]) -> CryptResult<Zeroizing<String>> {
    let raw = key
        .decrypt(Oaep::new::<Sha256>(), wrapped)
        .map_err(|_| CryptError::InvalidKey("private key does not open this envelope".into()))?;
    let password = String::from_utf8(raw)
        .map(Zeroizing::new)
        .map_err(|_| CryptError::InvalidInputData("envelope password is not text".into()))?;
    if password.trim().is_empty() {
        return Err(CryptError::InvalidInputData("envelope password is blank".into()));
    }
    Ok(password)
}
