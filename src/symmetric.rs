//! Password-based AES-256-CBC.
//!
//! Output frame: `IV(16) || Salt(32) || AES-256-CBC/PKCS#7 ciphertext`, with
//! the key derived from the trimmed password by PBKDF2.

use std::io::{Read, Write};

use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::config::CryptoConfig;
use crate::crypto::kdf::checked_password;
use crate::crypto::stream::{decrypt_buffer as cbc_decrypt, encrypt_buffer as cbc_encrypt};
use crate::crypto::{ChunkDecryptor, ChunkEncryptor, FrameHeader, KdfParams, derive_key};
use crate::error::{CryptError, CryptResult};
use crate::input::{Input, Source, TextEncoding, for_each_chunk, normalize};
use crate::output::{Destination, Outcome, Role, resolve};
use crate::password::generate_secure_random_password;
use crate::progress::Monitor;

/// Length of a password synthesised by [`encrypt_with_generated_password`].
pub const GENERATED_PASSWORD_LEN: usize = 64;

pub fn encrypt(
    config: &CryptoConfig,
    input: Input,
    password: &str,
    destination: Destination,
    monitor: &mut Monitor,
) -> CryptResult<Outcome> {
    let password = checked_password(password)?;
    let input = normalize(input, TextEncoding::Utf8)?;
    let mut sink = resolve(config, destination, &input, Role::Encrypt)?.open()?;

    match input.source {
        Source::Memory(plaintext) => {
            let plaintext = Zeroizing::new(plaintext);
            sink.put(&encrypt_buffer(config.kdf(), &plaintext, password)?)?;
        }
        Source::Stream { mut reader, len } => {
            monitor.start(len);
            encrypt_stream(config, &mut reader, &mut sink, password, monitor)?;
        }
    }

    let outcome = sink.finish()?;
    info!("symmetric encryption finished");
    Ok(outcome)
}

/// Encrypts under a freshly generated 256-bit password and returns it
/// alongside the result.
pub fn encrypt_with_generated_password(
    config: &CryptoConfig,
    input: Input,
    destination: Destination,
    monitor: &mut Monitor,
) -> CryptResult<(Outcome, Zeroizing<String>)> {
    let hex_digits: Vec<char> = "0123456789abcdef".chars().collect();
    let password = generate_secure_random_password(GENERATED_PASSWORD_LEN, &hex_digits)?;
    let outcome = encrypt(config, input, &password, destination, monitor)?;
    Ok((outcome, password))
}

pub fn decrypt(
    config: &CryptoConfig,
    input: Input,
    password: &str,
    destination: Destination,
    monitor: &mut Monitor,
) -> CryptResult<Outcome> {
    let password = checked_password(password)?;
    let input = normalize(input, TextEncoding::Base64)?;
    let mut sink = resolve(config, destination, &input, Role::Decrypt)?.open()?;

    match input.source {
        Source::Memory(frame) => {
            let plaintext = decrypt_buffer(config.kdf(), &frame, password)?;
            sink.put(&plaintext)?;
        }
        Source::Stream { mut reader, len } => {
            monitor.start(len.map(|l| l.saturating_sub(FrameHeader::LEN as u64)));
            decrypt_stream(config, &mut reader, &mut sink, password, monitor)?;
        }
    }

    let outcome = sink.finish()?;
    info!("symmetric decryption finished");
    Ok(outcome)
}

/// Whole frame for a buffer already in memory.
pub(crate) fn encrypt_buffer(
    kdf: &KdfParams,
    plaintext: &[u8],
    password: &str,
) -> CryptResult<Vec<u8>> {
    let header = FrameHeader::random()?;
    let key = derive_key(password, header.salt(), kdf)?;

    let mut frame = header.to_bytes().to_vec();
    frame.extend_from_slice(&cbc_encrypt(&key, header.iv(), plaintext));
    Ok(frame)
}

pub(crate) fn decrypt_buffer(
    kdf: &KdfParams,
    frame: &[u8],
    password: &str,
) -> CryptResult<Zeroizing<Vec<u8>>> {
    let (header, offset) = FrameHeader::from_bytes(frame)?;
    let key = derive_key(password, header.salt(), kdf)?;
    cbc_decrypt(&key, header.iv(), &frame[offset..])
}

/// Writes the frame header, then ciphertext chunk by chunk.
pub(crate) fn encrypt_stream<R, W>(
    config: &CryptoConfig,
    reader: &mut R,
    writer: &mut W,
    password: &str,
    monitor: &mut Monitor,
) -> CryptResult<()>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let header = FrameHeader::random()?;
    let key = derive_key(password, header.salt(), config.kdf())?;
    write(writer, &header.to_bytes())?;

    let mut cipher = ChunkEncryptor::new(&key, header.iv());
    let mut out = Vec::with_capacity(config.chunk_size() + 16);
    let read = for_each_chunk(reader, config.chunk_size(), monitor, |chunk| {
        out.clear();
        cipher.update(chunk, &mut out);
        write(writer, &out)
    })?;

    out.clear();
    cipher.finish(&mut out);
    write(writer, &out)?;
    debug!(bytes = read, "encrypted stream");
    Ok(())
}

/// Reads the frame header before any key derivation, then decrypts the rest.
pub(crate) fn decrypt_stream<R, W>(
    config: &CryptoConfig,
    reader: &mut R,
    writer: &mut W,
    password: &str,
    monitor: &mut Monitor,
) -> CryptResult<()>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let header = FrameHeader::read_from(reader)?;
    let key = derive_key(password, header.salt(), config.kdf())?;

    let mut cipher = ChunkDecryptor::new(&key, header.iv());
    let mut out = Zeroizing::new(Vec::with_capacity(config.chunk_size() + 16));
    let read = for_each_chunk(reader, config.chunk_size(), monitor, |chunk| {
        out.clear();
        cipher.update(chunk, &mut out);
        write(writer, &out)
    })?;

    out.clear();
    cipher.finish(&mut out)?;
    write(writer, &out)?;
    debug!(bytes = read, "decrypted stream");
    Ok(())
}

fn write<W: Write + ?Sized>(writer: &mut W, data: &[u8]) -> CryptResult<()> {
    writer.write_all(data).map_err(CryptError::CannotWrite)
}
