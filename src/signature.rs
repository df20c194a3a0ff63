//! SHA512withRSA (RSASSA-PKCS1-v1_5) signatures over streamed input.
//!
//! Signature files hold the raw signature as URL-safe base64 text.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{DigestSigner, DigestVerifier, SignatureEncoding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha512};
use tracing::{debug, info};

use crate::config::CryptoConfig;
use crate::error::{CryptError, CryptResult};
use crate::input::{Input, Source, TextEncoding, decode_base64, encode_base64, for_each_chunk, normalize};
use crate::output::{OutputFile, ensure_absent};
use crate::progress::Monitor;

/// Signs `input` and writes the base64 signature to `output`.
pub fn sign(
    config: &CryptoConfig,
    input: Input,
    private_key: &RsaPrivateKey,
    output: &Path,
    monitor: &mut Monitor,
) -> CryptResult<PathBuf> {
    let input = normalize(input, TextEncoding::Utf8)?;
    ensure_absent(output)?;

    let digest = digest_input(config, input.source, monitor)?;
    let signer = SigningKey::<Sha512>::new(private_key.clone());
    let signature: Signature = signer
        .try_sign_digest(digest)
        .map_err(|e| CryptError::SignException(e.to_string()))?;

    let mut out = OutputFile::create(output, false)?;
    out.write_all(encode_base64(&signature.to_bytes()).as_bytes())
        .map_err(CryptError::CannotWrite)?;
    let path = out.commit()?;

    info!(path = %path.display(), "signature written");
    Ok(path)
}

/// Checks `input` against the signature stored in `signature_file`.
///
/// Returns `Ok(false)` for a well-formed signature that does not match. A
/// signature file that cannot be decoded, or whose length does not fit the
/// key, is a [`CryptError::VerifyException`].
pub fn verify(
    config: &CryptoConfig,
    input: Input,
    public_key: &RsaPublicKey,
    signature_file: &Path,
    monitor: &mut Monitor,
) -> CryptResult<bool> {
    let input = normalize(input, TextEncoding::Utf8)?;
    let signature = read_signature(signature_file, public_key)?;

    let digest = digest_input(config, input.source, monitor)?;
    let verifier = VerifyingKey::<Sha512>::new(public_key.clone());
    let valid = verifier.verify_digest(digest, &signature).is_ok();

    debug!(valid, "signature checked");
    Ok(valid)
}

fn read_signature(path: &Path, public_key: &RsaPublicKey) -> CryptResult<Signature> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(CryptError::NoSuchFile(path.to_path_buf()));
        }
        Err(e) if e.kind() == io::ErrorKind::InvalidData => {
            return Err(CryptError::VerifyException("signature file is not text".into()));
        }
        Err(e) => return Err(CryptError::CannotRead(e)),
    };

    let raw = decode_base64(&text)
        .map_err(|_| CryptError::VerifyException("signature is not valid base64".into()))?;
    if raw.len() != public_key.size() {
        return Err(CryptError::VerifyException(format!(
            "signature is {} bytes, key expects {}",
            raw.len(),
            public_key.size()
        )));
    }
    Signature::try_from(raw.as_slice()).map_err(|e| CryptError::VerifyException(e.to_string()))
}

fn digest_input(config: &CryptoConfig, source: Source, monitor: &mut Monitor) -> CryptResult<Sha512> {
    let mut digest = Sha512::new();
    match source {
        Source::Memory(data) => digest.update(&data),
        Source::Stream { mut reader, len } => {
            monitor.start(len);
            for_each_chunk(&mut reader, config.chunk_size(), monitor, |chunk| {
                digest.update(chunk);
                Ok(())
            })?;
        }
    }
    Ok(digest)
}
