//! Message digests rendered as uppercase hex.

use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use digest::DynDigest;
use tracing::info;

use crate::config::CryptoConfig;
use crate::error::{CryptError, CryptResult};
use crate::input::{Input, Source, TextEncoding, for_each_chunk, normalize};
use crate::output::{Destination, OutputFile, Outcome, ensure_absent};
use crate::progress::Monitor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    #[default]
    Sha512,
}

impl HashAlgorithm {
    pub const ALL: [HashAlgorithm; 6] = [
        HashAlgorithm::Md5,
        HashAlgorithm::Sha1,
        HashAlgorithm::Sha224,
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha384,
        HashAlgorithm::Sha512,
    ];

    pub fn name(self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "MD5",
            HashAlgorithm::Sha1 => "SHA-1",
            HashAlgorithm::Sha224 => "SHA-224",
            HashAlgorithm::Sha256 => "SHA-256",
            HashAlgorithm::Sha384 => "SHA-384",
            HashAlgorithm::Sha512 => "SHA-512",
        }
    }

    /// Digest length in bytes.
    pub fn output_len(self) -> usize {
        self.hasher().output_size()
    }

    fn hasher(self) -> Box<dyn DynDigest + Send> {
        match self {
            HashAlgorithm::Md5 => Box::new(md5::Md5::default()),
            HashAlgorithm::Sha1 => Box::new(sha1::Sha1::default()),
            HashAlgorithm::Sha224 => Box::new(sha2::Sha224::default()),
            HashAlgorithm::Sha256 => Box::new(sha2::Sha256::default()),
            HashAlgorithm::Sha384 => Box::new(sha2::Sha384::default()),
            HashAlgorithm::Sha512 => Box::new(sha2::Sha512::default()),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = CryptError;

    /// Accepts `SHA-256`, `sha256`, `Sha_256` and similar spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|alg| alg.name().replace('-', "") == wanted)
            .ok_or_else(|| CryptError::InvalidParameter(format!("unknown hash algorithm: {s}")))
    }
}

/// Hashes `input` and delivers the digest.
///
/// `Text`/`Default` return uppercase hex, `Bytes` the raw digest, and the
/// file destinations write the hex text.
pub fn calculate(
    config: &CryptoConfig,
    input: Input,
    algorithm: HashAlgorithm,
    destination: Destination,
    monitor: &mut Monitor,
) -> CryptResult<Outcome> {
    let input = normalize(input, TextEncoding::Utf8)?;
    let raw = matches!(destination, Destination::Bytes);
    let file_target = match destination {
        Destination::File(path) => {
            ensure_absent(&path)?;
            Some((path, false))
        }
        Destination::DefaultFile => Some((config.default_hash_path(), true)),
        _ => None,
    };

    let digest = digest_source(config, algorithm, input.source, monitor)?;
    info!(%algorithm, "hash calculated");

    if let Some((path, replace)) = file_target {
        let mut out = OutputFile::create(path, replace)?;
        out.write_all(hex::encode_upper(&digest).as_bytes())
            .map_err(CryptError::CannotWrite)?;
        return Ok(Outcome::File(out.commit()?));
    }
    if raw {
        return Ok(Outcome::Bytes(digest));
    }
    Ok(Outcome::Text(hex::encode_upper(&digest)))
}

fn digest_source(
    config: &CryptoConfig,
    algorithm: HashAlgorithm,
    source: Source,
    monitor: &mut Monitor,
) -> CryptResult<Vec<u8>> {
    let mut hasher = algorithm.hasher();
    match source {
        Source::Memory(data) => hasher.update(&data),
        // small enough for one read
        Source::Stream { mut reader, len: Some(len) } if len <= config.chunk_size() as u64 => {
            let mut data = Vec::with_capacity(len as usize + 1);
            reader
                .by_ref()
                .take(len + 1)
                .read_to_end(&mut data)
                .map_err(CryptError::CannotRead)?;
            hasher.update(&data);
            if data.len() as u64 > len {
                // stated length was too small; stream the rest
                monitor.start(None);
                monitor.advance(data.len());
                for_each_chunk(&mut reader, config.chunk_size(), monitor, |chunk| {
                    hasher.update(chunk);
                    Ok(())
                })?;
            }
        }
        Source::Stream { mut reader, len } => {
            monitor.start(len);
            for_each_chunk(&mut reader, config.chunk_size(), monitor, |chunk| {
                hasher.update(chunk);
                Ok(())
            })?;
        }
    }
    Ok(hasher.finalize().into_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    const ABC_SHA256: &str = "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD";

    fn config() -> CryptoConfig {
        CryptoConfig::with_data_dir(std::env::temp_dir().join("ecrypt-hash-tests"))
    }

    fn hex_of(input: Input, alg: HashAlgorithm) -> String {
        calculate(&config(), input, alg, Destination::Default, &mut Monitor::silent())
            .unwrap()
            .as_text()
            .unwrap()
            .to_owned()
    }

    #[test]
    fn known_digests_of_abc() {
        assert_eq!(hex_of(Input::from("abc"), HashAlgorithm::Sha256), ABC_SHA256);
        assert_eq!(
            hex_of(Input::from("abc"), HashAlgorithm::Md5),
            "900150983CD24FB0D6963F7D28E17F72"
        );
        assert_eq!(
            hex_of(Input::from("abc"), HashAlgorithm::Sha1),
            "A9993E364706816ABA3E25717850C26C9CD0D89D"
        );
    }

    #[test]
    fn output_lengths_match_algorithm() {
        for alg in HashAlgorithm::ALL {
            assert_eq!(hex_of(Input::from("x"), alg).len(), 2 * alg.output_len());
        }
        assert_eq!(HashAlgorithm::Sha224.output_len(), 28);
        assert_eq!(HashAlgorithm::Sha384.output_len(), 48);
    }

    #[test]
    fn default_algorithm_is_sha512() {
        assert_eq!(HashAlgorithm::default(), HashAlgorithm::Sha512);
        assert_eq!(hex_of(Input::from(""), HashAlgorithm::default()).len(), 128);
    }

    #[test]
    fn streamed_hash_matches_single_shot() {
        let data: Vec<u8> = (0..40_000u32).map(|i| (i % 97) as u8).collect();
        let single = hex_of(Input::Bytes(data.clone()), HashAlgorithm::Sha256);
        let streamed = hex_of(Input::stream(Cursor::new(data)), HashAlgorithm::Sha256);
        assert_eq!(single, streamed);
    }

    #[test]
    fn large_input_reports_progress() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let mut monitor = Monitor::with_callback(move |ev| sink.lock().unwrap().push(ev));
        let data = vec![0u8; 20_000];

        calculate(
            &config(),
            Input::sized_stream(Cursor::new(data), 20_000),
            HashAlgorithm::Md5,
            Destination::Text,
            &mut monitor,
        )
        .unwrap();

        let events = events.lock().unwrap();
        assert!(events.len() >= 3);
        let last = events.last().unwrap();
        assert_eq!(last.processed, 20_000);
        assert_eq!(last.total, Some(20_000));
    }

    #[test]
    fn understated_stream_length_is_still_streamed() {
        let data: Vec<u8> = (0..30_000u32).map(|i| (i % 251) as u8).collect();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let mut monitor = Monitor::with_callback(move |ev| sink.lock().unwrap().push(ev));

        let digest = calculate(
            &config(),
            Input::sized_stream(Cursor::new(data.clone()), 10),
            HashAlgorithm::Sha256,
            Destination::Text,
            &mut monitor,
        )
        .unwrap();

        assert_eq!(digest, Outcome::Text(hex_of(Input::Bytes(data), HashAlgorithm::Sha256)));
        let events = events.lock().unwrap();
        assert!(events.len() > 1);
        assert_eq!(events.last().unwrap().processed, 30_000);
    }

    #[test]
    fn bytes_destination_returns_raw_digest() {
        let out = calculate(&config(), Input::from("abc"), HashAlgorithm::Sha256, Destination::Bytes, &mut Monitor::silent())
            .unwrap()
            .into_bytes()
            .unwrap();
        assert_eq!(hex::encode_upper(out), ABC_SHA256);
    }

    #[test]
    fn hash_written_to_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("abc.sha256");

        let out = calculate(&config(), Input::from("abc"), HashAlgorithm::Sha256, Destination::File(path.clone()), &mut Monitor::silent()).unwrap();

        assert_eq!(out, Outcome::File(path.clone()));
        assert_eq!(fs::read_to_string(&path).unwrap(), ABC_SHA256);
    }

    #[test]
    fn algorithm_names_parse() {
        assert_eq!("sha256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
        assert_eq!("SHA-512".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha512);
        assert_eq!("md5".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Md5);
        assert!(matches!("MD2".parse::<HashAlgorithm>(), Err(CryptError::InvalidParameter(_))));
    }
}
