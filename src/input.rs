//! Input normalization.
//!
//! Every operation accepts an [`Input`] and resolves it to a [`Source`]:
//! either bytes already in memory or a reader with an optional known length.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE;
use tracing::debug;

use crate::error::{CryptError, CryptResult};
use crate::progress::Monitor;

/// Data handed to an operation.
pub enum Input {
    Bytes(Vec<u8>),
    /// UTF-8 plaintext for encrypt/sign/hash, base64 for decrypt.
    Text(String),
    Stream(Box<dyn Read + Send>),
    /// A stream whose total length is known; enables percentage progress.
    SizedStream { reader: Box<dyn Read + Send>, len: u64 },
    File(PathBuf),
}

impl Input {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Input::File(path.into())
    }

    pub fn stream(reader: impl Read + Send + 'static) -> Self {
        Input::Stream(Box::new(reader))
    }

    pub fn sized_stream(reader: impl Read + Send + 'static, len: u64) -> Self {
        Input::SizedStream {
            reader: Box::new(reader),
            len,
        }
    }
}

impl fmt::Debug for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Input::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            Input::Text(t) => write!(f, "Text({} chars)", t.chars().count()),
            Input::Stream(_) => f.write_str("Stream"),
            Input::SizedStream { len, .. } => write!(f, "SizedStream({len} bytes)"),
            Input::File(p) => write!(f, "File({})", p.display()),
        }
    }
}

impl From<Vec<u8>> for Input {
    fn from(bytes: Vec<u8>) -> Self {
        Input::Bytes(bytes)
    }
}

impl From<&[u8]> for Input {
    fn from(bytes: &[u8]) -> Self {
        Input::Bytes(bytes.to_vec())
    }
}

impl From<String> for Input {
    fn from(text: String) -> Self {
        Input::Text(text)
    }
}

impl From<&str> for Input {
    fn from(text: &str) -> Self {
        Input::Text(text.to_owned())
    }
}

/// How a text input turns into bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TextEncoding {
    Utf8,
    Base64,
}

pub(crate) enum Source {
    Memory(Vec<u8>),
    Stream {
        reader: Box<dyn Read + Send>,
        len: Option<u64>,
    },
}

impl Source {
    pub(crate) fn len(&self) -> Option<u64> {
        match self {
            Source::Memory(bytes) => Some(bytes.len() as u64),
            Source::Stream { len, .. } => *len,
        }
    }
}

pub(crate) struct Normalized {
    pub source: Source,
    /// Set when the input was a file path.
    pub origin: Option<PathBuf>,
}

impl Normalized {
    pub(crate) fn is_memory(&self) -> bool {
        matches!(self.source, Source::Memory(_))
    }
}

pub(crate) fn normalize(input: Input, text: TextEncoding) -> CryptResult<Normalized> {
    let (source, origin) = match input {
        Input::Bytes(bytes) => (Source::Memory(bytes), None),
        Input::Text(s) => {
            let bytes = match text {
                TextEncoding::Utf8 => s.into_bytes(),
                TextEncoding::Base64 => decode_base64(&s)?,
            };
            (Source::Memory(bytes), None)
        }
        Input::Stream(reader) => (Source::Stream { reader, len: None }, None),
        Input::SizedStream { reader, len } => (
            Source::Stream {
                reader,
                len: Some(len),
            },
            None,
        ),
        Input::File(path) => {
            let (file, len) = open_input_file(&path)?;
            (
                Source::Stream {
                    reader: Box::new(BufReader::new(file)),
                    len: Some(len),
                },
                Some(path),
            )
        }
    };
    debug!(len = ?source.len(), from_file = origin.is_some(), "input normalized");
    Ok(Normalized { source, origin })
}

/// URL-safe base64, tolerating embedded whitespace and missing padding.
pub(crate) fn decode_base64(text: &str) -> CryptResult<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let unpadded = compact.trim_end_matches('=');
    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(unpadded)
        .map_err(CryptError::BadBase64)
}

pub(crate) fn encode_base64(bytes: &[u8]) -> String {
    URL_SAFE.encode(bytes)
}

fn open_input_file(path: &Path) -> CryptResult<(File, u64)> {
    let meta = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(CryptError::NoSuchFile(path.to_path_buf()));
        }
        Err(e) => return Err(CryptError::CannotRead(e)),
    };
    if meta.is_dir() {
        return Err(CryptError::FileIsDirectory(path.to_path_buf()));
    }
    // sockets, fifos and devices have no meaningful length
    if !meta.is_file() {
        return Err(CryptError::InputTypeNotSupported);
    }
    let file = File::open(path).map_err(CryptError::CannotRead)?;
    Ok((file, meta.len()))
}

/// Reads up to `limit` bytes, stopping early only at end of stream.
pub(crate) fn read_prefix<R: Read + ?Sized>(reader: &mut R, limit: usize) -> CryptResult<Vec<u8>> {
    let mut buf = Vec::with_capacity(limit);
    reader
        .take(limit as u64)
        .read_to_end(&mut buf)
        .map_err(CryptError::CannotRead)?;
    Ok(buf)
}

/// Feeds the reader to `f` chunk by chunk, reporting progress after each
/// chunk and stopping with [`CryptError::Cancelled`] when requested.
pub(crate) fn for_each_chunk<R, F>(
    reader: &mut R,
    chunk_size: usize,
    monitor: &mut Monitor,
    mut f: F,
) -> CryptResult<u64>
where
    R: Read + ?Sized,
    F: FnMut(&[u8]) -> CryptResult<()>,
{
    let mut buf = vec![0u8; chunk_size];
    let mut total = 0u64;
    loop {
        monitor.checkpoint()?;
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CryptError::CannotRead(e)),
        };
        f(&buf[..n])?;
        total += n as u64;
        monitor.advance(n);
    }
    Ok(total)
}
