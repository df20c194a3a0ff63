//! Output destinations and crash-safe result files.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use getrandom::fill;
use tracing::{debug, warn};

use crate::config::{CryptoConfig, decrypted_sibling, encrypted_sibling};
use crate::error::{CryptError, CryptResult};
use crate::input::{Normalized, encode_base64};

/// Where an operation should deliver its result.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Destination {
    /// Memory inputs produce text, file inputs get a sibling file, streams
    /// go to the configured default path.
    #[default]
    Default,
    Text,
    Bytes,
    File(PathBuf),
    /// The operation's default path under the configured data directory.
    DefaultFile,
}

/// Result of a completed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Text(String),
    Bytes(Vec<u8>),
    File(PathBuf),
}

impl Outcome {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Outcome::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Outcome::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Outcome::File(p) => Some(p.as_path()),
            _ => None,
        }
    }
}

/// Direction of a transform; decides default file naming and text rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    Encrypt,
    Decrypt,
}

/// Resolved output, validated before any cryptographic work starts.
#[derive(Debug)]
pub(crate) enum Target {
    Text(Role),
    Bytes,
    File {
        path: PathBuf,
        replace: bool,
        /// Input file removed once the result is committed.
        consume: Option<PathBuf>,
    },
}

pub(crate) fn resolve(
    config: &CryptoConfig,
    destination: Destination,
    input: &Normalized,
    role: Role,
) -> CryptResult<Target> {
    let target = match destination {
        Destination::Text => Target::Text(role),
        Destination::Bytes => Target::Bytes,
        Destination::File(path) => {
            ensure_absent(&path)?;
            Target::File {
                path,
                replace: false,
                consume: None,
            }
        }
        Destination::DefaultFile => Target::File {
            path: default_path(config, role),
            replace: true,
            consume: None,
        },
        Destination::Default => match &input.origin {
            Some(origin) => {
                let path = match role {
                    Role::Encrypt => encrypted_sibling(origin),
                    Role::Decrypt => decrypted_sibling(origin),
                };
                ensure_absent(&path)?;
                Target::File {
                    path,
                    replace: false,
                    consume: Some(origin.clone()),
                }
            }
            None if input.is_memory() => Target::Text(role),
            None => Target::File {
                path: default_path(config, role),
                replace: true,
                consume: None,
            },
        },
    };
    debug!(?target, "resolved output");
    Ok(target)
}

fn default_path(config: &CryptoConfig, role: Role) -> PathBuf {
    match role {
        Role::Encrypt => config.default_encrypted_path(),
        Role::Decrypt => config.default_decrypted_path(),
    }
}

pub(crate) fn ensure_absent(path: &Path) -> CryptResult<()> {
    if path.exists() {
        return Err(CryptError::OutputFileExists(path.to_path_buf()));
    }
    Ok(())
}

impl Target {
    pub(crate) fn open(self) -> CryptResult<Sink> {
        Ok(match self {
            Target::Text(role) => Sink::Memory {
                buf: Vec::new(),
                text: Some(role),
            },
            Target::Bytes => Sink::Memory {
                buf: Vec::new(),
                text: None,
            },
            Target::File {
                path,
                replace,
                consume,
            } => Sink::File {
                out: OutputFile::create(path, replace)?,
                consume,
            },
        })
    }
}

/// Writable end of a [`Target`].
pub(crate) enum Sink {
    Memory { buf: Vec<u8>, text: Option<Role> },
    File { out: OutputFile, consume: Option<PathBuf> },
}

impl Write for Sink {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Memory { buf, .. } => buf.write(data),
            Sink::File { out, .. } => out.write(data),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Memory { .. } => Ok(()),
            Sink::File { out, .. } => out.flush(),
        }
    }
}

impl Sink {
    pub(crate) fn put(&mut self, data: &[u8]) -> CryptResult<()> {
        self.write_all(data).map_err(CryptError::CannotWrite)
    }

    pub(crate) fn finish(self) -> CryptResult<Outcome> {
        match self {
            Sink::Memory { buf, text: None } => Ok(Outcome::Bytes(buf)),
            Sink::Memory {
                buf,
                text: Some(Role::Encrypt),
            } => Ok(Outcome::Text(encode_base64(&buf))),
            Sink::Memory {
                buf,
                text: Some(Role::Decrypt),
            } => String::from_utf8(buf).map(Outcome::Text).map_err(|_| {
                CryptError::InvalidInputData("decrypted data is not valid UTF-8 text".into())
            }),
            Sink::File { out, consume } => {
                let path = out.commit()?;
                if let Some(original) = consume {
                    if let Err(e) = fs::remove_file(&original) {
                        warn!(path = %original.display(), error = %e, "could not remove input file");
                    }
                }
                Ok(Outcome::File(path))
            }
        }
    }
}

/// A result file written through a randomly named temporary sibling.
///
/// The target path only ever appears complete: [`OutputFile::commit`] syncs
/// and renames the temporary file, and dropping an uncommitted `OutputFile`
/// removes it.
pub struct OutputFile {
    target: PathBuf,
    tmp: PathBuf,
    file: Option<BufWriter<File>>,
    replace: bool,
}

impl OutputFile {
    /// Creates the temporary file next to `target`, creating parent
    /// directories as needed. With `replace == false` an existing target
    /// is reported as [`CryptError::OutputFileExists`].
    pub fn create(target: impl Into<PathBuf>, replace: bool) -> CryptResult<Self> {
        let target = target.into();
        if !replace {
            ensure_absent(&target)?;
        }
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(CryptError::CannotWrite)?;
        }

        let tmp = random_tmp_path(&target)?;

        // securely create temp file (fail if exists)
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp)
            .map_err(CryptError::CannotWrite)?;

        Ok(Self {
            target,
            tmp,
            file: Some(BufWriter::new(file)),
            replace,
        })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Flushes, syncs and moves the data into place.
    pub fn commit(mut self) -> CryptResult<PathBuf> {
        let Some(writer) = self.file.take() else {
            return Err(CryptError::CannotWrite(io::Error::other(
                "output already committed",
            )));
        };
        let file = writer
            .into_inner()
            .map_err(|e| CryptError::CannotWrite(e.into_error()))?;
        file.sync_all().map_err(CryptError::CannotWrite)?;
        drop(file);

        if self.replace {
            fs::rename(&self.tmp, &self.target).map_err(CryptError::CannotWrite)?;
        } else {
            // linking fails atomically if the target appeared meanwhile
            match fs::hard_link(&self.tmp, &self.target) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    return Err(CryptError::OutputFileExists(self.target.clone()));
                }
                Err(e) => return Err(CryptError::CannotWrite(e)),
            }
            if let Err(e) = fs::remove_file(&self.tmp) {
                warn!(path = %self.tmp.display(), error = %e, "could not remove temporary file");
            }
        }

        // fsync directory
        #[cfg(unix)]
        {
            if let Some(parent) = self.target.parent().filter(|p| !p.as_os_str().is_empty()) {
                let dir = File::open(parent).map_err(CryptError::CannotWrite)?;
                dir.sync_all().map_err(CryptError::CannotWrite)?;
            }
        }

        self.tmp = PathBuf::new();
        Ok(self.target.clone())
    }
}

impl Write for OutputFile {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        match self.file.as_mut() {
            Some(f) => f.write(data),
            None => Err(io::Error::other("output already committed")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(f) => f.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for OutputFile {
    fn drop(&mut self) {
        drop(self.file.take());
        if self.tmp.as_os_str().is_empty() {
            return;
        }
        if let Err(e) = fs::remove_file(&self.tmp) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.tmp.display(), error = %e, "could not remove temporary file");
            }
        }
    }
}

/// Format: `filename.tmp.<randomhex>` in the target's directory.
fn random_tmp_path(target: &Path) -> CryptResult<PathBuf> {
    let mut buf = [0u8; 8]; // 64 bit entropy
    fill(&mut buf)
        .map_err(|_| CryptError::CannotWrite(io::Error::other("OS random generator unavailable")))?;

    let file_name = target
        .file_name()
        .ok_or_else(|| {
            CryptError::InvalidParameter(format!("not a file path: {}", target.display()))
        })?
        .to_string_lossy();

    let tmp_name = format!("{}.tmp.{}", file_name, hex::encode(buf));

    Ok(target.with_file_name(tmp_name))
}
