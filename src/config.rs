//! Process-wide constants and the default output path policy.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::crypto::KdfParams;

/// Suffix appended to files encrypted in place.
pub const ENCRYPTED_FILE_EXT: &str = ".ecrypt";
/// Suffix used when decrypting a file that does not carry [`ENCRYPTED_FILE_EXT`].
pub const DECRYPTED_FILE_EXT: &str = ".decrypted";

const ENCRYPTED_FILE_NAME: &str = "EncryptedFile.ecrypt";
const DECRYPTED_FILE_NAME: &str = "DecryptedFile.ecrypt";
const HASH_FILE_NAME: &str = "HashOfFile.txt";

/// Streaming chunk size in bytes.
pub const CHUNK_SIZE: usize = 8192;
/// Length of the random password protecting a hybrid envelope payload.
pub const HYBRID_PASSWORD_LEN: usize = 24;

/// Immutable configuration shared by all operations.
///
/// Built once (usually behind an `Arc`) and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct CryptoConfig {
    kdf: KdfParams,
    chunk_size: usize,
    hybrid_password_len: usize,
    data_dir: PathBuf,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self::with_data_dir(default_data_dir())
    }
}

impl CryptoConfig {
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            kdf: KdfParams::default(),
            chunk_size: CHUNK_SIZE,
            hybrid_password_len: HYBRID_PASSWORD_LEN,
            data_dir: data_dir.into(),
        }
    }

    pub fn kdf(&self) -> &KdfParams {
        &self.kdf
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn hybrid_password_len(&self) -> usize {
        self.hybrid_password_len
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Target for encryption results of stream inputs with no explicit output.
    pub fn default_encrypted_path(&self) -> PathBuf {
        self.data_dir.join(ENCRYPTED_FILE_NAME)
    }

    /// Target for decryption results of stream inputs with no explicit output.
    pub fn default_decrypted_path(&self) -> PathBuf {
        self.data_dir.join(DECRYPTED_FILE_NAME)
    }

    /// Target for a digest written to file with no explicit name.
    pub fn default_hash_path(&self) -> PathBuf {
        self.data_dir.join(HASH_FILE_NAME)
    }
}

/// `<input>.ecrypt`
pub fn encrypted_sibling(input: &Path) -> PathBuf {
    append_to_file_name(input, ENCRYPTED_FILE_EXT)
}

/// `<input>` with `.ecrypt` stripped, or `<input>.decrypted` if it has no such suffix.
pub fn decrypted_sibling(input: &Path) -> PathBuf {
    match input.file_name().and_then(|n| n.to_str()) {
        Some(name) if name.len() > ENCRYPTED_FILE_EXT.len() && name.ends_with(ENCRYPTED_FILE_EXT) => {
            let stem = &name[..name.len() - ENCRYPTED_FILE_EXT.len()];
            input.with_file_name(stem)
        }
        _ => append_to_file_name(input, DECRYPTED_FILE_EXT),
    }
}

fn append_to_file_name(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Platform data directory for `ecrypt`, or the system temp dir when the
/// platform exposes no home directory.
pub fn default_data_dir() -> PathBuf {
    ProjectDirs::from("", "", "ecrypt")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| std::env::temp_dir().join("ecrypt"))
}
