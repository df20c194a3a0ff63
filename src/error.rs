//! Error taxonomy shared by every engine operation.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for engine operations.
pub type CryptResult<T> = Result<T, CryptError>;

/// Boxed cause attached to remote failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Every failure an operation can report.
///
/// Operations translate low-level primitive, I/O and transport errors into
/// one of these kinds before returning; nothing else crosses the boundary.
#[derive(Debug, Error)]
pub enum CryptError {
    #[error("input type not supported")]
    InputTypeNotSupported,

    #[error("file does not exist: {}", .0.display())]
    NoSuchFile(PathBuf),

    #[error("file is a directory: {}", .0.display())]
    FileIsDirectory(PathBuf),

    #[error("output file already exists: {}", .0.display())]
    OutputFileExists(PathBuf),

    /// Bad padding, wrong password, truncated frame or wrong block size.
    #[error("invalid input data: {0}")]
    InvalidInputData(String),

    /// Blank password or malformed key material.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("input is not valid base64")]
    BadBase64(#[source] base64::DecodeError),

    #[error("cannot read from input")]
    CannotRead(#[source] io::Error),

    #[error("cannot write to output")]
    CannotWrite(#[source] io::Error),

    #[error("unable to sign input data: {0}")]
    SignException(String),

    #[error("cannot use provided signature to verify input data: {0}")]
    VerifyException(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("random.org: {message}")]
    RemoteServiceError {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("operation task failed: {0}")]
    TaskFailed(String),
}

impl CryptError {
    pub(crate) fn remote(message: impl Into<String>) -> Self {
        CryptError::RemoteServiceError {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn remote_with(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        CryptError::RemoteServiceError {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn remote_error_keeps_cause() {
        let cause = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        let err = CryptError::remote_with("transport failed", cause);

        assert_eq!(err.to_string(), "random.org: transport failed");
        let source = err.source().unwrap();
        assert_eq!(source.to_string(), "refused");
    }

    #[test]
    fn paths_are_rendered_in_messages() {
        let err = CryptError::OutputFileExists(PathBuf::from("/tmp/out.ecrypt"));
        assert_eq!(err.to_string(), "output file already exists: /tmp/out.ecrypt");
    }
}
