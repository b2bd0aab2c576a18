use std::path::PathBuf;

use thiserror::Error;

use crate::CodecFormat;

/// Failures reported by a codec collaborator or by the image builder.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Not enough memory")]
    NotEnoughMemory,
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Parameter value not supported: {0}")]
    ParameterValueNotSupported(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Unknown marker 0xFF{0:02X}")]
    UnknownMarker(u8),
    #[error("Need more data: {needed} byte(s) requested, {available} available")]
    NeedMoreData { needed: usize, available: usize },
    #[error("Session has not been set up")]
    SessionNotConfigured,
    #[error("Format mismatch: session is {expected}, requested {actual}")]
    FormatMismatch {
        expected: CodecFormat,
        actual: CodecFormat,
    },
}

impl CodecError {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub(crate) fn unsupported(message: impl Into<String>) -> Self {
        Self::ParameterValueNotSupported(message.into())
    }

    pub(crate) fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData(message.into())
    }
}

/// Failures while writing a codestream to disk or loading it back.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Short read on {}: expected {expected} bytes, got {actual}", .path.display())]
    ShortRead {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },
}

impl PersistError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failures that stop a round-trip run outright.
///
/// Functional codec failures and short reads are not errors at this level;
/// they are reported through [`crate::harness::RunOutcome`].
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Failed to build source image: {0}")]
    Image(#[source] CodecError),
    #[error(transparent)]
    Persist(#[from] PersistError),
}
