//! Error types for transfer operations.
//!
//! The taxonomy mirrors where in a transfer a failure can occur:
//!
//! - [`TransferError::Configuration`] — bad request (unknown format key,
//!   archive mode compiled out). Raised before any I/O, so no cleanup is
//!   needed.
//! - [`TransferError::Transform`] — a transform stage rejected a record.
//!   Fatal for the whole transfer; carries the offending path and record
//!   index.
//! - [`TransferError::UpstreamIo`] — the data service or blob store failed.
//! - [`TransferError::Compression`] — the compression or archive layer
//!   failed, typically at finalize; carries the underlying cause.
//! - [`TransferError::Parse`] — the blob content could not be parsed on
//!   import.
//! - [`TransferError::Io`] — staged artifact I/O.
//!
//! No retries happen inside the pipelines; retry policy belongs to the
//! collaborator implementations.

use std::error::Error;
use std::fmt;

/// Main error type for export and import pipelines.
#[derive(Debug)]
pub enum TransferError {
    /// Invalid request: unknown format, unsupported archive mode, missing
    /// required field. Raised before any I/O.
    Configuration(String),

    /// A transform stage failed on a specific record.
    Transform {
        /// Dot path of the value that failed to convert.
        path: String,
        /// Index of the record within the batch being transformed.
        index: usize,
        message: String,
    },

    /// A collaborator (data service or blob store) call failed.
    UpstreamIo {
        message: String,
        source: Option<String>,
    },

    /// Compression or archive finalization failed.
    Compression {
        message: String,
        cause: Option<Box<dyn Error + Send + Sync>>,
    },

    /// Blob content could not be parsed during import.
    Parse(String),

    /// Staged artifact I/O failure.
    Io(std::io::Error),
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "configuration error: {msg}"),
            Self::Transform {
                path,
                index,
                message,
            } => write!(
                f,
                "transform error at '{path}' on record #{index}: {message}"
            ),
            Self::UpstreamIo { message, source } => match source {
                Some(src) => write!(f, "upstream I/O error ({src}): {message}"),
                None => write!(f, "upstream I/O error: {message}"),
            },
            Self::Compression { message, .. } => write!(f, "compression error: {message}"),
            Self::Parse(msg) => write!(f, "parse error: {msg}"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl Error for TransferError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Compression { cause, .. } => cause
                .as_deref()
                .map(|c| c as &(dyn Error + 'static)),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl TransferError {
    /// Create a `Transform` error for a path and record index.
    pub fn transform(
        path: impl Into<String>,
        index: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::Transform {
            path: path.into(),
            index,
            message: message.into(),
        }
    }

    /// Create a `Compression` error wrapping an underlying cause.
    pub fn compression(
        message: impl Into<String>,
        cause: impl Error + Send + Sync + 'static,
    ) -> Self {
        Self::Compression {
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }
}

impl From<std::io::Error> for TransferError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

/// Result type alias for transfer operations.
pub type Result<T> = std::result::Result<T, TransferError>;
