//! Ambient transfer defaults.

use std::path::PathBuf;

/// Defaults shared by all transfers, passed explicitly into the pipelines
/// rather than held as module-level state.
#[derive(Debug, Clone)]
pub struct TransferOptions {
    /// Writable scratch location for staged artifacts; lazily created once
    /// at the first export.
    pub working_dir: PathBuf,
    /// Chunk size used when a request does not set one.
    pub default_chunk_size: usize,
    /// Result path of the record batch inside a find response body.
    pub default_chunk_path: String,
    /// Signed-descriptor lifetime in seconds used when a request does not
    /// set one.
    pub default_expires_in: u64,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            working_dir: std::env::temp_dir(),
            default_chunk_size: 500,
            default_chunk_path: "data".to_string(),
            default_expires_in: 180,
        }
    }
}

impl TransferOptions {
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }
}
