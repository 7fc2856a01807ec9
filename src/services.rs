//! Collaborator traits for the data service and the blob store.
//!
//! The pipelines consume these as trait objects and never implement them:
//! the data service owns record storage and querying, the blob store owns
//! durable bytes. Implementations must be `Send + Sync` so independent
//! transfers can run concurrently.

use serde_json::Value;
use std::error::Error;
use std::fmt;
use std::io::Read;
use std::path::Path;

// ============================================================================
// Collaborator Error Type
// ============================================================================

/// Error returned by collaborator implementations.
#[derive(Debug, Clone)]
pub struct ServiceError {
    pub message: String,
    pub kind: ServiceErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceErrorKind {
    NotFound,
    InvalidInput,
    Network,
    Timeout,
    Cancelled,
    Internal,
}

impl ServiceError {
    pub fn new(kind: ServiceErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl Error for ServiceError {}

pub type ServiceResult<T> = Result<T, ServiceError>;

// ============================================================================
// Data Service
// ============================================================================

/// A paginated query against a record collection.
///
/// `limit == Some(0)` is the count-only form: the service reports `total`
/// and returns no records.
#[derive(Debug, Clone, Default)]
pub struct Query {
    /// Predicate restricting which records match (empty = all).
    pub filter: Value,
    pub limit: Option<usize>,
    pub skip: Option<usize>,
}

impl Query {
    pub fn new(filter: Value) -> Self {
        Self {
            filter,
            limit: None,
            skip: None,
        }
    }

    #[must_use]
    pub fn with_page(mut self, limit: usize, skip: usize) -> Self {
        self.limit = Some(limit);
        self.skip = Some(skip);
        self
    }

    #[must_use]
    pub fn count_only(mut self) -> Self {
        self.limit = Some(0);
        self.skip = None;
        self
    }
}

/// Response of [`DataService::find`].
#[derive(Debug, Clone)]
pub struct FindResult {
    /// Total number of matching records, independent of pagination.
    pub total: usize,
    /// Response body; the record batch sits at the pipeline's configured
    /// chunk path inside it (conventionally `"data"`).
    pub body: Value,
}

/// A queryable, batch-writable record collection.
pub trait DataService: Send + Sync {
    /// Run a paginated query.
    ///
    /// # Errors
    ///
    /// Returns an error if the query is invalid or the underlying store
    /// fails.
    fn find(&self, query: &Query) -> ServiceResult<FindResult>;

    /// Write a batch of records (a lone record is a batch of one).
    ///
    /// # Errors
    ///
    /// Returns an error if any record in the batch cannot be written.
    fn create(&self, batch: Value) -> ServiceResult<Value>;
}

// ============================================================================
// Blob Store
// ============================================================================

/// Reference to an uploaded blob.
#[derive(Debug, Clone)]
pub struct BlobReference {
    pub id: String,
    pub content_type: String,
}

/// Time-limited access descriptor for a blob.
#[derive(Debug, Clone)]
pub struct SignedDescriptor {
    pub url: String,
    pub expires_in: u64,
    /// Download file name suggested to the end user.
    pub filename: String,
}

/// A blob retrieved for reading.
pub struct BlobDownload {
    pub content_type: String,
    pub body: Box<dyn Read>,
}

impl fmt::Debug for BlobDownload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobDownload")
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Durable blob storage.
pub trait BlobStore: Send + Sync {
    /// Upload a local file and return its reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the upload fails.
    fn upload_file(&self, path: &Path, content_type: &str) -> ServiceResult<BlobReference>;

    /// Open a blob as a byte stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob does not exist or cannot be opened.
    fn get_object_stream(&self, id: &str) -> ServiceResult<BlobDownload>;

    /// Create a time-limited signed access descriptor for a blob.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob does not exist or signing fails.
    fn create_signed_descriptor(
        &self,
        id: &str,
        expires_in: u64,
        filename: &str,
    ) -> ServiceResult<SignedDescriptor>;
}

impl From<ServiceError> for crate::error::TransferError {
    fn from(err: ServiceError) -> Self {
        Self::UpstreamIo {
            message: err.message,
            source: Some(format!("{:?}", err.kind)),
        }
    }
}
