//! # Blobport
//!
//! A **chunked streaming transfer engine** between a paginated
//! query-capable data service and a durable blob store, reshaping records
//! in flight.
//!
//! ## Key features
//!
//! - **Export pipeline** — paginate, transform, format-serialize,
//!   compress or archive, stage, upload, optionally sign
//! - **Import pipeline** — fetch a blob stream, parse, transform,
//!   batch-write with one ordered write per item
//! - **Declarative transform engine** — filter, path mapping, unit and
//!   date conversion, pick/omit/merge, shared by both pipelines
//! - **Pluggable format codecs** — JSON, GeoJSON, and CSV built in,
//!   registered by format key and content type
//! - **Compression layer** — multi-member gzip, single-entry zip or
//!   tar+gzip archives, with an explicit finalize barrier
//! - **Bounded memory** — one chunk in flight at a time; peak memory is
//!   O(chunk size), not O(collection size)
//!
//! ## Quick start
//!
//! ```
//! use blobport::testing::{FakeBlobStore, FakeDataService};
//! use blobport::{ExportRequest, TransferOptions, run_export};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), blobport::TransferError> {
//! let service = FakeDataService::with_records(vec![
//!     json!({"city": "Oslo", "year": 1048}),
//!     json!({"city": "Bergen", "year": 1070}),
//! ]);
//! let store = FakeBlobStore::new();
//! let options = TransferOptions::default();
//!
//! let request = ExportRequest::new("json", &options)
//!     .with_filename("cities.json")
//!     .with_chunk_size(100);
//! let outcome = run_export(&service, &store, &options, &request)?;
//! assert_eq!(outcome.objects, 2);
//! assert_eq!(outcome.chunks, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Collaborators
//!
//! The crate implements neither record storage nor blob storage. Callers
//! provide a [`DataService`] (paginated `find` with a zero-limit count
//! form, batched `create`) and a [`BlobStore`] (`upload_file`,
//! `get_object_stream`, signed descriptors); see [`services`]. The
//! [`testing`] module ships in-memory fakes for both.
//!
//! ## Concurrency model
//!
//! One transfer is one sequential pipeline — chunk fetch, transform,
//! serialize, and write are ordered, awaited steps. Transfers share no
//! mutable state and may run concurrently when the collaborators are
//! thread-safe. Cancellation is surfaced by aborting a collaborator call,
//! which propagates as a fatal error.

pub mod codec;
pub mod compression;
pub mod error;
pub mod export;
pub mod import;
pub mod matcher;
pub mod options;
pub mod path;
pub mod services;
pub mod testing;
pub mod transform;
pub mod units;

// Re-exports for convenient access
pub use codec::{FormatCodec, ParseCodec, ProgressInfo, register_format, register_parser};
pub use compression::{ArchiveKind, CompressionMode};
pub use error::{Result, TransferError};
pub use export::{ExportOutcome, ExportRequest, run_export};
pub use import::{ImportOutcome, ImportRequest, run_import};
pub use options::TransferOptions;
pub use services::{
    BlobDownload, BlobReference, BlobStore, DataService, FindResult, Query, ServiceError,
    ServiceErrorKind, ServiceResult, SignedDescriptor,
};
pub use transform::{Transform, TransformSpec, transform};
