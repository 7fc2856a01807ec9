//! Export pipeline: paginate, transform, serialize, compress, stage,
//! upload, optionally sign.
//!
//! One export is one sequential state machine:
//!
//! ```text
//! Counting → Initializing → Streaming(chunk 0..N-1) → Finalizing
//!         → Staged → Uploading → (SigningURL) → Cleanup → Done
//! ```
//!
//! A fatal error in any state still attempts best-effort cleanup of the
//! staged artifact. When the count query matches nothing the pipeline
//! short-circuits to Done with zero chunks and objects and performs no
//! upload at all — callers must never receive a reference to a blob that
//! does not exist.
//!
//! Memory stays O(chunk size): each chunk is fetched, transformed,
//! serialized, and written before the next one is queried.

use crate::codec::{self, ProgressInfo};
use crate::compression::{CompressionMode, CompressedSink};
use crate::error::{Result, TransferError};
use crate::options::TransferOptions;
use crate::path;
use crate::services::{BlobReference, BlobStore, DataService, Query, SignedDescriptor};
use crate::transform::Transform;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// One export invocation. Immutable once built.
#[derive(Debug)]
pub struct ExportRequest {
    /// Query filter restricting which records are exported.
    pub query: Value,
    /// Format key resolved against the codec registry.
    pub format: String,
    /// Records per chunk.
    pub chunk_size: usize,
    /// Result path of the record batch inside a find response body.
    pub chunk_path: String,
    /// Optional batch reshaping.
    pub transform: Option<Transform>,
    /// Compression mode; also decides content type and filename suffix.
    pub compression: CompressionMode,
    /// Intrinsic output name (without the compression suffix). When empty,
    /// derived as `<stem>.<format extension>`.
    pub filename: String,
    /// Request a signed access descriptor after upload.
    pub signed_url: bool,
    /// Signed-descriptor lifetime in seconds.
    pub expires_in: u64,
}

impl ExportRequest {
    /// Build a request for `format` with the ambient defaults applied.
    pub fn new(format: impl Into<String>, options: &TransferOptions) -> Self {
        Self {
            query: Value::Null,
            format: format.into(),
            chunk_size: options.default_chunk_size,
            chunk_path: options.default_chunk_path.clone(),
            transform: None,
            compression: CompressionMode::default(),
            filename: String::new(),
            signed_url: true,
            expires_in: options.default_expires_in,
        }
    }

    #[must_use]
    pub fn with_query(mut self, filter: Value) -> Self {
        self.query = filter;
        self
    }

    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    #[must_use]
    pub fn with_transform(mut self, transform: impl Into<Transform>) -> Self {
        self.transform = Some(transform.into());
        self
    }

    #[must_use]
    pub fn with_compression(mut self, mode: CompressionMode) -> Self {
        self.compression = mode;
        self
    }

    /// Intrinsic output name; the compression suffix is appended on top.
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    #[must_use]
    pub fn with_signed_url(mut self, signed_url: bool) -> Self {
        self.signed_url = signed_url;
        self
    }

    #[must_use]
    pub fn with_expires_in(mut self, expires_in: u64) -> Self {
        self.expires_in = expires_in;
        self
    }
}

/// What an export produced.
#[derive(Debug)]
pub struct ExportOutcome {
    /// Uploaded blob; `None` when no records matched and no upload was
    /// performed.
    pub blob: Option<BlobReference>,
    /// Signed access descriptor, when requested and a blob exists.
    pub signed: Option<SignedDescriptor>,
    /// Chunks written, from the pre-transfer count.
    pub chunks: usize,
    /// Records actually written, post-transform.
    pub objects: usize,
    /// Content type of the staged artifact.
    pub content_type: String,
    /// Final output name, compression suffix included.
    pub filename: String,
}

/// Run an export to completion.
///
/// # Errors
///
/// `Configuration` errors surface before any I/O. All later failures are
/// fatal for the transfer; the staged artifact is removed best-effort
/// before they propagate.
pub fn run_export(
    service: &dyn DataService,
    store: &dyn BlobStore,
    options: &TransferOptions,
    request: &ExportRequest,
) -> Result<ExportOutcome> {
    if request.chunk_size == 0 {
        return Err(TransferError::Configuration(
            "chunk size must be at least 1".into(),
        ));
    }
    let codec = codec::format(&request.format)?;

    let content_type = request
        .compression
        .content_type(codec.content_type())
        .to_string();
    let intrinsic = if request.filename.is_empty() {
        format!("export{}", codec.extension())
    } else {
        request.filename.clone()
    };
    let filename = format!("{intrinsic}{}", request.compression.suffix());

    // Counting: a zero-limit query yields the total without records.
    let count = service.find(&Query::new(request.query.clone()).count_only())?;
    let total_chunks = count.total.div_ceil(request.chunk_size);
    debug!(
        total = count.total,
        chunks = total_chunks,
        chunk_size = request.chunk_size,
        "initializing export"
    );
    if total_chunks == 0 {
        // Nothing matched: no staging, no upload, no blob reference.
        return Ok(ExportOutcome {
            blob: None,
            signed: None,
            chunks: 0,
            objects: 0,
            content_type,
            filename,
        });
    }

    std::fs::create_dir_all(&options.working_dir)?;
    let staged: PathBuf = options
        .working_dir
        .join(format!("{}-{filename}", Uuid::new_v4()));
    debug!(path = %staged.display(), "creating staged artifact");

    let result = write_and_upload(
        service,
        store,
        request,
        codec.as_ref(),
        &staged,
        &intrinsic,
        &filename,
        &content_type,
        total_chunks,
    );

    // Cleanup runs on both paths; a failed removal is logged, not raised.
    if let Err(err) = std::fs::remove_file(&staged) {
        if result.is_ok() || err.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %staged.display(), error = %err, "failed to remove staged artifact");
        }
    }
    result
}

#[allow(clippy::too_many_arguments)]
fn write_and_upload(
    service: &dyn DataService,
    store: &dyn BlobStore,
    request: &ExportRequest,
    codec: &dyn codec::FormatCodec,
    staged: &Path,
    intrinsic: &str,
    filename: &str,
    content_type: &str,
    total_chunks: usize,
) -> Result<ExportOutcome> {
    let file = std::fs::File::create(staged)?;
    let mut sink = CompressedSink::new(file, request.compression, intrinsic)?;

    let mut info = ProgressInfo {
        current_chunk: 0,
        total_chunks,
        object_count: 0,
        content_type: content_type.to_string(),
    };

    // Initializing
    sink.write(&codec.begin(&info)?)?;

    // Streaming
    while info.current_chunk < info.total_chunks {
        let skip = info.current_chunk * request.chunk_size;
        debug!(skip, limit = request.chunk_size, "querying chunk");
        let response = service.find(
            &Query::new(request.query.clone()).with_page(request.chunk_size, skip),
        )?;
        // A missing or empty batch is tolerated; pagination gaps count as
        // zero additions rather than failing the transfer.
        if let Some(batch) = path::get(&response.body, &request.chunk_path) {
            let batch = match &request.transform {
                Some(transform) => transform.apply(batch.clone())?,
                None => batch.clone(),
            };
            info.object_count += batch_len(&batch);
            debug!(chunk = info.current_chunk, objects = info.object_count, "writing chunk");
            sink.write(&codec.process(&info, &batch)?)?;
        }
        info.current_chunk += 1;
    }

    // Finalizing: closing framing, archive trailer, durable close.
    sink.write(&codec.end(&info)?)?;
    sink.finalize()?;

    // Uploading
    debug!(path = %staged.display(), content_type, "uploading staged artifact");
    let blob = store.upload_file(staged, content_type)?;
    debug!(id = %blob.id, "upload done");

    // SigningURL
    let signed = if request.signed_url {
        let descriptor = store.create_signed_descriptor(&blob.id, request.expires_in, filename)?;
        debug!(url = %descriptor.url, "signed descriptor created");
        Some(descriptor)
    } else {
        None
    };

    Ok(ExportOutcome {
        blob: Some(blob),
        signed,
        chunks: info.total_chunks,
        objects: info.object_count,
        content_type: content_type.to_string(),
        filename: filename.to_string(),
    })
}

/// Number of records in a batch; a lone record counts as one.
pub(crate) fn batch_len(batch: &Value) -> usize {
    match batch {
        Value::Array(items) => items.len(),
        Value::Null => 0,
        _ => 1,
    }
}
