//! Pluggable per-format serializers and parsers.
//!
//! Formats are registered globally and looked up by key (serializers, e.g.
//! `"json"`) or by content type (parsers, e.g. `"application/json"`), so
//! adding a format never touches pipeline code.
//!
//! ## Serializer contract
//!
//! `begin`/`end` emit structural framing (an opening bracket, a trailing
//! `]}`); `process` emits one batch's payload. Implementations must be
//! stateless across batches except via [`ProgressInfo`] — a codec may
//! branch on `info.current_chunk == 0` to emit a CSV header once, or on
//! `info.current_chunk < info.total_chunks - 1` to omit a trailing
//! separator on the final chunk.
//!
//! ## Parser contract
//!
//! [`ParseCodec::parse_stream`] turns raw bytes into a finite iterator of
//! record items. An item may itself be a batch (one JSON array slice) or a
//! single record (one CSV row); the iterator is not restartable — create a
//! new stream per import.
//!
//! ## Built-in formats
//!
//! - **json** — `application/json`, `.json`
//! - **geojson** — `application/geo+json`, `.geojson`
//! - **csv** — `text/csv`, `.csv` (feature `format-csv`)
//!
//! Custom formats are added with [`register_format`] / [`register_parser`].

mod geojson;
mod json;

#[cfg(feature = "format-csv")]
mod csv;

#[cfg(feature = "format-csv")]
pub use csv::CsvCodec;
pub use geojson::GeoJsonCodec;
pub use json::JsonCodec;

use crate::error::{Result, TransferError};
use serde_json::Value;
use std::io::Read;
use std::sync::{Arc, RwLock};

/// Export progress shared with codecs.
///
/// Mutated only by the export driving loop; codecs read it to decide on
/// framing. `total_chunks` is computed once from the pre-transfer count
/// query and never recomputed, so a collection resized mid-transfer still
/// terminates at the original chunk count.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Chunk currently being written, `0..total_chunks`.
    pub current_chunk: usize,
    /// Chunk count derived from the count query; a pre-transfer estimate.
    pub total_chunks: usize,
    /// Records written so far, post-transform.
    pub object_count: usize,
    /// Content type resolved for the whole transfer.
    pub content_type: String,
}

/// Per-format serializer.
pub trait FormatCodec: Send + Sync {
    /// Registry key (e.g. `"json"`).
    fn key(&self) -> &str;

    /// Content type of the uncompressed output.
    fn content_type(&self) -> &str;

    /// Intrinsic file extension, including the leading dot.
    fn extension(&self) -> &str;

    /// Emit opening framing. May be empty.
    ///
    /// # Errors
    ///
    /// Returns an error if framing cannot be produced.
    fn begin(&self, info: &ProgressInfo) -> Result<Vec<u8>>;

    /// Emit one batch's serialized payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch cannot be serialized.
    fn process(&self, info: &ProgressInfo, batch: &Value) -> Result<Vec<u8>>;

    /// Emit closing framing. May be empty.
    ///
    /// # Errors
    ///
    /// Returns an error if framing cannot be produced.
    fn end(&self, info: &ProgressInfo) -> Result<Vec<u8>>;
}

/// Items produced by a parse stream.
pub type RecordItems = Box<dyn Iterator<Item = Result<Value>>>;

/// Per-content-type parser.
pub trait ParseCodec: Send + Sync {
    /// Content types this parser accepts.
    fn content_types(&self) -> &[&str];

    /// Turn raw bytes into a finite sequence of record items.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot be read or is structurally
    /// malformed. Per-item errors surface through the iterator.
    fn parse_stream(&self, reader: Box<dyn Read>) -> Result<RecordItems>;
}

// ============================================================================
// Registries
// ============================================================================

static FORMAT_REGISTRY: RwLock<Option<Vec<Arc<dyn FormatCodec>>>> = RwLock::new(None);
static PARSER_REGISTRY: RwLock<Option<Vec<Arc<dyn ParseCodec>>>> = RwLock::new(None);

fn init_formats() -> Vec<Arc<dyn FormatCodec>> {
    vec![
        Arc::new(JsonCodec),
        Arc::new(GeoJsonCodec),
        #[cfg(feature = "format-csv")]
        Arc::new(CsvCodec),
    ]
}

fn init_parsers() -> Vec<Arc<dyn ParseCodec>> {
    vec![
        Arc::new(json::JsonParser),
        Arc::new(geojson::GeoJsonParser),
        #[cfg(feature = "format-csv")]
        Arc::new(csv::CsvParser),
    ]
}

/// Register a custom serializer alongside the built-ins.
pub fn register_format(codec: Arc<dyn FormatCodec>) {
    let mut lock = FORMAT_REGISTRY.write().unwrap();
    lock.get_or_insert_with(init_formats).push(codec);
}

/// Register a custom parser alongside the built-ins.
pub fn register_parser(parser: Arc<dyn ParseCodec>) {
    let mut lock = PARSER_REGISTRY.write().unwrap();
    lock.get_or_insert_with(init_parsers).push(parser);
}

/// Look up a serializer by format key.
///
/// # Errors
///
/// Returns a `Configuration` error for an unknown key; this happens before
/// any I/O.
pub fn format(key: &str) -> Result<Arc<dyn FormatCodec>> {
    let mut lock = FORMAT_REGISTRY.write().unwrap();
    lock.get_or_insert_with(init_formats)
        .iter()
        .find(|codec| codec.key() == key)
        .cloned()
        .ok_or_else(|| TransferError::Configuration(format!("format '{key}' not supported")))
}

/// Look up a parser by content type.
///
/// # Errors
///
/// Returns a `Configuration` error for an unknown content type.
pub fn parser(content_type: &str) -> Result<Arc<dyn ParseCodec>> {
    let mut lock = PARSER_REGISTRY.write().unwrap();
    lock.get_or_insert_with(init_parsers)
        .iter()
        .find(|parser| parser.content_types().contains(&content_type))
        .cloned()
        .ok_or_else(|| {
            TransferError::Configuration(format!("content type '{content_type}' not supported"))
        })
}

/// Serialize a batch array without its outer brackets, so consecutive
/// chunks concatenate into one valid array body. Shared by the JSON-shaped
/// codecs.
pub(crate) fn array_body(info: &ProgressInfo, batch: &Value) -> Result<Vec<u8>> {
    let serialized = serde_json::to_string(batch)
        .map_err(|err| TransferError::Parse(format!("serialize batch: {err}")))?;
    let mut body = if batch.is_array() {
        serialized[1..serialized.len() - 1].to_string()
    } else {
        serialized
    };
    if info.current_chunk < info.total_chunks.saturating_sub(1) {
        body.push(',');
    }
    Ok(body.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn info(current: usize, total: usize) -> ProgressInfo {
        ProgressInfo {
            current_chunk: current,
            total_chunks: total,
            object_count: 0,
            content_type: "application/json".to_string(),
        }
    }

    #[test]
    fn unknown_format_is_a_configuration_error() {
        assert!(matches!(
            format("parquet"),
            Err(TransferError::Configuration(_))
        ));
    }

    #[test]
    fn unknown_content_type_is_a_configuration_error() {
        assert!(matches!(
            parser("application/x-unknown"),
            Err(TransferError::Configuration(_))
        ));
    }

    #[test]
    fn builtin_lookup_by_key_and_content_type() {
        assert_eq!(format("json").unwrap().content_type(), "application/json");
        assert_eq!(format("geojson").unwrap().extension(), ".geojson");
        assert!(parser("application/geo+json").is_ok());
    }

    #[test]
    fn array_body_separates_all_but_last_chunk() {
        let batch = json!([{"a": 1}, {"a": 2}]);
        let mid = array_body(&info(0, 3), &batch).unwrap();
        assert_eq!(mid.last(), Some(&b','));
        let last = array_body(&info(2, 3), &batch).unwrap();
        assert_ne!(last.last(), Some(&b','));
    }

    #[test]
    fn custom_format_registration() {
        struct Tsv;
        impl FormatCodec for Tsv {
            fn key(&self) -> &str {
                "tsv"
            }
            fn content_type(&self) -> &str {
                "text/tab-separated-values"
            }
            fn extension(&self) -> &str {
                ".tsv"
            }
            fn begin(&self, _: &ProgressInfo) -> Result<Vec<u8>> {
                Ok(Vec::new())
            }
            fn process(&self, _: &ProgressInfo, _: &Value) -> Result<Vec<u8>> {
                Ok(Vec::new())
            }
            fn end(&self, _: &ProgressInfo) -> Result<Vec<u8>> {
                Ok(Vec::new())
            }
        }
        register_format(Arc::new(Tsv));
        assert!(format("tsv").is_ok());
    }
}
