//! JSON codec: one top-level array across all chunks.

use super::{FormatCodec, ParseCodec, ProgressInfo, RecordItems, array_body};
use crate::error::{Result, TransferError};
use serde_json::Value;
use std::io::Read;

/// Records per item yielded by the array parsers, so one import write stays
/// bounded regardless of blob size.
pub(crate) const PARSE_SLICE: usize = 500;

pub struct JsonCodec;

impl FormatCodec for JsonCodec {
    fn key(&self) -> &str {
        "json"
    }

    fn content_type(&self) -> &str {
        "application/json"
    }

    fn extension(&self) -> &str {
        ".json"
    }

    fn begin(&self, _info: &ProgressInfo) -> Result<Vec<u8>> {
        Ok(b"[".to_vec())
    }

    fn process(&self, info: &ProgressInfo, batch: &Value) -> Result<Vec<u8>> {
        array_body(info, batch)
    }

    fn end(&self, _info: &ProgressInfo) -> Result<Vec<u8>> {
        Ok(b"]".to_vec())
    }
}

pub struct JsonParser;

impl ParseCodec for JsonParser {
    fn content_types(&self) -> &[&str] {
        &["application/json"]
    }

    fn parse_stream(&self, mut reader: Box<dyn Read>) -> Result<RecordItems> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let value: Value = serde_json::from_slice(&bytes)
            .map_err(|err| TransferError::Parse(format!("invalid JSON: {err}")))?;
        Ok(match value {
            Value::Array(records) => slice_items(records),
            lone => Box::new(std::iter::once(Ok(lone))),
        })
    }
}

/// Yield `records` as array slices of at most [`PARSE_SLICE`] elements.
pub(crate) fn slice_items(records: Vec<Value>) -> RecordItems {
    let mut slices: Vec<Value> = Vec::new();
    let mut records = records;
    while !records.is_empty() {
        let rest = records.split_off(records.len().min(PARSE_SLICE));
        slices.push(Value::Array(std::mem::replace(&mut records, rest)));
    }
    Box::new(slices.into_iter().map(Ok))
}
