//! CSV codec. The header row is emitted once, on chunk 0; field order is
//! the first record's key order, held stable across the whole export.

use super::{FormatCodec, ParseCodec, ProgressInfo, RecordItems};
use crate::error::{Result, TransferError};
use serde_json::{Map, Value};
use std::io::Read;

pub struct CsvCodec;

impl FormatCodec for CsvCodec {
    fn key(&self) -> &str {
        "csv"
    }

    fn content_type(&self) -> &str {
        "text/csv"
    }

    fn extension(&self) -> &str {
        ".csv"
    }

    fn begin(&self, _info: &ProgressInfo) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }

    fn process(&self, info: &ProgressInfo, batch: &Value) -> Result<Vec<u8>> {
        let records: Vec<&Map<String, Value>> = match batch {
            Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
            Value::Object(map) => vec![map],
            _ => Vec::new(),
        };
        let Some(first) = records.first() else {
            return Ok(Vec::new());
        };
        let fields: Vec<&String> = first.keys().collect();

        let mut writer = csv::Writer::from_writer(Vec::new());
        if info.current_chunk == 0 {
            writer
                .write_record(&fields)
                .map_err(|err| TransferError::Parse(format!("write CSV header: {err}")))?;
        }
        for record in &records {
            let row: Vec<String> = fields
                .iter()
                .map(|field| cell(record.get(field.as_str())))
                .collect();
            writer
                .write_record(&row)
                .map_err(|err| TransferError::Parse(format!("write CSV row: {err}")))?;
        }
        writer
            .into_inner()
            .map_err(|err| TransferError::Parse(format!("flush CSV chunk: {err}")))
    }

    fn end(&self, _info: &ProgressInfo) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }
}

/// Render one value as a CSV cell. Strings stay raw (the writer handles
/// quoting), null becomes empty, structured values fall back to JSON text.
fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    }
}

pub struct CsvParser;

impl ParseCodec for CsvParser {
    fn content_types(&self) -> &[&str] {
        &["text/csv"]
    }

    fn parse_stream(&self, reader: Box<dyn Read>) -> Result<RecordItems> {
        let mut rows = csv::Reader::from_reader(reader);
        let headers = rows
            .headers()
            .map_err(|err| TransferError::Parse(format!("read CSV header: {err}")))?
            .clone();
        Ok(Box::new(rows.into_records().map(move |row| {
            let row = row.map_err(|err| TransferError::Parse(format!("read CSV row: {err}")))?;
            let mut record = Map::new();
            for (field, value) in headers.iter().zip(row.iter()) {
                record.insert(field.to_string(), Value::String(value.to_string()));
            }
            Ok(Value::Object(record))
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn info(current: usize) -> ProgressInfo {
        ProgressInfo {
            current_chunk: current,
            total_chunks: 3,
            object_count: 0,
            content_type: "text/csv".to_string(),
        }
    }

    #[test]
    fn header_only_on_first_chunk() {
        let codec = CsvCodec;
        let batch = json!([{"city": "Oslo", "population": 1048}]);
        let first = String::from_utf8(codec.process(&info(0), &batch).unwrap()).unwrap();
        assert_eq!(first, "city,population\nOslo,1048\n");
        let later = String::from_utf8(codec.process(&info(1), &batch).unwrap()).unwrap();
        assert_eq!(later, "Oslo,1048\n");
    }

    #[test]
    fn cells_handle_null_and_quoting() {
        let codec = CsvCodec;
        let batch = json!([{"name": "a,b", "note": null}]);
        let out = String::from_utf8(codec.process(&info(0), &batch).unwrap()).unwrap();
        assert_eq!(out, "name,note\n\"a,b\",\n");
    }

    #[test]
    fn empty_batch_emits_nothing() {
        let codec = CsvCodec;
        assert!(codec.process(&info(1), &json!([])).unwrap().is_empty());
    }

    #[test]
    fn parser_yields_one_string_valued_record_per_row() {
        let data = b"city,population\nOslo,1048\nBergen,291\n".to_vec();
        let items: Vec<Value> = CsvParser
            .parse_stream(Box::new(std::io::Cursor::new(data)))
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(
            items,
            vec![
                json!({"city": "Oslo", "population": "1048"}),
                json!({"city": "Bergen", "population": "291"})
            ]
        );
    }
}
