//! GeoJSON codec: one FeatureCollection whose features span all chunks.

use super::json::slice_items;
use super::{FormatCodec, ParseCodec, ProgressInfo, RecordItems, array_body};
use crate::error::{Result, TransferError};
use serde_json::Value;
use std::io::Read;

pub struct GeoJsonCodec;

impl FormatCodec for GeoJsonCodec {
    fn key(&self) -> &str {
        "geojson"
    }

    fn content_type(&self) -> &str {
        "application/geo+json"
    }

    fn extension(&self) -> &str {
        ".geojson"
    }

    fn begin(&self, _info: &ProgressInfo) -> Result<Vec<u8>> {
        Ok(b"{ \"type\": \"FeatureCollection\", \"features\": [".to_vec())
    }

    fn process(&self, info: &ProgressInfo, batch: &Value) -> Result<Vec<u8>> {
        array_body(info, batch)
    }

    fn end(&self, _info: &ProgressInfo) -> Result<Vec<u8>> {
        Ok(b"]}".to_vec())
    }
}

pub struct GeoJsonParser;

impl ParseCodec for GeoJsonParser {
    fn content_types(&self) -> &[&str] {
        &["application/geo+json"]
    }

    fn parse_stream(&self, mut reader: Box<dyn Read>) -> Result<RecordItems> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let mut value: Value = serde_json::from_slice(&bytes)
            .map_err(|err| TransferError::Parse(format!("invalid GeoJSON: {err}")))?;
        let features = value
            .get_mut("features")
            .map(Value::take)
            .ok_or_else(|| TransferError::Parse("GeoJSON without a 'features' member".into()))?;
        let Value::Array(features) = features else {
            return Err(TransferError::Parse("GeoJSON 'features' is not an array".into()));
        };
        Ok(slice_items(features))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn export_produces_a_feature_collection() {
        let codec = GeoJsonCodec;
        let info = ProgressInfo {
            current_chunk: 0,
            total_chunks: 1,
            object_count: 0,
            content_type: codec.content_type().to_string(),
        };
        let feature = json!({"type": "Feature", "geometry": null, "properties": {"n": 1}});
        let mut out = codec.begin(&info).unwrap();
        out.extend(codec.process(&info, &json!([feature])).unwrap());
        out.extend(codec.end(&info).unwrap());
        let parsed: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed["type"], "FeatureCollection");
        assert_eq!(parsed["features"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn parser_extracts_features() {
        let collection = json!({
            "type": "FeatureCollection",
            "features": [{"type": "Feature"}, {"type": "Feature"}]
        });
        let bytes = serde_json::to_vec(&collection).unwrap();
        let items: Vec<Value> = GeoJsonParser
            .parse_stream(Box::new(std::io::Cursor::new(bytes)))
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_array().unwrap().len(), 2);
    }

    #[test]
    fn parser_rejects_non_collections() {
        let result = GeoJsonParser
            .parse_stream(Box::new(std::io::Cursor::new(b"{\"type\":\"Feature\"}".to_vec())));
        assert!(matches!(result, Err(TransferError::Parse(_))));
    }
}
