use blobport::testing::{FakeBlobStore, FakeDataService, scratch_options};
use blobport::{
    CompressionMode, ExportRequest, FindResult, Query, ServiceResult, Transform, TransferError,
    TransformSpec, run_export,
};
use blobport::services::DataService;
use serde_json::{Value, json};

fn records(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| json!({"_id": format!("id-{i}"), "index": i, "year": 1900 + (i % 100)}))
        .collect()
}

#[test]
fn chunk_count_follows_ceil_law() -> anyhow::Result<()> {
    let (options, _dir) = scratch_options();
    let store = FakeBlobStore::new();
    let service = FakeDataService::with_records(records(23));

    for (chunk_size, expected_chunks) in [(1, 23), (5, 5), (23, 1), (100, 1)] {
        let request = ExportRequest::new("json", &options)
            .with_filename("records.json")
            .with_chunk_size(chunk_size)
            .with_compression(CompressionMode::None);
        let outcome = run_export(&service, &store, &options, &request)?;
        assert_eq!(outcome.chunks, expected_chunks, "chunk size {chunk_size}");
        assert_eq!(outcome.objects, 23, "chunk size {chunk_size}");
    }
    Ok(())
}

#[test]
fn empty_result_short_circuits_without_upload() -> anyhow::Result<()> {
    let (options, dir) = scratch_options();
    let store = FakeBlobStore::new();
    let service = FakeDataService::with_records(records(10));

    let request = ExportRequest::new("json", &options)
        .with_query(json!({"year": 1}))
        .with_filename("none.json");
    let outcome = run_export(&service, &store, &options, &request)?;

    assert_eq!(outcome.chunks, 0);
    assert_eq!(outcome.objects, 0);
    assert!(outcome.blob.is_none());
    assert!(outcome.signed.is_none());
    assert_eq!(store.upload_count(), 0);
    // Nothing staged either.
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
    Ok(())
}

#[test]
fn objects_reflect_post_transform_size() -> anyhow::Result<()> {
    let (options, _dir) = scratch_options();
    let store = FakeBlobStore::new();
    let service = FakeDataService::with_records(records(40));

    // The filter transform drops records inside chunks; the chunk count is
    // a pre-transfer estimate and stays put.
    let spec: TransformSpec =
        serde_json::from_value(json!({"filter": {"year": {"$lt": 1920}}}))?;
    let request = ExportRequest::new("json", &options)
        .with_filename("filtered.json")
        .with_chunk_size(10)
        .with_transform(spec)
        .with_compression(CompressionMode::None);
    let outcome = run_export(&service, &store, &options, &request)?;

    assert_eq!(outcome.chunks, 4);
    assert_eq!(outcome.objects, 20);
    Ok(())
}

#[test]
fn callback_transform_reshapes_the_export() -> anyhow::Result<()> {
    let (options, _dir) = scratch_options();
    let store = FakeBlobStore::new();
    let service = FakeDataService::with_records(records(5));

    let callback = |mut batch: Value| -> anyhow::Result<Value> {
        if let Value::Array(items) = &mut batch {
            for item in items.iter_mut() {
                if let Value::Object(map) = item {
                    map.shift_remove("_id");
                    map.insert("tagged".to_string(), json!(true));
                }
            }
        }
        Ok(batch)
    };
    let request = ExportRequest::new("json", &options)
        .with_filename("tagged.json")
        .with_compression(CompressionMode::None)
        .with_transform(Transform::Callback(Box::new(callback)));
    let outcome = run_export(&service, &store, &options, &request)?;

    assert_eq!(outcome.objects, 5);
    let bytes = store.object(&outcome.blob.unwrap().id).unwrap();
    let exported: Vec<Value> = serde_json::from_slice(&bytes)?;
    assert_eq!(exported.len(), 5);
    assert!(exported
        .iter()
        .all(|r| r["tagged"] == json!(true) && r.get("_id").is_none()));
    Ok(())
}

#[test]
fn query_filter_restricts_the_export() -> anyhow::Result<()> {
    let (options, _dir) = scratch_options();
    let store = FakeBlobStore::new();
    let service = FakeDataService::with_records(records(100));

    let request = ExportRequest::new("json", &options)
        .with_query(json!({"$and": [{"year": {"$gte": 1970}}, {"year": {"$lt": 1980}}]}))
        .with_filename("seventies.json")
        .with_chunk_size(4)
        .with_compression(CompressionMode::None);
    let outcome = run_export(&service, &store, &options, &request)?;

    assert_eq!(outcome.objects, 10);
    assert_eq!(outcome.chunks, 3);
    let bytes = store.object(&outcome.blob.unwrap().id).unwrap();
    let exported: Vec<Value> = serde_json::from_slice(&bytes)?;
    assert!(exported.iter().all(|r| {
        let year = r["year"].as_i64().unwrap();
        (1970..1980).contains(&year)
    }));
    Ok(())
}

#[test]
fn large_export_scenario_like_production() -> anyhow::Result<()> {
    let (options, _dir) = scratch_options();
    let store = FakeBlobStore::new();
    let service = FakeDataService::with_records(records(6738));

    let spec: TransformSpec = serde_json::from_value(json!({"omit": ["_id"]}))?;
    let request = ExportRequest::new("json", &options)
        .with_filename("objects.json")
        .with_chunk_size(500)
        .with_transform(spec)
        .with_compression(CompressionMode::None);
    let outcome = run_export(&service, &store, &options, &request)?;

    assert_eq!(outcome.chunks, 14);
    assert_eq!(outcome.objects, 6738);
    assert_eq!(outcome.content_type, "application/json");

    let bytes = store.object(&outcome.blob.unwrap().id).unwrap();
    let exported: Vec<Value> = serde_json::from_slice(&bytes)?;
    assert_eq!(exported.len(), 6738);
    assert!(exported.iter().all(|r| r.get("_id").is_none()));
    Ok(())
}

#[test]
fn csv_export_has_one_header_across_chunks() -> anyhow::Result<()> {
    let (options, _dir) = scratch_options();
    let store = FakeBlobStore::new();
    let service = FakeDataService::with_records(
        (0..6).map(|i| json!({"name": format!("r{i}"), "index": i})).collect(),
    );

    let request = ExportRequest::new("csv", &options)
        .with_filename("records.csv")
        .with_chunk_size(2)
        .with_compression(CompressionMode::None);
    let outcome = run_export(&service, &store, &options, &request)?;

    assert_eq!(outcome.chunks, 3);
    assert_eq!(outcome.content_type, "text/csv");
    let text = String::from_utf8(store.object(&outcome.blob.unwrap().id).unwrap())?;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 7);
    assert_eq!(lines[0], "name,index");
    assert!(lines[1..].iter().all(|line| !line.starts_with("name,")));
    Ok(())
}

#[test]
fn signed_descriptor_is_optional() -> anyhow::Result<()> {
    let (options, _dir) = scratch_options();
    let store = FakeBlobStore::new();
    let service = FakeDataService::with_records(records(3));

    let request = ExportRequest::new("json", &options)
        .with_filename("signed.json")
        .with_expires_in(60);
    let outcome = run_export(&service, &store, &options, &request)?;
    let signed = outcome.signed.expect("signed descriptor requested");
    assert_eq!(signed.expires_in, 60);
    assert_eq!(signed.filename, "signed.json.gz");

    let request = ExportRequest::new("json", &options)
        .with_filename("unsigned.json")
        .with_signed_url(false);
    let outcome = run_export(&service, &store, &options, &request)?;
    assert!(outcome.signed.is_none());
    assert!(outcome.blob.is_some());
    Ok(())
}

#[test]
fn unknown_format_fails_before_any_io() {
    let (options, _dir) = scratch_options();
    let store = FakeBlobStore::new();
    let service = FakeDataService::with_records(records(3));

    let request = ExportRequest::new("parquet", &options).with_filename("nope.parquet");
    let err = run_export(&service, &store, &options, &request).unwrap_err();
    assert!(matches!(err, TransferError::Configuration(_)));
    assert_eq!(store.upload_count(), 0);
}

#[test]
fn transform_failure_cleans_up_the_staged_artifact() -> anyhow::Result<()> {
    let (options, dir) = scratch_options();
    let store = FakeBlobStore::new();
    let service = FakeDataService::with_records(vec![json!({"at": "not a date"})]);

    let spec: TransformSpec =
        serde_json::from_value(json!({"unitMapping": {"at": {"asDate": "utc"}}}))?;
    let request = ExportRequest::new("json", &options)
        .with_filename("bad.json")
        .with_transform(spec);
    let err = run_export(&service, &store, &options, &request).unwrap_err();

    assert!(matches!(err, TransferError::Transform { .. }));
    assert_eq!(store.upload_count(), 0);
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
    Ok(())
}

/// A service whose find response carries the batch at a non-default path,
/// and omits it entirely for one chunk.
struct GappyService {
    inner: FakeDataService,
}

impl DataService for GappyService {
    fn find(&self, query: &Query) -> ServiceResult<FindResult> {
        let result = self.inner.find(query)?;
        // Second page comes back without a batch at all.
        if query.skip == Some(2) {
            return Ok(FindResult {
                total: result.total,
                body: json!({"total": result.total}),
            });
        }
        Ok(FindResult {
            total: result.total,
            body: json!({"nested": {"rows": result.body["data"]}}),
        })
    }

    fn create(&self, batch: Value) -> ServiceResult<Value> {
        self.inner.create(batch)
    }
}

#[test]
fn missing_chunk_batches_are_tolerated() -> anyhow::Result<()> {
    let (options, _dir) = scratch_options();
    let store = FakeBlobStore::new();
    let service = GappyService {
        inner: FakeDataService::with_records(records(6)),
    };

    let mut request = ExportRequest::new("json", &options)
        .with_filename("gappy.json")
        .with_chunk_size(2)
        .with_compression(CompressionMode::None);
    request.chunk_path = "nested.rows".to_string();
    let outcome = run_export(&service, &store, &options, &request)?;

    // Three chunks scheduled, the gap contributed zero objects.
    assert_eq!(outcome.chunks, 3);
    assert_eq!(outcome.objects, 4);
    let bytes = store.object(&outcome.blob.unwrap().id).unwrap();
    let exported: Vec<Value> = serde_json::from_slice(&bytes)?;
    assert_eq!(exported.len(), 4);
    Ok(())
}
