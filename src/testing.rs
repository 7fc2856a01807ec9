//! Fake collaborators for testing.
//!
//! In-memory implementations of [`DataService`] and [`BlobStore`], so
//! pipelines can be exercised without external services. Both record
//! enough about the calls they receive for tests to assert on (upload
//! counts, stored bytes, created batches).

use crate::matcher;
use crate::services::{
    BlobDownload, BlobReference, BlobStore, DataService, FindResult, Query, ServiceError,
    ServiceErrorKind, ServiceResult, SignedDescriptor,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Transfer options rooted in a fresh scratch directory.
///
/// Keep the returned guard alive for the duration of the test; the
/// directory is removed when it drops.
///
/// # Panics
///
/// Panics if the scratch directory cannot be created.
#[must_use]
pub fn scratch_options() -> (crate::TransferOptions, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("create scratch dir");
    let options = crate::TransferOptions::default().with_working_dir(dir.path());
    (options, dir)
}

// ============================================================================
// FakeDataService
// ============================================================================

/// In-memory record collection with mongo-style filtering and pagination.
#[derive(Clone, Default)]
pub struct FakeDataService {
    records: Arc<Mutex<Vec<Value>>>,
}

impl FakeDataService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the collection.
    #[must_use]
    pub fn with_records(records: Vec<Value>) -> Self {
        Self {
            records: Arc::new(Mutex::new(records)),
        }
    }

    /// Snapshot of the stored records.
    ///
    /// # Panics
    ///
    /// Panics if the records mutex is poisoned.
    pub fn records(&self) -> Vec<Value> {
        self.records.lock().expect("records mutex poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("records mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DataService for FakeDataService {
    fn find(&self, query: &Query) -> ServiceResult<FindResult> {
        let records = self.records.lock().expect("records mutex poisoned");
        let matched: Vec<&Value> = records
            .iter()
            .filter(|record| matcher::matches(record, &query.filter))
            .collect();
        let total = matched.len();
        let page: Vec<Value> = match query.limit {
            Some(0) => Vec::new(),
            Some(limit) => matched
                .into_iter()
                .skip(query.skip.unwrap_or(0))
                .take(limit)
                .cloned()
                .collect(),
            None => matched.into_iter().cloned().collect(),
        };
        Ok(FindResult {
            total,
            body: json!({ "total": total, "data": page }),
        })
    }

    fn create(&self, batch: Value) -> ServiceResult<Value> {
        let mut incoming = match batch {
            Value::Array(items) => items,
            lone => vec![lone],
        };
        for record in &mut incoming {
            let Value::Object(map) = record else {
                return Err(ServiceError::new(
                    ServiceErrorKind::InvalidInput,
                    format!("expected an object record, got {record}"),
                ));
            };
            // Storage-assigned identifier, like a real document store.
            map.entry("_id".to_string())
                .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        }
        let mut records = self.records.lock().expect("records mutex poisoned");
        records.extend(incoming.iter().cloned());
        Ok(Value::Array(incoming))
    }
}

// ============================================================================
// FakeBlobStore
// ============================================================================

/// In-memory blob store keyed by object id.
#[derive(Clone, Default)]
pub struct FakeBlobStore {
    objects: Arc<Mutex<HashMap<String, (String, Vec<u8>)>>>,
    uploads: Arc<Mutex<usize>>,
}

impl FakeBlobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a blob directly, as if previously uploaded.
    ///
    /// # Panics
    ///
    /// Panics if the objects mutex is poisoned.
    pub fn put(&self, id: &str, content_type: &str, bytes: Vec<u8>) {
        self.objects
            .lock()
            .expect("objects mutex poisoned")
            .insert(id.to_string(), (content_type.to_string(), bytes));
    }

    /// Stored bytes for a blob id, if present.
    pub fn object(&self, id: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .expect("objects mutex poisoned")
            .get(id)
            .map(|(_, bytes)| bytes.clone())
    }

    /// Number of `upload_file` calls performed.
    pub fn upload_count(&self) -> usize {
        *self.uploads.lock().expect("uploads mutex poisoned")
    }
}

impl BlobStore for FakeBlobStore {
    fn upload_file(&self, path: &Path, content_type: &str) -> ServiceResult<BlobReference> {
        let bytes = std::fs::read(path).map_err(|err| {
            ServiceError::new(
                ServiceErrorKind::Internal,
                format!("read {}: {err}", path.display()),
            )
        })?;
        let id = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        self.objects
            .lock()
            .expect("objects mutex poisoned")
            .insert(id.clone(), (content_type.to_string(), bytes));
        *self.uploads.lock().expect("uploads mutex poisoned") += 1;
        Ok(BlobReference {
            id,
            content_type: content_type.to_string(),
        })
    }

    fn get_object_stream(&self, id: &str) -> ServiceResult<BlobDownload> {
        let objects = self.objects.lock().expect("objects mutex poisoned");
        let (content_type, bytes) = objects.get(id).ok_or_else(|| {
            ServiceError::new(ServiceErrorKind::NotFound, format!("no blob '{id}'"))
        })?;
        Ok(BlobDownload {
            content_type: content_type.clone(),
            body: Box::new(Cursor::new(bytes.clone())),
        })
    }

    fn create_signed_descriptor(
        &self,
        id: &str,
        expires_in: u64,
        filename: &str,
    ) -> ServiceResult<SignedDescriptor> {
        let objects = self.objects.lock().expect("objects mutex poisoned");
        if !objects.contains_key(id) {
            return Err(ServiceError::new(
                ServiceErrorKind::NotFound,
                format!("no blob '{id}'"),
            ));
        }
        Ok(SignedDescriptor {
            url: format!("https://blobs.invalid/{id}?expires={expires_in}"),
            expires_in,
            filename: filename.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_filters_counts_and_paginates() {
        let service =
            FakeDataService::with_records((0..10).map(|i| json!({"i": i})).collect());
        let result = service
            .find(&Query::new(json!({"i": {"$gte": 4}})).count_only())
            .unwrap();
        assert_eq!(result.total, 6);
        assert_eq!(result.body["data"], json!([]));

        let result = service
            .find(&Query::new(json!({"i": {"$gte": 4}})).with_page(2, 2))
            .unwrap();
        assert_eq!(result.total, 6);
        assert_eq!(result.body["data"], json!([{"i": 6}, {"i": 7}]));
    }

    #[test]
    fn create_assigns_ids_and_appends() {
        let service = FakeDataService::new();
        let created = service.create(json!([{"a": 1}, {"a": 2}])).unwrap();
        assert_eq!(created.as_array().unwrap().len(), 2);
        assert!(created[0]["_id"].is_string());
        assert_eq!(service.len(), 2);
    }

    #[test]
    fn blob_store_round_trips_bytes() {
        let store = FakeBlobStore::new();
        store.put("x.json", "application/json", b"[]".to_vec());
        let mut download = store.get_object_stream("x.json").unwrap();
        let mut bytes = Vec::new();
        std::io::Read::read_to_end(&mut download.body, &mut bytes).unwrap();
        assert_eq!(bytes, b"[]");
        assert!(store.get_object_stream("missing").is_err());
    }
}
