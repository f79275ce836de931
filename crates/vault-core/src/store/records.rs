//! [`JsonRecordStore`]: file records kept as JSON documents in an object store.

use async_trait::async_trait;
use bytes::Bytes;
use common::{FileRecord, StoreError};

use super::{ObjectStore, RecordStore};

/// Key prefix under which record documents are written.
pub const RECORD_PREFIX: &str = "records/";

/// [`RecordStore`] that serialises each record to `records/<id>.json`.
#[derive(Clone, Debug)]
pub struct JsonRecordStore<S> {
    objects: S,
}

impl<S: ObjectStore> JsonRecordStore<S> {
    pub fn new(objects: S) -> Self {
        Self { objects }
    }

    fn path(id: &str) -> String {
        format!("{RECORD_PREFIX}{id}.json")
    }
}

#[async_trait]
impl<S: ObjectStore> RecordStore for JsonRecordStore<S> {
    async fn get(&self, id: &str) -> Result<FileRecord, StoreError> {
        let body = self.objects.get(&Self::path(id)).await?;
        serde_json::from_slice(&body)
            .map_err(|e| StoreError::Permanent(format!("record {id} is not valid JSON: {e}")))
    }

    async fn put(&self, record: &FileRecord) -> Result<(), StoreError> {
        let body = serde_json::to_vec(record)
            .map_err(|e| StoreError::Permanent(format!("failed to serialise record: {e}")))?;
        self.objects
            .put(&Self::path(&record.id), Bytes::from(body))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryObjectStore, MockObjectStore};

    #[tokio::test]
    async fn record_round_trips_through_object_store() {
        let objects = MemoryObjectStore::new();
        let store = JsonRecordStore::new(objects.clone());
        let rec = FileRecord {
            id: "f9".into(),
            owner_id: "u1".into(),
            name: "scan.png".into(),
            storage_path: "u1/f9".into(),
            ..Default::default()
        };
        store.put(&rec).await.unwrap();
        assert!(objects.get("records/f9.json").await.is_ok());
        assert_eq!(store.get("f9").await.unwrap(), rec);
    }

    #[tokio::test]
    async fn garbage_document_is_permanent_error() {
        let mut objects = MockObjectStore::new();
        objects
            .expect_get()
            .returning(|_| Ok(Bytes::from_static(b"{not json")));
        let store = JsonRecordStore::new(objects);
        assert!(matches!(
            store.get("f1").await,
            Err(StoreError::Permanent(_))
        ));
    }

    #[tokio::test]
    async fn transient_errors_pass_through_unchanged() {
        let mut objects = MockObjectStore::new();
        objects
            .expect_get()
            .returning(|_| Err(StoreError::Transient("timeout".into())));
        let store = JsonRecordStore::new(objects);
        assert_eq!(
            store.get("f1").await.unwrap_err(),
            StoreError::Transient("timeout".into())
        );
    }
}
