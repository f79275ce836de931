//! In-process stores for tests and local runs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use common::{FileRecord, StoreError};
use tokio::sync::RwLock;

use super::{ObjectStore, RecordStore};

/// Thread-safe in-memory [`ObjectStore`]. Clones share the same contents.
#[derive(Clone, Debug, Default)]
pub struct MemoryObjectStore {
    inner: Arc<RwLock<HashMap<String, Bytes>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Returns `true` if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, path: &str) -> Result<Bytes, StoreError> {
        self.inner
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(path.to_owned()))
    }

    async fn put(&self, path: &str, body: Bytes) -> Result<(), StoreError> {
        self.inner.write().await.insert(path.to_owned(), body);
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.inner.write().await.remove(path);
        Ok(())
    }
}

/// Thread-safe in-memory [`RecordStore`]. Clones share the same contents.
#[derive(Clone, Debug, Default)]
pub struct MemoryRecordStore {
    inner: Arc<RwLock<HashMap<String, FileRecord>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get(&self, id: &str) -> Result<FileRecord, StoreError> {
        self.inner
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("record {id}")))
    }

    async fn put(&self, record: &FileRecord) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(())
    }
}
