//! Collaborator interfaces: the object store holding blobs and the record
//! store holding file records.
//!
//! # Module invariants
//!
//! - **No crypto dependencies.** Stores move opaque bytes and records; they
//!   never see keys or plaintext of protected files.
//! - Every error is classified as a [`StoreError`] so the governor knows
//!   what it may retry.

pub mod memory;
pub mod records;
pub mod s3;

pub use memory::{MemoryObjectStore, MemoryRecordStore};
pub use records::JsonRecordStore;
pub use s3::S3ObjectStore;

use async_trait::async_trait;
use bytes::Bytes;
use common::{FileRecord, StoreError};

/// Opaque byte storage keyed by path.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the object stored at `path`.
    async fn get(&self, path: &str) -> Result<Bytes, StoreError>;

    /// Store `body` at `path`, replacing any previous object.
    async fn put(&self, path: &str, body: Bytes) -> Result<(), StoreError>;

    /// Remove the object at `path`. Removing a missing object succeeds.
    async fn delete(&self, path: &str) -> Result<(), StoreError>;
}

/// File-record storage keyed by record id.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch the record with `id`.
    async fn get(&self, id: &str) -> Result<FileRecord, StoreError>;

    /// Insert or replace `record`.
    async fn put(&self, record: &FileRecord) -> Result<(), StoreError>;
}
