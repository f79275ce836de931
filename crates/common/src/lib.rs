//! Common types, persisted record layout, and errors shared across `filevault` crates.

pub mod error;
pub mod record;

pub use error::{ProtectionError, StoreError};
pub use record::{FileRecord, RecordMetadata};
