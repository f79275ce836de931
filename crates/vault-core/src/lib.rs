//! `vault-core`: client-side file protection.
//!
//! - [`crypto`]: AES-256-GCM random-key engine and the PBKDF2 password engine.
//! - [`biometric`]: face descriptors and the Euclidean matcher.
//! - [`governor`]: FIFO concurrency cap with retry inside one slot.
//! - [`store`]: object and record stores (S3, JSON records, in-memory).
//! - [`protect`]: the [`FileProtector`] facade tying them together.

pub mod biometric;
pub mod crypto;
pub mod governor;
pub mod protect;
pub mod store;

pub use common::{FileRecord, ProtectionError, RecordMetadata, StoreError};
pub use protect::{Credential, FileProtector, Protection, ProtectionMode, ProtectorConfig};
