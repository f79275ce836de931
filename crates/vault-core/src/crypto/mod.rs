//! AES-256-GCM file encryption primitives.
//!
//! This module is intentionally free of storage and network dependencies.
//! It provides the random-key engine ([`SymmetricCipher`]) and the
//! password-derived engine ([`PasswordCipher`]) used by the protection flows.
//!
//! # Blob format
//!
//! ```text
//! [12-byte IV][ciphertext || 16-byte GCM tag]
//! ```
//!
//! The layout is opaque to the object store and has no version prefix; the
//! PBKDF2 iteration count is fixed so that stored envelopes stay readable.

pub mod cipher;
pub mod password;
pub mod provider;

pub use cipher::{EncryptedBlob, SymmetricCipher};
pub use password::{PasswordCipher, PasswordEnvelope, PasswordProtected};
pub use provider::{AesGcmProvider, CipherKey, CryptoError, CryptoProvider};

/// Byte length of an AES-256 key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// Byte length of an AES-GCM IV (12 bytes = 96 bits).
pub const IV_LEN: usize = 12;

/// Byte length of the GCM authentication tag appended to every ciphertext.
pub const TAG_LEN: usize = 16;

/// Byte length of a PBKDF2 salt.
pub const SALT_LEN: usize = 16;

/// PBKDF2-HMAC-SHA256 iteration count. Part of the stored format; never configurable.
pub const PBKDF2_ITERATIONS: u32 = 100_000;
