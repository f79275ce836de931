//! Persisted file-record layout owned by the external record store.
//!
//! Field names match the stored documents exactly (`is_encrypted`,
//! `encryption_key`, `metadata.isPasswordProtected`, ...). These booleans and
//! optional strings overlap; `vault-core` collapses them into one protection
//! mode and treats this struct purely as the wire format.

use serde::{Deserialize, Serialize};

/// One file record as stored by the record store.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Record identifier, unique per owner.
    pub id: String,
    /// Owning user.
    pub owner_id: String,
    /// Containing folder, `None` for the owner's root.
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Display name of the file.
    pub name: String,
    /// Object-store path of the (possibly encrypted) payload.
    pub storage_path: String,
    /// Whether the payload at `storage_path` is an encrypted blob.
    #[serde(default)]
    pub is_encrypted: bool,
    /// Base64 random key; present only in random-key mode.
    #[serde(default)]
    pub encryption_key: Option<String>,
    #[serde(default)]
    pub metadata: RecordMetadata,
}

/// Protection metadata nested under `metadata` in the stored record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMetadata {
    #[serde(default)]
    pub is_password_protected: bool,
    /// Base64 PBKDF2 salt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
    /// Base64 verification tag of the password envelope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_hash: Option<String>,
    /// Enrolled face embedding, stored verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face_descriptor: Option<Vec<f64>>,
}

impl std::fmt::Debug for FileRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key tokens never reach debug output.
        f.debug_struct("FileRecord")
            .field("id", &self.id)
            .field("owner_id", &self.owner_id)
            .field("parent_id", &self.parent_id)
            .field("name", &self.name)
            .field("storage_path", &self.storage_path)
            .field("is_encrypted", &self.is_encrypted)
            .field(
                "encryption_key",
                &self.encryption_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("password_protected", &self.metadata.is_password_protected)
            .field("face_enrolled", &self.metadata.face_descriptor.is_some())
            .finish()
    }
}
