//! [`ProtectionMode`]: the single discriminant behind the legacy record flags.
//!
//! Stored records describe protection through overlapping fields
//! (`is_encrypted`, `encryption_key`, `metadata.isPasswordProtected`,
//! `metadata.salt`, `metadata.verificationHash`). They are read and written
//! only here; the rest of the crate matches on [`ProtectionMode`].

use common::{FileRecord, ProtectionError};

use crate::crypto::{CipherKey, PasswordEnvelope};

/// How a file's payload is protected.
#[derive(Debug, Clone)]
pub enum ProtectionMode {
    /// Payload stored in the clear.
    Unprotected,
    /// Payload encrypted under a random key stored in the record.
    RandomKey { key: CipherKey },
    /// Payload encrypted under a password-derived key; only the envelope is stored.
    PasswordDerived { envelope: PasswordEnvelope },
}

impl ProtectionMode {
    /// Short label for logs.
    pub fn name(&self) -> &'static str {
        match self {
            ProtectionMode::Unprotected => "unprotected",
            ProtectionMode::RandomKey { .. } => "random_key",
            ProtectionMode::PasswordDerived { .. } => "password_derived",
        }
    }

    /// Interpret the legacy flags of `record`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtectionError::InvalidRecord`] for inconsistent flag
    /// combinations, and [`ProtectionError::InvalidKey`] for an undecodable key token.
    pub fn from_record(record: &FileRecord) -> Result<Self, ProtectionError> {
        let meta = &record.metadata;
        if !record.is_encrypted {
            if meta.is_password_protected || record.encryption_key.is_some() {
                return Err(ProtectionError::InvalidRecord(
                    "unencrypted record carries key material".into(),
                ));
            }
            return Ok(ProtectionMode::Unprotected);
        }

        if meta.is_password_protected {
            return match (&meta.salt, &meta.verification_hash) {
                (Some(salt), Some(tag)) => Ok(ProtectionMode::PasswordDerived {
                    envelope: PasswordEnvelope::from_base64(salt, tag)?,
                }),
                _ => Err(ProtectionError::InvalidRecord(
                    "password-protected record is missing salt or verification hash".into(),
                )),
            };
        }

        match &record.encryption_key {
            Some(token) => Ok(ProtectionMode::RandomKey {
                key: CipherKey::from_base64(token)?,
            }),
            None => Err(ProtectionError::InvalidRecord(
                "encrypted record has neither a key nor a password envelope".into(),
            )),
        }
    }

    /// Write this mode into the legacy flags of `record`.
    ///
    /// Fields belonging to other modes are cleared; the face descriptor is left alone.
    pub fn apply_to(&self, record: &mut FileRecord) {
        let meta = &mut record.metadata;
        match self {
            ProtectionMode::Unprotected => {
                record.is_encrypted = false;
                record.encryption_key = None;
                meta.is_password_protected = false;
                meta.salt = None;
                meta.verification_hash = None;
            }
            ProtectionMode::RandomKey { key } => {
                record.is_encrypted = true;
                record.encryption_key = Some(key.to_base64());
                meta.is_password_protected = false;
                meta.salt = None;
                meta.verification_hash = None;
            }
            ProtectionMode::PasswordDerived { envelope } => {
                record.is_encrypted = true;
                record.encryption_key = None;
                meta.is_password_protected = true;
                meta.salt = Some(envelope.salt_base64());
                meta.verification_hash = Some(envelope.tag_base64());
            }
        }
    }
}
