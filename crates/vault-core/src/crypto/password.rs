//! Password-derived file encryption with fail-fast password verification.
//!
//! The key is derived with PBKDF2-HMAC-SHA256 ([`super::PBKDF2_ITERATIONS`] rounds)
//! from the password and a random 16-byte salt. Next to the salt, every
//! envelope stores a verification tag: the AES-GCM encryption of a fixed,
//! non-secret marker under the derived key and a **fixed** IV.
//!
//! # Fixed-IV exception
//!
//! Reusing an IV under GCM is unsafe in general. It is acceptable for the
//! verification tag only because, for any given key, exactly one plaintext
//! (the constant marker) is ever encrypted under [`VERIFICATION_IV`], and that
//! plaintext is public. The payload always gets a fresh random IV. Do not use
//! [`VERIFICATION_IV`] for anything else.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::ProtectionError;
use subtle::ConstantTimeEq;
use tracing::debug;

use super::cipher::{EncryptedBlob, SymmetricCipher};
use super::provider::{AesGcmProvider, CipherKey, CryptoProvider};
use super::{IV_LEN, SALT_LEN};

/// Public marker encrypted to form the verification tag.
const VERIFICATION_MARKER: &[u8] = b"filevault/password-check/v1";

/// Constant IV used for the verification marker and nothing else.
const VERIFICATION_IV: [u8; IV_LEN] = [0u8; IV_LEN];

/// Salt and verification tag persisted next to a password-protected file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordEnvelope {
    pub salt: [u8; SALT_LEN],
    pub verification_tag: Vec<u8>,
}

impl PasswordEnvelope {
    /// Base64 salt, as stored in `metadata.salt`.
    pub fn salt_base64(&self) -> String {
        STANDARD.encode(self.salt)
    }

    /// Base64 tag, as stored in `metadata.verificationHash`.
    pub fn tag_base64(&self) -> String {
        STANDARD.encode(&self.verification_tag)
    }

    /// Rebuild an envelope from its stored base64 fields.
    ///
    /// # Errors
    ///
    /// Returns [`ProtectionError::InvalidRecord`] if either field is not valid
    /// base64 or the salt is not [`SALT_LEN`] bytes.
    pub fn from_base64(salt: &str, tag: &str) -> Result<Self, ProtectionError> {
        let salt_bytes = STANDARD
            .decode(salt.trim())
            .map_err(|e| ProtectionError::InvalidRecord(format!("salt is not base64: {e}")))?;
        let salt: [u8; SALT_LEN] = salt_bytes.as_slice().try_into().map_err(|_| {
            ProtectionError::InvalidRecord(format!(
                "salt must be {SALT_LEN} bytes, got {}",
                salt_bytes.len()
            ))
        })?;
        let verification_tag = STANDARD.decode(tag.trim()).map_err(|e| {
            ProtectionError::InvalidRecord(format!("verification tag is not base64: {e}"))
        })?;
        Ok(Self {
            salt,
            verification_tag,
        })
    }
}

/// Output of a password encryption: the payload blob plus its envelope.
#[derive(Debug, Clone)]
pub struct PasswordProtected {
    pub blob: EncryptedBlob,
    pub envelope: PasswordEnvelope,
}

/// Password-derived file cipher built on [`SymmetricCipher`].
#[derive(Debug, Clone, Default)]
pub struct PasswordCipher<P = AesGcmProvider> {
    cipher: SymmetricCipher<P>,
}

impl<P: CryptoProvider> PasswordCipher<P> {
    pub fn new(provider: P) -> Self {
        Self {
            cipher: SymmetricCipher::new(provider),
        }
    }

    /// The underlying random-key engine, sharing the same provider.
    pub fn cipher(&self) -> &SymmetricCipher<P> {
        &self.cipher
    }

    /// Derive the key for `password`, generating a random salt if none is given.
    pub fn derive_key(
        &self,
        password: &str,
        salt: Option<[u8; SALT_LEN]>,
    ) -> (CipherKey, [u8; SALT_LEN]) {
        let provider = self.cipher.provider();
        let salt = salt.unwrap_or_else(|| provider.random_salt());
        (provider.derive_key(password.as_bytes(), &salt), salt)
    }

    /// Encrypt `plaintext` under a key derived from `password`.
    ///
    /// Each call uses a new salt, so two encryptions with the same password
    /// produce different salts and different verification tags.
    ///
    /// # Errors
    ///
    /// Returns [`ProtectionError::Crypto`] on an internal AEAD error.
    pub fn encrypt_with_password(
        &self,
        plaintext: &[u8],
        password: &str,
    ) -> Result<PasswordProtected, ProtectionError> {
        let (key, salt) = self.derive_key(password, None);
        let verification_tag = self.verification_tag(&key)?;
        let (blob, _) = self.cipher.encrypt(plaintext, Some(key))?;
        Ok(PasswordProtected {
            blob,
            envelope: PasswordEnvelope {
                salt,
                verification_tag,
            },
        })
    }

    /// Decrypt a password-protected blob.
    ///
    /// The password is checked against the envelope's verification tag
    /// before the payload is touched; on mismatch the payload is never
    /// decrypted.
    ///
    /// # Errors
    ///
    /// - [`ProtectionError::WrongPassword`] if the recomputed tag differs.
    /// - [`ProtectionError::DataCorruption`] if the password is right but the
    ///   payload fails authentication.
    pub fn decrypt_with_password(
        &self,
        blob: &EncryptedBlob,
        password: &str,
        envelope: &PasswordEnvelope,
    ) -> Result<Vec<u8>, ProtectionError> {
        let key = self.verify_password(password, envelope)?;
        self.cipher.decrypt(blob, &key)
    }

    /// Re-derive the key for `password` and check it against `envelope`.
    ///
    /// Needs only the envelope, so callers can reject a wrong password before
    /// fetching the payload at all.
    ///
    /// # Errors
    ///
    /// Returns [`ProtectionError::WrongPassword`] if the recomputed tag differs.
    pub fn verify_password(
        &self,
        password: &str,
        envelope: &PasswordEnvelope,
    ) -> Result<CipherKey, ProtectionError> {
        let (key, _) = self.derive_key(password, Some(envelope.salt));
        let expected = self.verification_tag(&key)?;
        if !bool::from(expected.ct_eq(&envelope.verification_tag)) {
            debug!("verification tag mismatch");
            return Err(ProtectionError::WrongPassword);
        }
        Ok(key)
    }

    /// Build a brand-new envelope for already-recovered `plaintext`.
    ///
    /// Proving knowledge of the old password is the caller's responsibility.
    pub fn reset_password(
        &self,
        plaintext: &[u8],
        new_password: &str,
    ) -> Result<PasswordProtected, ProtectionError> {
        self.encrypt_with_password(plaintext, new_password)
    }

    fn verification_tag(&self, key: &CipherKey) -> Result<Vec<u8>, ProtectionError> {
        self.cipher
            .provider()
            .aead_encrypt(key, &VERIFICATION_IV, VERIFICATION_MARKER)
            .map_err(|e| ProtectionError::Crypto(e.to_string()))
    }
}
