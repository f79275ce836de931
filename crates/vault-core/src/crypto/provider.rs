//! [`CryptoProvider`]: the small seam between the engines and the primitives.
//!
//! Engines only ever call through this trait, which keeps the AEAD and KDF
//! implementation swappable and lets tests observe exactly which primitive
//! calls a flow makes.

use aes_gcm::{
    aead::{rand_core::RngCore, Aead, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::ProtectionError;
use sha2::Sha256;
use thiserror::Error;

use super::{IV_LEN, KEY_LEN, PBKDF2_ITERATIONS, SALT_LEN};

/// Errors produced by the primitive layer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// AES-GCM encryption failed, or decryption failed to authenticate.
    #[error("aead operation failed")]
    AeadFailure,
}

/// A 256-bit symmetric key.
///
/// Keys are call-scoped: nothing in this crate caches one across operations.
/// The buffer is overwritten with zeroes on drop and never printed.
#[derive(Clone)]
pub struct CipherKey(Box<[u8; KEY_LEN]>);

impl CipherKey {
    /// Wrap raw key material.
    ///
    /// # Errors
    ///
    /// Returns [`ProtectionError::InvalidKey`] if `bytes` is not [`KEY_LEN`] long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtectionError> {
        if bytes.len() != KEY_LEN {
            return Err(ProtectionError::InvalidKey(format!(
                "expected {KEY_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let mut buf = Box::new([0u8; KEY_LEN]);
        buf.copy_from_slice(bytes);
        Ok(Self(buf))
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Export as the opaque token persisted in `encryption_key`.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0[..])
    }

    /// Import a token produced by [`CipherKey::to_base64`].
    ///
    /// # Errors
    ///
    /// Returns [`ProtectionError::InvalidKey`] if the token is not base64 or
    /// does not decode to [`KEY_LEN`] bytes.
    pub fn from_base64(token: &str) -> Result<Self, ProtectionError> {
        let mut raw = STANDARD
            .decode(token.trim())
            .map_err(|e| ProtectionError::InvalidKey(format!("key token is not base64: {e}")))?;
        let key = Self::from_bytes(&raw);
        raw.iter_mut().for_each(|b| *b = 0);
        key
    }
}

impl Drop for CipherKey {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

impl std::fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CipherKey([REDACTED])")
    }
}

/// Primitive operations the cipher engines are built on.
#[cfg_attr(test, mockall::automock)]
pub trait CryptoProvider: Send + Sync {
    /// Generate a fresh random 256-bit key.
    fn generate_key(&self) -> CipherKey;

    /// Generate a fresh random 96-bit IV.
    fn random_iv(&self) -> [u8; IV_LEN];

    /// Generate a fresh random salt.
    fn random_salt(&self) -> [u8; SALT_LEN];

    /// Derive a 256-bit key from `password` and `salt`.
    fn derive_key(&self, password: &[u8], salt: &[u8; SALT_LEN]) -> CipherKey;

    /// Encrypt and authenticate `plaintext`; output is ciphertext followed by the tag.
    fn aead_encrypt(
        &self,
        key: &CipherKey,
        iv: &[u8; IV_LEN],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError>;

    /// Authenticate and decrypt `ciphertext` (ciphertext followed by the tag).
    fn aead_decrypt(
        &self,
        key: &CipherKey,
        iv: &[u8; IV_LEN],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CryptoError>;
}

/// RustCrypto-backed provider: AES-256-GCM, PBKDF2-HMAC-SHA256, OS CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct AesGcmProvider;

impl CryptoProvider for AesGcmProvider {
    fn generate_key(&self) -> CipherKey {
        let mut buf = Box::new([0u8; KEY_LEN]);
        OsRng.fill_bytes(&mut buf[..]);
        CipherKey(buf)
    }

    fn random_iv(&self) -> [u8; IV_LEN] {
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);
        iv
    }

    fn random_salt(&self) -> [u8; SALT_LEN] {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        salt
    }

    fn derive_key(&self, password: &[u8], salt: &[u8; SALT_LEN]) -> CipherKey {
        let mut buf = Box::new([0u8; KEY_LEN]);
        pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, PBKDF2_ITERATIONS, &mut buf[..]);
        CipherKey(buf)
    }

    fn aead_encrypt(
        &self,
        key: &CipherKey,
        iv: &[u8; IV_LEN],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        build_cipher(key)
            .encrypt(Nonce::from_slice(iv), plaintext)
            .map_err(|_| CryptoError::AeadFailure)
    }

    fn aead_decrypt(
        &self,
        key: &CipherKey,
        iv: &[u8; IV_LEN],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        build_cipher(key)
            .decrypt(Nonce::from_slice(iv), ciphertext)
            .map_err(|_| CryptoError::AeadFailure)
    }
}

fn build_cipher(key: &CipherKey) -> Aes256Gcm {
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()))
}
