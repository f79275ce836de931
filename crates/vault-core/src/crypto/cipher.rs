//! AES-256-GCM encryption and decryption of whole file buffers.
//!
//! **Algorithm choice:** AES-256-GCM with a fresh random 96-bit IV per call.
//! The IV is stored in the clear in front of the ciphertext.
//!
//! **Never call [`CryptoProvider::aead_encrypt`] with a constant IV from here.**
//! GCM IV reuse under one key breaks both confidentiality and authentication.
//! The only fixed-IV encryption in the crate is the password verification
//! marker in [`super::password`].

use common::ProtectionError;

use super::provider::{AesGcmProvider, CipherKey, CryptoError, CryptoProvider};
use super::{IV_LEN, TAG_LEN};

/// An encrypted payload: `[12-byte IV][ciphertext || 16-byte tag]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedBlob(Vec<u8>);

impl EncryptedBlob {
    /// Wrap bytes read back from the object store.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Borrow the raw blob bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume into the raw blob bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Total blob length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the blob holds no bytes at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn assemble(iv: [u8; IV_LEN], ciphertext: Vec<u8>) -> Self {
        let mut out = Vec::with_capacity(IV_LEN + ciphertext.len());
        out.extend_from_slice(&iv);
        out.extend_from_slice(&ciphertext);
        Self(out)
    }

    /// Split into IV and ciphertext-with-tag.
    ///
    /// # Errors
    ///
    /// Returns [`ProtectionError::DataCorruption`] if the blob is too short to
    /// hold an IV and a tag.
    fn split(&self) -> Result<([u8; IV_LEN], &[u8]), ProtectionError> {
        if self.0.len() < IV_LEN + TAG_LEN {
            return Err(ProtectionError::DataCorruption);
        }
        let (iv_bytes, body) = self.0.split_at(IV_LEN);
        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(iv_bytes);
        Ok((iv, body))
    }
}

impl From<Vec<u8>> for EncryptedBlob {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Random-key file cipher.
///
/// Stateless: every call generates its own IV, and the key is either passed
/// in or generated for that call and handed back to the caller.
#[derive(Debug, Clone, Default)]
pub struct SymmetricCipher<P = AesGcmProvider> {
    provider: P,
}

impl<P: CryptoProvider> SymmetricCipher<P> {
    /// Create an engine over the given primitive provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// The primitive provider this engine calls into.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Encrypt `plaintext` under `key`, or under a freshly generated key if `None`.
    ///
    /// Returns the blob and the key that was used so the caller can persist
    /// the key externally.
    ///
    /// # Errors
    ///
    /// Returns [`ProtectionError::Crypto`] on an internal AEAD error (unreachable
    /// with a valid key and IV).
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        key: Option<CipherKey>,
    ) -> Result<(EncryptedBlob, CipherKey), ProtectionError> {
        let key = key.unwrap_or_else(|| self.provider.generate_key());
        let iv = self.provider.random_iv();
        let ciphertext = self
            .provider
            .aead_encrypt(&key, &iv, plaintext)
            .map_err(|e| ProtectionError::Crypto(e.to_string()))?;
        Ok((EncryptedBlob::assemble(iv, ciphertext), key))
    }

    /// Authenticate and decrypt `blob` with `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtectionError::DataCorruption`] if the blob is truncated or
    /// the tag does not verify (wrong key or tampered bytes). No partial
    /// plaintext is ever returned.
    pub fn decrypt(&self, blob: &EncryptedBlob, key: &CipherKey) -> Result<Vec<u8>, ProtectionError> {
        let (iv, body) = blob.split()?;
        self.provider
            .aead_decrypt(key, &iv, body)
            .map_err(|CryptoError::AeadFailure| ProtectionError::DataCorruption)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> SymmetricCipher {
        SymmetricCipher::new(AesGcmProvider)
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let cipher = engine();
        let plaintext = b"quarterly report, final";
        let (blob, key) = cipher.encrypt(plaintext, None).unwrap();
        let decrypted = cipher.decrypt(&blob, &key).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn empty_plaintext_round_trips() {
        let cipher = engine();
        let (blob, key) = cipher.encrypt(b"", None).unwrap();
        assert_eq!(blob.len(), IV_LEN + TAG_LEN);
        assert!(cipher.decrypt(&blob, &key).unwrap().is_empty());
    }

    #[test]
    fn supplied_key_is_used_and_returned() {
        let cipher = engine();
        let key = AesGcmProvider.generate_key();
        let (blob, used) = cipher.encrypt(b"hello", Some(key.clone())).unwrap();
        assert_eq!(used.as_bytes(), key.as_bytes());
        assert_eq!(cipher.decrypt(&blob, &key).unwrap(), b"hello");
    }

    #[test]
    fn blob_layout_is_iv_then_ciphertext_and_tag() {
        let cipher = engine();
        let (blob, _) = cipher.encrypt(b"0123456789", None).unwrap();
        assert_eq!(blob.len(), IV_LEN + 10 + TAG_LEN);
    }

    #[test]
    fn fresh_iv_per_call() {
        let cipher = engine();
        let key = AesGcmProvider.generate_key();
        let (a, _) = cipher.encrypt(b"same", Some(key.clone())).unwrap();
        let (b, _) = cipher.encrypt(b"same", Some(key)).unwrap();
        assert_ne!(a.as_bytes()[..IV_LEN], b.as_bytes()[..IV_LEN]);
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_is_data_corruption() {
        let cipher = engine();
        let (blob, _) = cipher.encrypt(b"secret", None).unwrap();
        let other = AesGcmProvider.generate_key();
        assert!(matches!(
            cipher.decrypt(&blob, &other),
            Err(ProtectionError::DataCorruption)
        ));
    }

    #[test]
    fn tampered_ciphertext_fails_auth() {
        let cipher = engine();
        let (blob, key) = cipher.encrypt(b"tamper me", None).unwrap();
        let mut bytes = blob.into_bytes();
        // Flip a bit in the ciphertext to simulate tampering.
        bytes[IV_LEN] ^= 0x01;
        assert!(matches!(
            cipher.decrypt(&EncryptedBlob::from(bytes), &key),
            Err(ProtectionError::DataCorruption)
        ));
    }

    #[test]
    fn truncated_blob_is_data_corruption() {
        let cipher = engine();
        let key = AesGcmProvider.generate_key();
        let short = EncryptedBlob::from_bytes(vec![0u8; IV_LEN + TAG_LEN - 1]);
        assert!(matches!(
            cipher.decrypt(&short, &key),
            Err(ProtectionError::DataCorruption)
        ));
    }
}
