//! File protection flows: protect, unlock, password reset, face enrolment.
//!
//! # Lifecycle
//!
//! 1. **Protect**: encrypt locally with the engine matching the requested
//!    [`Protection`], upload the blob through the governor, then persist the
//!    record with its legacy flags written from a [`ProtectionMode`].
//!    Replacing an existing payload writes to a new revision path first; the
//!    old object is removed only once the record points at the new one.
//! 2. **Unlock**: fetch the record, check the presented [`Credential`]
//!    (password tag or confirmed face capture) *before* downloading the
//!    payload, then download and decrypt.
//!
//! # Security invariants
//!
//! - Passwords, keys, plaintext and descriptors never appear in log fields.
//! - Every object-store and record-store call goes through the [`Governor`];
//!   no cipher call does.

pub mod mode;

pub use mode::ProtectionMode;

use std::future::Future;

use bytes::Bytes;
use common::{FileRecord, ProtectionError, StoreError};
use tracing::{info, warn};

use crate::biometric::{Capture, ConfirmedCapture, FaceDescriptor, FaceMatcher, DEFAULT_MATCH_THRESHOLD};
use crate::crypto::{AesGcmProvider, CryptoProvider, EncryptedBlob, PasswordCipher};
use crate::governor::{Governor, RetryPolicy, DEFAULT_MAX_CONCURRENT};
use crate::store::{ObjectStore, RecordStore};

/// Protection requested when storing a file.
#[derive(Debug, Clone, Copy)]
pub enum Protection<'a> {
    None,
    RandomKey,
    Password(&'a str),
}

/// Credential presented when unlocking a file.
#[derive(Debug, Clone, Copy)]
pub enum Credential<'a> {
    None,
    Password(&'a str),
    Face(&'a ConfirmedCapture),
}

/// Tunables for [`FileProtector`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProtectorConfig {
    pub max_concurrent: usize,
    pub retry: RetryPolicy,
    pub face_threshold: f64,
}

impl Default for ProtectorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            retry: RetryPolicy::default(),
            face_threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }
}

/// Facade over the engines, the matcher, the governor and the two stores.
pub struct FileProtector<O, R, P = AesGcmProvider> {
    objects: O,
    records: R,
    engine: PasswordCipher<P>,
    matcher: FaceMatcher,
    governor: Governor,
    retry: RetryPolicy,
}

impl<O: ObjectStore, R: RecordStore> FileProtector<O, R> {
    pub fn new(objects: O, records: R, config: ProtectorConfig) -> Self {
        Self::with_provider(objects, records, AesGcmProvider, config)
    }
}

impl<O, R, P> FileProtector<O, R, P>
where
    O: ObjectStore,
    R: RecordStore,
    P: CryptoProvider,
{
    pub fn with_provider(objects: O, records: R, provider: P, config: ProtectorConfig) -> Self {
        Self {
            objects,
            records,
            engine: PasswordCipher::new(provider),
            matcher: FaceMatcher::new(config.face_threshold),
            governor: Governor::new(config.max_concurrent),
            retry: config.retry,
        }
    }

    /// The governor shared by every store call of this protector.
    pub fn governor(&self) -> &Governor {
        &self.governor
    }

    /// Encrypt `plaintext` as requested, upload it and persist the updated
    /// record.
    ///
    /// A new file is stored at `record.storage_path`. If a record with the
    /// same id already exists, the payload goes to the next revision of its
    /// path instead, so the stored record never points at a payload it
    /// cannot decrypt.
    ///
    /// # Errors
    ///
    /// - [`ProtectionError::Unsupported`] when asking for a password on a file
    ///   with an enrolled face.
    /// - Store failures as [`ProtectionError::ExhaustedRetries`],
    ///   [`ProtectionError::NotFound`] or [`ProtectionError::Storage`].
    pub async fn protect(
        &self,
        mut record: FileRecord,
        plaintext: &[u8],
        protection: Protection<'_>,
    ) -> Result<FileRecord, ProtectionError> {
        if matches!(protection, Protection::Password(_))
            && record.metadata.face_descriptor.is_some()
        {
            return Err(ProtectionError::Unsupported(
                "face unlock cannot release a password-derived key; clear the face first".into(),
            ));
        }

        let (payload, mode) = match protection {
            Protection::None => (plaintext.to_vec(), ProtectionMode::Unprotected),
            Protection::RandomKey => {
                let (blob, key) = self.engine.cipher().encrypt(plaintext, None)?;
                (blob.into_bytes(), ProtectionMode::RandomKey { key })
            }
            Protection::Password(password) => {
                let out = self.engine.encrypt_with_password(plaintext, password)?;
                (
                    out.blob.into_bytes(),
                    ProtectionMode::PasswordDerived {
                        envelope: out.envelope,
                    },
                )
            }
        };

        let previous = match self.load_record(&record.id).await {
            Ok(existing) => Some(existing.storage_path),
            Err(ProtectionError::NotFound(_)) => None,
            Err(e) => return Err(e),
        };
        self.replace_payload(&mut record, &mode, Bytes::from(payload), previous)
            .await?;
        info!(file_id = %record.id, mode = mode.name(), "file protected");
        Ok(record)
    }

    /// Recover the plaintext of file `id`.
    ///
    /// The credential is checked against the record before the payload is
    /// downloaded.
    ///
    /// # Errors
    ///
    /// - [`ProtectionError::WrongPassword`] / [`ProtectionError::BiometricMismatch`]
    ///   for a wrong credential.
    /// - [`ProtectionError::DataCorruption`] if the payload fails authentication.
    /// - [`ProtectionError::CredentialRequired`] if the file needs a credential
    ///   that was not presented.
    pub async fn unlock(
        &self,
        id: &str,
        credential: Credential<'_>,
    ) -> Result<Vec<u8>, ProtectionError> {
        let record = self.load_record(id).await?;
        let mode = ProtectionMode::from_record(&record)?;

        let password_key = match (&mode, credential) {
            (ProtectionMode::PasswordDerived { envelope }, Credential::Password(password)) => {
                match self.engine.verify_password(password, envelope) {
                    Ok(key) => Some(key),
                    Err(e) => {
                        warn!(file_id = %id, "unlock rejected: wrong password");
                        return Err(e);
                    }
                }
            }
            (ProtectionMode::PasswordDerived { .. }, _) => {
                return Err(ProtectionError::CredentialRequired("password"));
            }
            (_, Credential::Password(_)) => {
                return Err(ProtectionError::Unsupported(
                    "file is not password protected".into(),
                ));
            }
            (_, Credential::Face(capture)) => {
                let stored =
                    stored_face(&record)?.ok_or(ProtectionError::BiometricNotConfigured)?;
                if let Err(e) = self.matcher.verify(capture, &stored) {
                    warn!(file_id = %id, error = %e, "unlock rejected: face check failed");
                    return Err(e);
                }
                None
            }
            (_, Credential::None) if record.metadata.face_descriptor.is_some() => {
                return Err(ProtectionError::CredentialRequired("confirmed face capture"));
            }
            (_, Credential::None) => None,
        };

        let payload = self.download(&record.storage_path).await?;
        let plaintext = match (&mode, password_key) {
            (ProtectionMode::Unprotected, _) => payload.to_vec(),
            (ProtectionMode::RandomKey { key }, _) => self
                .engine
                .cipher()
                .decrypt(&EncryptedBlob::from_bytes(payload.to_vec()), key)?,
            (ProtectionMode::PasswordDerived { .. }, Some(key)) => self
                .engine
                .cipher()
                .decrypt(&EncryptedBlob::from_bytes(payload.to_vec()), &key)?,
            (ProtectionMode::PasswordDerived { .. }, None) => {
                return Err(ProtectionError::CredentialRequired("password"));
            }
        };
        info!(file_id = %id, mode = mode.name(), "file unlocked");
        Ok(plaintext)
    }

    /// Re-encrypt a password-protected file under `new_password`.
    ///
    /// The old password is needed here only to recover the plaintext. The new
    /// blob is written to a fresh revision path; until the record update
    /// succeeds the old payload and envelope stay intact.
    pub async fn reset_password(
        &self,
        id: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<FileRecord, ProtectionError> {
        let mut record = self.load_record(id).await?;
        let envelope = match ProtectionMode::from_record(&record)? {
            ProtectionMode::PasswordDerived { envelope } => envelope,
            _ => {
                return Err(ProtectionError::Unsupported(
                    "file is not password protected".into(),
                ))
            }
        };
        let key = self.engine.verify_password(old_password, &envelope)?;
        let payload = self.download(&record.storage_path).await?;
        let plaintext = self
            .engine
            .cipher()
            .decrypt(&EncryptedBlob::from_bytes(payload.to_vec()), &key)?;

        let out = self.engine.reset_password(&plaintext, new_password)?;
        let mode = ProtectionMode::PasswordDerived {
            envelope: out.envelope,
        };
        let previous = record.storage_path.clone();
        self.replace_payload(
            &mut record,
            &mode,
            Bytes::from(out.blob.into_bytes()),
            Some(previous),
        )
        .await?;
        info!(file_id = %id, "password reset");
        Ok(record)
    }

    /// Enrol `descriptor` as the face that unlocks file `id`, replacing any
    /// previous one wholesale.
    pub async fn enroll_face(
        &self,
        id: &str,
        descriptor: FaceDescriptor,
    ) -> Result<FileRecord, ProtectionError> {
        let mut record = self.load_record(id).await?;
        if let ProtectionMode::PasswordDerived { .. } = ProtectionMode::from_record(&record)? {
            return Err(ProtectionError::Unsupported(
                "face unlock cannot release a password-derived key".into(),
            ));
        }
        let dims = descriptor.len();
        record.metadata.face_descriptor = Some(descriptor.into_vec());
        self.save_record(&record).await?;
        info!(file_id = %id, dims, "face enrolled");
        Ok(record)
    }

    /// Remove the enrolled face of file `id`.
    pub async fn clear_face(&self, id: &str) -> Result<FileRecord, ProtectionError> {
        let mut record = self.load_record(id).await?;
        if record.metadata.face_descriptor.take().is_some() {
            self.save_record(&record).await?;
            info!(file_id = %id, "face cleared");
        }
        Ok(record)
    }

    /// Advisory live comparison for UI feedback. Does not unlock anything.
    pub async fn preview_face(&self, id: &str, capture: &Capture) -> Result<bool, ProtectionError> {
        let record = self.load_record(id).await?;
        let stored = stored_face(&record)?.ok_or(ProtectionError::BiometricNotConfigured)?;
        capture.preview(&self.matcher, &stored)
    }

    /// Store `payload`, then point the record at it and save the record.
    ///
    /// With a `previous` path the payload goes to that path's next revision
    /// and the previous object is dropped after the record write. On failure
    /// `record` is left unchanged and the new object is dropped.
    async fn replace_payload(
        &self,
        record: &mut FileRecord,
        mode: &ProtectionMode,
        payload: Bytes,
        previous: Option<String>,
    ) -> Result<(), ProtectionError> {
        let target = match &previous {
            Some(old) => next_revision_path(old),
            None => record.storage_path.clone(),
        };
        self.upload(&target, payload).await?;

        let mut updated = record.clone();
        updated.storage_path = target;
        mode.apply_to(&mut updated);
        if let Err(e) = self.save_record(&updated).await {
            self.discard(&updated.storage_path).await;
            return Err(e);
        }
        if let Some(old) = previous.filter(|old| *old != updated.storage_path) {
            self.discard(&old).await;
        }
        *record = updated;
        Ok(())
    }

    /// Best-effort removal of an object no record points at.
    async fn discard(&self, path: &str) {
        let objects = &self.objects;
        if let Err(e) = self.governed(move || objects.delete(path)).await {
            warn!(path = %path, error = %e, "failed to remove stale payload");
        }
    }

    async fn upload(&self, path: &str, body: Bytes) -> Result<(), ProtectionError> {
        let objects = &self.objects;
        self.governed(move || objects.put(path, body.clone())).await
    }

    async fn download(&self, path: &str) -> Result<Bytes, ProtectionError> {
        let objects = &self.objects;
        self.governed(move || objects.get(path)).await
    }

    async fn load_record(&self, id: &str) -> Result<FileRecord, ProtectionError> {
        let records = &self.records;
        self.governed(move || records.get(id)).await
    }

    async fn save_record(&self, record: &FileRecord) -> Result<(), ProtectionError> {
        let records = &self.records;
        self.governed(move || records.put(record)).await
    }

    /// Run one store call through the governor, retrying transient failures.
    async fn governed<T, F, Fut>(&self, task: F) -> Result<T, ProtectionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        self.governor
            .dispatch(&self.retry, task, StoreError::is_transient)
            .await
            .map_err(|e| {
                if e.is_transient() {
                    ProtectionError::ExhaustedRetries {
                        attempts: self.retry.max_attempts(),
                        source: e,
                    }
                } else {
                    e.into()
                }
            })
    }
}

/// `a/b` -> `a/b.v1`, `a/b.v1` -> `a/b.v2`.
fn next_revision_path(path: &str) -> String {
    if let Some((base, rev)) = path.rsplit_once(".v") {
        if !rev.is_empty() && rev.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = rev.parse::<u64>() {
                return format!("{base}.v{}", n.saturating_add(1));
            }
        }
    }
    format!("{path}.v1")
}

fn stored_face(record: &FileRecord) -> Result<Option<FaceDescriptor>, ProtectionError> {
    record
        .metadata
        .face_descriptor
        .clone()
        .map(FaceDescriptor::new)
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryObjectStore, MemoryRecordStore, MockObjectStore};
    use std::time::Duration;

    fn record() -> FileRecord {
        FileRecord {
            id: "f1".into(),
            owner_id: "u1".into(),
            name: "notes.txt".into(),
            storage_path: "u1/f1".into(),
            ..Default::default()
        }
    }

    fn fast_retry() -> ProtectorConfig {
        ProtectorConfig {
            retry: RetryPolicy::new(3, Duration::from_millis(10), 1.5),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_upload_failures_are_retried() {
        let mut objects = MockObjectStore::new();
        let mut seq = mockall::Sequence::new();
        objects
            .expect_put()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(StoreError::Transient("503".into())));
        objects
            .expect_put()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let protector = FileProtector::new(objects, MemoryRecordStore::new(), fast_retry());
        let rec = protector
            .protect(record(), b"hello", Protection::RandomKey)
            .await
            .unwrap();
        assert!(rec.is_encrypted);
        assert_eq!(protector.governor().active(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_upload_carries_last_cause() {
        let mut objects = MockObjectStore::new();
        objects
            .expect_put()
            .times(4)
            .returning(|_, _| Err(StoreError::Transient("connection reset".into())));

        let protector = FileProtector::new(objects, MemoryRecordStore::new(), fast_retry());
        let err = protector
            .protect(record(), b"hello", Protection::None)
            .await
            .unwrap_err();
        match err {
            ProtectionError::ExhaustedRetries { attempts, source } => {
                assert_eq!(attempts, 4);
                assert_eq!(source, StoreError::Transient("connection reset".into()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failures_are_not_retried() {
        let mut objects = MockObjectStore::new();
        objects
            .expect_put()
            .times(1)
            .returning(|_, _| Err(StoreError::Permanent("access denied".into())));

        let protector = FileProtector::new(objects, MemoryRecordStore::new(), fast_retry());
        assert!(matches!(
            protector.protect(record(), b"x", Protection::None).await,
            Err(ProtectionError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn wrong_password_skips_download() {
        let mut objects = MockObjectStore::new();
        objects.expect_put().times(1).returning(|_, _| Ok(()));
        objects.expect_get().times(0);

        let protector = FileProtector::new(objects, MemoryRecordStore::new(), fast_retry());
        protector
            .protect(record(), b"0123456789", Protection::Password("correct-horse"))
            .await
            .unwrap();
        assert!(matches!(
            protector.unlock("f1", Credential::Password("wrong-pw")).await,
            Err(ProtectionError::WrongPassword)
        ));
    }

    #[tokio::test]
    async fn password_refused_when_face_enrolled() {
        let mut objects = MockObjectStore::new();
        objects.expect_put().times(0);
        let protector = FileProtector::new(objects, MemoryRecordStore::new(), fast_retry());
        let mut rec = record();
        rec.metadata.face_descriptor = Some(vec![0.1, 0.2]);
        assert!(matches!(
            protector.protect(rec, b"x", Protection::Password("pw")).await,
            Err(ProtectionError::Unsupported(_))
        ));
    }

    #[test]
    fn revision_paths() {
        assert_eq!(next_revision_path("u1/f1"), "u1/f1.v1");
        assert_eq!(next_revision_path("u1/f1.v1"), "u1/f1.v2");
        assert_eq!(next_revision_path("u1/f1.v41"), "u1/f1.v42");
        assert_eq!(next_revision_path("u1/notes.vault"), "u1/notes.vault.v1");
        assert_eq!(next_revision_path("u1/f1.v+3"), "u1/f1.v+3.v1");
    }

    #[tokio::test]
    async fn malformed_face_does_not_block_password_unlock() {
        let records = MemoryRecordStore::new();
        let protector =
            FileProtector::new(MemoryObjectStore::new(), records.clone(), fast_retry());
        protector
            .protect(record(), b"ledger", Protection::Password("pw"))
            .await
            .unwrap();

        let mut stored = records.get("f1").await.unwrap();
        stored.metadata.face_descriptor = Some(vec![]);
        records.put(&stored).await.unwrap();

        assert_eq!(
            protector.unlock("f1", Credential::Password("pw")).await.unwrap(),
            b"ledger"
        );
    }
}
