//! [`S3ObjectStore`]: blob storage in an S3 (or S3-compatible) bucket.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use common::StoreError;
use tracing::debug;

use super::ObjectStore;

/// Object store backed by one bucket and key prefix.
///
/// Credentials are resolved via the standard AWS credential chain.
#[derive(Clone, Debug)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: String,
}

impl S3ObjectStore {
    /// Build a client from the ambient AWS configuration.
    ///
    /// `endpoint_url` points the client at an S3-compatible service (MinIO,
    /// LocalStack) and switches to path-style addressing.
    pub async fn connect(
        bucket: impl Into<String>,
        prefix: impl Into<String>,
        endpoint_url: Option<&str>,
    ) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(url) = endpoint_url {
            builder = builder.endpoint_url(url).force_path_style(true);
        }
        Self::with_client(aws_sdk_s3::Client::from_conf(builder.build()), bucket, prefix)
    }

    /// Wrap an already configured client.
    pub fn with_client(
        client: aws_sdk_s3::Client,
        bucket: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    /// Same client and bucket under a different key prefix.
    pub fn with_prefix(&self, prefix: impl Into<String>) -> Self {
        Self::with_client(self.client.clone(), self.bucket.clone(), prefix)
    }

    fn key(&self, path: &str) -> String {
        format!("{}{}", self.prefix, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get(&self, path: &str) -> Result<Bytes, StoreError> {
        let key = self.key(path);
        let out = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| classify(&key, e))?;

        let body = out
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Transient(format!("failed to read body of {key}: {e}")))?
            .into_bytes();
        debug!(key = %key, bytes = body.len(), "object fetched");
        Ok(body)
    }

    async fn put(&self, path: &str, body: Bytes) -> Result<(), StoreError> {
        let key = self.key(path);
        let len = body.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| classify(&key, e))?;
        debug!(key = %key, bytes = len, "object stored");
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        let key = self.key(path);
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| classify(&key, e))?;
        debug!(key = %key, "object deleted");
        Ok(())
    }
}

/// Map an SDK failure onto the retry classes the governor understands.
fn classify<E>(key: &str, err: SdkError<E, HttpResponse>) -> StoreError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let status = err.raw_response().map(|r| r.status().as_u16());
    let detail = format!("{key}: {}", DisplayErrorContext(&err));
    match err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            StoreError::Transient(detail)
        }
        _ => classify_status(status, detail),
    }
}

fn classify_status(status: Option<u16>, detail: String) -> StoreError {
    match status {
        Some(404) => StoreError::NotFound(detail),
        Some(408) | Some(429) | Some(500..=599) => StoreError::Transient(detail),
        _ => StoreError::Permanent(detail),
    }
}
