//! Configuration loading and validation for the `filevault` client.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use vault_core::governor::RetryPolicy;
use vault_core::ProtectorConfig;

/// Validated `filevault` configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// S3 bucket holding payloads and record documents. **Required.**
    pub s3_bucket: String,

    /// Key prefix for file payloads. Records live under `records/` at the bucket root.
    #[serde(default = "default_s3_prefix")]
    pub s3_prefix: String,

    /// Override endpoint for S3-compatible services (MinIO, LocalStack).
    #[serde(default)]
    pub s3_endpoint_url: Option<String>,

    /// Tracing log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Maximum number of in-flight store requests.
    #[serde(default = "default_governor_max_concurrent")]
    pub governor_max_concurrent: usize,

    /// Retries after the first attempt of a transient store failure.
    #[serde(default = "default_retry_max_retries")]
    pub retry_max_retries: u32,

    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_retry_initial_delay_ms")]
    pub retry_initial_delay_ms: u64,

    /// Multiplier applied to the delay after each retry.
    #[serde(default = "default_retry_backoff_factor")]
    pub retry_backoff_factor: f64,

    /// Euclidean distance below which two faces match.
    #[serde(default = "default_face_threshold")]
    pub face_threshold: f64,
}

fn default_s3_prefix() -> String {
    "files/".into()
}
fn default_log_level() -> String {
    "info".into()
}
fn default_governor_max_concurrent() -> usize {
    5
}
fn default_retry_max_retries() -> u32 {
    3
}
fn default_retry_initial_delay_ms() -> u64 {
    1000
}
fn default_retry_backoff_factor() -> f64 {
    1.5
}
fn default_face_threshold() -> f64 {
    0.5
}

impl Config {
    /// Load and validate configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default().try_parsing(true))
            .build()
            .context("failed to build filevault configuration")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise filevault configuration")?;

        c.validate()?;
        Ok(c)
    }

    fn validate(&self) -> Result<()> {
        if self.s3_bucket.trim().is_empty() {
            anyhow::bail!("S3_BUCKET is required and must not be empty");
        }
        if self.governor_max_concurrent == 0 {
            anyhow::bail!("GOVERNOR_MAX_CONCURRENT must be at least 1");
        }
        if !(self.retry_backoff_factor >= 1.0) || !self.retry_backoff_factor.is_finite() {
            anyhow::bail!("RETRY_BACKOFF_FACTOR must be a finite number >= 1.0");
        }
        if !(self.face_threshold > 0.0) || !self.face_threshold.is_finite() {
            anyhow::bail!("FACE_THRESHOLD must be a positive number");
        }
        Ok(())
    }

    /// Governor, retry and matcher settings for the protector.
    pub fn protector(&self) -> ProtectorConfig {
        ProtectorConfig {
            max_concurrent: self.governor_max_concurrent,
            retry: RetryPolicy::new(
                self.retry_max_retries,
                Duration::from_millis(self.retry_initial_delay_ms),
                self.retry_backoff_factor,
            ),
            face_threshold: self.face_threshold,
        }
    }
}
