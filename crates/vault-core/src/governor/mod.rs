//! Request governor: bounded concurrency plus retry for network-bound work.
//!
//! # Lifecycle of a request
//!
//! 1. [`Governor::submit`] admits the task immediately if fewer than the cap
//!    are running, otherwise appends it to a FIFO queue.
//! 2. Inside its slot the task runs through [`with_retry_if`]; a retrying
//!    task keeps its slot between attempts.
//! 3. On success or final failure the slot passes to the oldest waiter.
//!
//! Encryption and decryption are local and never go through the governor.
//! There is no cancellation and no timeout at this layer.

pub mod retry;
pub mod throttle;

pub use retry::{with_retry, with_retry_if, RetryPolicy, MAX_RETRY_DELAY};
pub use throttle::{Governor, DEFAULT_MAX_CONCURRENT};

use std::future::Future;

impl Governor {
    /// Throttle-of-retry dispatch: one slot for the whole retry schedule.
    ///
    /// Only failures for which `retryable` returns `true` are retried; the
    /// last failure is returned unchanged.
    pub async fn dispatch<F, Fut, T, E, P>(
        &self,
        policy: &RetryPolicy,
        task: F,
        retryable: P,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        P: Fn(&E) -> bool,
    {
        self.submit(|| with_retry_if(policy, task, retryable)).await
    }
}
