//! [`Governor`]: FIFO admission control over a fixed number of concurrency slots.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tracing::debug;

/// Default number of tasks allowed to run at once.
pub const DEFAULT_MAX_CONCURRENT: usize = 5;

#[derive(Debug, Default)]
struct State {
    /// Tasks currently holding a slot.
    active: usize,
    /// Waiters in submission order. A waiter leaves the queue the moment it
    /// is handed a slot.
    waiters: VecDeque<oneshot::Sender<()>>,
}

#[derive(Debug)]
struct Inner {
    max_concurrent: usize,
    state: Mutex<State>,
}

/// Concurrency-capped dispatcher shared by every network-bound operation.
///
/// Cloning yields another handle to the same slots and queue. The queue is
/// unbounded: submissions never fail or block the submitter synchronously.
#[derive(Clone, Debug)]
pub struct Governor {
    inner: Arc<Inner>,
}

impl Governor {
    /// Create a governor that runs at most `max_concurrent` tasks at once.
    ///
    /// A cap of zero is raised to one.
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                max_concurrent: max_concurrent.max(1),
                state: Mutex::new(State::default()),
            }),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.inner.max_concurrent
    }

    /// Number of tasks currently running.
    pub fn active(&self) -> usize {
        self.lock().active
    }

    /// Number of tasks waiting for a slot.
    pub fn queued(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Run `task` once a slot is available.
    ///
    /// Runs immediately if fewer than the cap are running, otherwise waits
    /// behind every earlier submission. The slot is held until the task's
    /// future completes, and released even if it panics or is dropped.
    pub async fn submit<F, Fut, T>(&self, task: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _slot = match self.try_admit() {
            Ok(slot) => slot,
            Err(mut waiter) => {
                // The sender is only dropped after a successful hand-over, so
                // either outcome means we now own a slot.
                let _ = (&mut waiter.rx).await;
                waiter.granted = true;
                Slot {
                    governor: self.clone(),
                }
            }
        };
        task().await
    }

    fn try_admit(&self) -> Result<Slot, Waiter> {
        let mut state = self.lock();
        if state.active < self.inner.max_concurrent {
            state.active += 1;
            debug!(active = state.active, "task admitted");
            return Ok(Slot {
                governor: self.clone(),
            });
        }
        let (tx, rx) = oneshot::channel();
        state.waiters.push_back(tx);
        debug!(queued = state.waiters.len(), "concurrency cap reached; task queued");
        Err(Waiter {
            rx,
            governor: self.clone(),
            granted: false,
        })
    }

    /// Give up one slot: hand it straight to the oldest live waiter, or
    /// decrement the running count if nobody is waiting.
    ///
    /// Both branches run under one lock acquisition, so no other completion
    /// can interleave between the release and the next dispatch.
    fn release(&self) {
        let mut state = self.lock();
        while let Some(next) = state.waiters.pop_front() {
            if next.send(()).is_ok() {
                debug!(queued = state.waiters.len(), "slot handed to next waiter");
                return;
            }
        }
        state.active = state.active.saturating_sub(1);
        debug!(active = state.active, "slot released");
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Governor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT)
    }
}

/// A held concurrency slot; releasing happens on drop.
struct Slot {
    governor: Governor,
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.governor.release();
    }
}

/// A queued submission.
///
/// If the submitting future is dropped while queued, any slot handed to it
/// in the meantime is passed on instead of leaking.
struct Waiter {
    rx: oneshot::Receiver<()>,
    governor: Governor,
    granted: bool,
}

impl Drop for Waiter {
    fn drop(&mut self) {
        if self.granted {
            return;
        }
        self.rx.close();
        if self.rx.try_recv().is_ok() {
            self.governor.release();
        }
    }
}
