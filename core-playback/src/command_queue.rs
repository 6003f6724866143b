//! # Command Queue
//!
//! Serializes every mutating engine operation into one FIFO chain.
//!
//! ## Overview
//!
//! The engine has exactly one logical owner. Overlapping calls (a skip arriving
//! while a chapter is still loading) corrupt native player state on some
//! platforms, so every caller-facing command goes through [`CommandQueue::enqueue`]:
//!
//! 1. The circuit breaker is consulted. When open, the returned future fails
//!    immediately with [`PlaybackError::CircuitOpen`] and nothing is queued.
//! 2. The entry is chained behind the previous one synchronously, at call time.
//! 3. A Tokio task waits for the previous entry to settle (success or failure),
//!    then runs the operation under the per-attempt timeout, retrying transient
//!    failures per the [`RetryPolicy`].
//! 4. The final outcome feeds the breaker: success resets it, supersession is
//!    neutral, anything else counts as a failure.
//!
//! Execution does not depend on the caller polling the returned future; a
//! dropped future still runs its operation in order.
//!
//! Commands that must await host calls before their operation is ready take a
//! [`QueueTurn`] with [`CommandQueue::reserve`] first and run it inline.

use crate::circuit_breaker::{Admission, BreakerStatus, CircuitBreaker, CircuitBreakerConfig};
use crate::error::{PlaybackError, Result};
use crate::retry::RetryPolicy;
use core_runtime::config::PlaybackSettings;
use futures::future::{self, BoxFuture, FutureExt};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

pub struct CommandQueue {
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    operation_timeout: Duration,
    /// Settles when the most recently enqueued entry finished.
    tail: Mutex<Option<oneshot::Receiver<()>>>,
    pending: Arc<AtomicUsize>,
}

impl CommandQueue {
    pub fn new(breaker: CircuitBreakerConfig, retry: RetryPolicy, operation_timeout: Duration) -> Self {
        Self {
            breaker: Arc::new(CircuitBreaker::new(breaker)),
            retry,
            operation_timeout,
            tail: Mutex::new(None),
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn from_settings(settings: &PlaybackSettings) -> Self {
        Self::new(
            CircuitBreakerConfig::from(settings),
            RetryPolicy::from_settings(settings),
            settings.operation_timeout,
        )
    }

    /// Claim the next position in the queue without running anything yet.
    ///
    /// The breaker is consulted and the position is chained synchronously, so
    /// a command that must await host calls before it can build its operation
    /// still keeps its submission order. Run the operation with
    /// [`QueueTurn::run`]; dropping the turn gives the position up.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::CircuitOpen`] when the breaker rejects the command.
    pub fn reserve(&self, name: &'static str) -> Result<QueueTurn> {
        let admission = match self.breaker.try_acquire() {
            Ok(admission) => admission,
            Err(err) => {
                warn!(operation = name, "Rejected by open circuit breaker");
                return Err(err);
            }
        };

        let (done_tx, done_rx) = oneshot::channel::<()>();
        let previous = self.tail.lock().replace(done_rx);

        let queued = self.pending.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(operation = name, queued, "Enqueued");

        Ok(QueueTurn {
            name,
            admission: Some(admission),
            previous,
            done: Some(done_tx),
            breaker: Arc::clone(&self.breaker),
            pending: Arc::clone(&self.pending),
            retry: self.retry.clone(),
            timeout: self.operation_timeout,
        })
    }

    /// Queue `operation` behind every previously enqueued entry.
    ///
    /// `operation` is called once per attempt. Must be called from within a
    /// Tokio runtime.
    pub fn enqueue<T, F, Fut>(&self, name: &'static str, operation: F) -> BoxFuture<'static, Result<T>>
    where
        T: Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let turn = match self.reserve(name) {
            Ok(turn) => turn,
            Err(err) => return future::ready(Err(err)).boxed(),
        };

        let (result_tx, result_rx) = oneshot::channel();
        tokio::spawn(async move {
            let _ = result_tx.send(turn.run(operation).await);
        });

        async move {
            result_rx.await.unwrap_or_else(|_| {
                Err(PlaybackError::Internal(format!(
                    "queued operation '{}' was dropped",
                    name
                )))
            })
        }
        .boxed()
    }

    /// Entries enqueued but not yet settled.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn breaker_status(&self) -> BreakerStatus {
        self.breaker.status()
    }

    pub fn reset_circuit_breaker(&self) {
        self.breaker.reset();
    }
}

/// A reserved position in the [`CommandQueue`], holding its breaker admission.
///
/// Dropped without running, the turn releases its position and its admission
/// counts as cancelled.
pub struct QueueTurn {
    name: &'static str,
    admission: Option<Admission>,
    previous: Option<oneshot::Receiver<()>>,
    done: Option<oneshot::Sender<()>>,
    breaker: Arc<CircuitBreaker>,
    pending: Arc<AtomicUsize>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl QueueTurn {
    /// Wait for every earlier entry to settle, then run `operation` under the
    /// per-attempt timeout and retry policy. The outcome feeds the breaker.
    pub async fn run<T, F, Fut>(mut self, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(previous) = self.previous.take() {
            // A dropped sender (panicked entry) counts as settled too.
            let _ = previous.await;
        }

        let outcome = run_attempts(self.name, operation, &self.retry, self.timeout).await;

        if let Some(admission) = self.admission.take() {
            match &outcome {
                Ok(_) => self.breaker.record_success(admission),
                Err(err) if err.is_supersession() => {
                    debug!(operation = self.name, "Superseded");
                    self.breaker.record_cancelled(admission);
                }
                Err(err) => {
                    warn!(operation = self.name, error = %err, "Queued operation failed");
                    self.breaker.record_failure(admission, err);
                }
            }
        }

        outcome
    }
}

impl Drop for QueueTurn {
    fn drop(&mut self) {
        if let Some(admission) = self.admission.take() {
            debug!(operation = self.name, "Queue turn released without running");
            self.breaker.record_cancelled(admission);
        }
        self.pending.fetch_sub(1, Ordering::SeqCst);
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
    }
}

async fn run_attempts<T, F, Fut>(
    name: &'static str,
    mut operation: F,
    retry: &RetryPolicy,
    timeout: Duration,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        let result = match tokio::time::timeout(timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(PlaybackError::Timeout {
                operation: name.to_string(),
                timeout,
            }),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(err) if retry.should_retry(attempt, &err) => {
                let delay = retry.backoff_for(attempt);
                debug!(
                    operation = name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
