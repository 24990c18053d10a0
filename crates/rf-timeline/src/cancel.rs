//! Cooperative cancellation
//!
//! A [`CancellationToken`] is a cheap, cloneable handle onto shared
//! cancellation state. Cancellation is cooperative: actions check the token
//! (or await [`CancellationToken::cancelled`]) at their suspension points.
//!
//! ## Contract
//!
//! - `cancel()` is idempotent; callbacks run once, in registration order
//! - a panicking callback is logged and swallowed, the rest still run
//! - `on_cancel()` on an already-cancelled token runs the callback immediately

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::TimelineError;

type CancelCallback = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct TokenState {
    cancelled: bool,
    callbacks: Vec<CancelCallback>,
}

#[derive(Default)]
struct TokenInner {
    state: Mutex<TokenState>,
    notify: Notify,
}

/// Cooperative cancellation handle
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("CancellationToken")
            .field("cancelled", &state.cancelled)
            .field("callbacks", &state.callbacks.len())
            .finish()
    }
}

impl CancellationToken {
    /// Create a fresh, uncancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.inner.state.lock().cancelled
    }

    /// Request cancellation
    ///
    /// Callbacks are drained under the lock but executed outside of it, so a
    /// callback may freely touch this token again.
    pub fn cancel(&self) {
        let callbacks = {
            let mut state = self.inner.state.lock();
            if state.cancelled {
                return;
            }
            state.cancelled = true;
            std::mem::take(&mut state.callbacks)
        };

        for (index, callback) in callbacks.into_iter().enumerate() {
            run_callback(index, callback);
        }

        self.inner.notify.notify_waiters();
    }

    /// Register a callback to run on cancellation
    ///
    /// Runs synchronously right away if the token is already cancelled.
    pub fn on_cancel<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut state = self.inner.state.lock();
            if !state.cancelled {
                state.callbacks.push(Box::new(callback));
                return;
            }
        }
        run_callback(0, Box::new(callback));
    }

    /// Return `Err(TimelineError::Cancelled)` once cancelled
    pub fn check(&self) -> Result<(), TimelineError> {
        if self.is_cancelled() {
            Err(TimelineError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolve once the token is cancelled
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent cancel() is not missed
            notified.as_mut().enable();

            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Check whether both handles point at the same token
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of callbacks still waiting for cancellation
    pub fn pending_callbacks(&self) -> usize {
        self.inner.state.lock().callbacks.len()
    }
}

fn run_callback(index: usize, callback: CancelCallback) {
    if catch_unwind(AssertUnwindSafe(callback)).is_err() {
        log::warn!("[Timeline] cancel callback #{} panicked, ignoring", index);
    }
}

/// Convert a declared duration in ms to a sleepable [`Duration`]
///
/// `None` for non-finite, zero and negative values. Finite values past the
/// `Duration` range saturate to [`Duration::MAX`].
pub fn duration_from_ms(duration_ms: f64) -> Option<Duration> {
    if !duration_ms.is_finite() || duration_ms <= 0.0 {
        return None;
    }
    Some(Duration::try_from_secs_f64(duration_ms / 1000.0).unwrap_or(Duration::MAX))
}

/// Sleep for `duration_ms`, waking early if `token` is cancelled
///
/// Never fails: cancellation simply ends the wait.
pub async fn sleep_or_cancel(duration_ms: f64, token: &CancellationToken) {
    if token.is_cancelled() {
        return;
    }
    let Some(duration) = duration_from_ms(duration_ms) else {
        return;
    };

    let sleep = tokio::time::sleep(duration);
    tokio::select! {
        _ = sleep => {}
        _ = token.cancelled() => {}
    }
}
