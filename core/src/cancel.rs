//! Cancellation handle returned by callback-style calls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Signal {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Caller-held token that aborts an in-flight call.
///
/// Cancelling is idempotent, and cancelling a call whose callback already
/// fired has no effect.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    signal: Arc<Signal>,
}

impl CancelHandle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        if !self.signal.cancelled.swap(true, Ordering::AcqRel) {
            self.signal.notify.notify_waiters();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.signal.cancelled.load(Ordering::Acquire)
    }

    /// Resolves once `cancel` has been called.
    pub(crate) async fn cancelled(&self) {
        loop {
            let notified = self.signal.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent `cancel`
            // cannot slip between the check and the wait.
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}
