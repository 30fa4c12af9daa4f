//! Fractional progress reporting for a single transfer.

use std::fmt;
use std::sync::Arc;

/// Callback receiving the completed fraction of one transfer, in `0.0..=1.0`.
///
/// The handler runs on whichever task drives the transfer. There is no
/// buffering or debouncing, and a failed transfer may stop short of `1.0`.
#[derive(Clone)]
pub struct ProgressObserver {
    on_change: Arc<dyn Fn(f64) + Send + Sync>,
}

impl ProgressObserver {
    pub fn new(on_change: impl Fn(f64) + Send + Sync + 'static) -> Self {
        Self {
            on_change: Arc::new(on_change),
        }
    }

    /// Emit `fraction`, clamped to `0.0..=1.0`. NaN is dropped.
    pub fn notify(&self, fraction: f64) {
        if fraction.is_nan() {
            return;
        }
        (self.on_change)(fraction.clamp(0.0, 1.0));
    }
}

impl fmt::Debug for ProgressObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressObserver").finish_non_exhaustive()
    }
}

/// Byte counter that turns transferred-byte deltas into observer updates.
///
/// Transports create one per transfer. Without a known total, nothing is
/// reported.
#[derive(Debug)]
pub struct ProgressTracker {
    observer: Option<ProgressObserver>,
    total: Option<u64>,
    done: u64,
}

impl ProgressTracker {
    pub fn new(observer: Option<ProgressObserver>, total: Option<u64>) -> Self {
        Self {
            observer,
            total,
            done: 0,
        }
    }

    pub fn advance(&mut self, bytes: u64) {
        self.done = self.done.saturating_add(bytes);
        let (Some(observer), Some(total)) = (&self.observer, self.total) else {
            return;
        };
        if total == 0 {
            return;
        }
        observer.notify(self.done as f64 / total as f64);
    }

    /// Emit the final `1.0` for a transfer that completed with a known total
    /// but whose last update fell short (e.g. an empty body).
    pub fn finish(&mut self) {
        let (Some(observer), Some(total)) = (&self.observer, self.total) else {
            return;
        };
        if self.done < total || total == 0 {
            observer.notify(1.0);
        }
    }
}
