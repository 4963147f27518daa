//! One-shot broadcast cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::{bounded, Receiver, Sender};

#[derive(Debug)]
struct Inner {
    cancelled: AtomicBool,
    /// Dropped on cancellation, which disconnects every clone of `done_rx`
    done_tx: Mutex<Option<Sender<()>>>,
    done_rx: Receiver<()>,
}

/// Shared stop signal for workers, the progress reporter and the coordinator.
///
/// Starts uncancelled and transitions exactly once. The hot path is a single
/// atomic load; blocking waiters select on [`done`](Self::done), which becomes
/// ready (disconnected) on cancellation.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (done_tx, done_rx) = bounded(0);
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                done_tx: Mutex::new(Some(done_tx)),
                done_rx,
            }),
        }
    }

    /// Signals cancellation.
    ///
    /// Returns `true` only for the call that performed the transition; every
    /// later call is a no-op returning `false`.
    pub fn cancel(&self) -> bool {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return false;
        }
        // A poisoned lock still holds the sender; dropping it is all we need.
        let mut guard = match self.inner.done_tx.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.take();
        true
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Receiver usable in `select!`; a receive on it fails once cancelled.
    pub fn done(&self) -> &Receiver<()> {
        &self.inner.done_rx
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
