//! Interrupt handling with a bounded grace period.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::worker::CancellationToken;

/// How long a graceful shutdown may take before the process is terminated.
pub const GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Exit status used when the grace period runs out.
pub const FORCED_EXIT_CODE: i32 = 1;

type Terminate = Arc<dyn Fn(i32) + Send + Sync>;

/// Turns SIGINT/SIGTERM into a single cancellation.
#[derive(Clone)]
pub struct ShutdownController {
    token: CancellationToken,
    grace: Duration,
    interrupts: Arc<AtomicUsize>,
    terminate: Terminate,
}

impl ShutdownController {
    /// Controller that exits the process when the grace period elapses.
    pub fn new(token: CancellationToken) -> Self {
        Self::with_terminate(token, GRACE_PERIOD, |code| std::process::exit(code))
    }

    /// Controller with a custom grace period and termination action.
    pub fn with_terminate<F>(token: CancellationToken, grace: Duration, terminate: F) -> Self
    where
        F: Fn(i32) + Send + Sync + 'static,
    {
        Self {
            token,
            grace,
            interrupts: Arc::new(AtomicUsize::new(0)),
            terminate: Arc::new(terminate),
        }
    }

    /// Registers the controller as the process Ctrl-C / SIGTERM handler.
    pub fn install(&self) -> Result<(), ctrlc::Error> {
        let controller = self.clone();
        ctrlc::set_handler(move || controller.on_interrupt())
    }

    /// Handles one interrupt notification.
    ///
    /// The first call cancels the search and arms the watchdog; later calls
    /// are only counted.
    pub fn on_interrupt(&self) {
        let seen = self.interrupts.fetch_add(1, Ordering::SeqCst);
        if seen > 0 {
            tracing::info!(interrupts = seen + 1, "already shutting down");
            return;
        }

        println!("\nInterrupt received. Shutting down gracefully...");
        if !self.token.cancel() {
            tracing::debug!("search was already cancelled");
        }
        self.arm_watchdog();
    }

    /// Number of interrupts received so far.
    pub fn interrupts(&self) -> usize {
        self.interrupts.load(Ordering::SeqCst)
    }

    fn arm_watchdog(&self) {
        let grace = self.grace;
        let terminate = self.terminate.clone();
        let spawned = thread::Builder::new()
            .name("vanity-shutdown-watchdog".into())
            .spawn(move || {
                thread::sleep(grace);
                tracing::warn!(?grace, "graceful shutdown timed out, terminating");
                terminate(FORCED_EXIT_CODE);
            });

        if let Err(e) = spawned {
            // Without a watchdog the cooperative shutdown is all we have.
            tracing::error!(error = %e, "could not start shutdown watchdog");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn recording(grace: Duration) -> (ShutdownController, CancellationToken, Arc<Mutex<Vec<i32>>>) {
        let token = CancellationToken::new();
        let codes = Arc::new(Mutex::new(Vec::new()));
        let sink = codes.clone();
        let controller = ShutdownController::with_terminate(token.clone(), grace, move |code| {
            sink.lock().unwrap().push(code)
        });
        (controller, token, codes)
    }

    #[test]
    fn test_first_interrupt_cancels() {
        let (controller, token, _) = recording(Duration::from_secs(60));
        controller.on_interrupt();
        assert!(token.is_cancelled());
        assert_eq!(controller.interrupts(), 1);
    }

    #[test]
    fn test_second_interrupt_is_harmless() {
        let (controller, token, codes) = recording(Duration::from_millis(30));
        controller.on_interrupt();
        controller.on_interrupt();
        assert!(token.is_cancelled());
        assert_eq!(controller.interrupts(), 2);

        thread::sleep(Duration::from_millis(200));
        // One watchdog, one forced exit.
        assert_eq!(*codes.lock().unwrap(), vec![FORCED_EXIT_CODE]);
    }

    #[test]
    fn test_watchdog_waits_for_grace_period() {
        let (controller, _, codes) = recording(Duration::from_millis(300));
        controller.on_interrupt();
        thread::sleep(Duration::from_millis(50));
        assert!(codes.lock().unwrap().is_empty());
        thread::sleep(Duration::from_millis(500));
        assert_eq!(codes.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_interrupt_after_normal_completion() {
        let (controller, token, _) = recording(Duration::from_secs(60));
        assert!(token.cancel());
        controller.on_interrupt();
        assert!(token.is_cancelled());
    }
}
