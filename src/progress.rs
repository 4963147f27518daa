//! Periodic throughput reporting.

use std::io::{self, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{select, tick};

use crate::worker::{AttemptCounter, CancellationToken};

/// Default sampling interval.
pub const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// One observation of the attempt counter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Counter value at sampling time
    pub attempts: u64,
    /// Attempts since the previous sample
    pub delta: u64,
    /// Attempts per second over the last interval
    pub rate: f64,
    /// Attempts per second since the reporter started
    pub total_rate: f64,
}

impl Sample {
    /// Formats the sample as printed once per interval.
    pub fn line(&self) -> String {
        format!(
            "Attempts: {}, Rate: {:.2}/sec, Total rate: {:.2}/sec",
            self.attempts, self.rate, self.total_rate
        )
    }
}

/// Turns successive counter readings into [`Sample`]s.
#[derive(Debug)]
pub struct RateTracker {
    start: Instant,
    last_at: Instant,
    last_attempts: u64,
}

impl RateTracker {
    pub fn new(start: Instant) -> Self {
        Self {
            start,
            last_at: start,
            last_attempts: 0,
        }
    }

    pub fn sample(&mut self, attempts: u64, now: Instant) -> Sample {
        let delta = attempts.saturating_sub(self.last_attempts);
        let interval = now.saturating_duration_since(self.last_at).as_secs_f64();
        let elapsed = now.saturating_duration_since(self.start).as_secs_f64();

        self.last_attempts = attempts;
        self.last_at = now;

        Sample {
            attempts,
            delta,
            rate: per_second(delta, interval),
            total_rate: per_second(attempts, elapsed),
        }
    }
}

fn per_second(count: u64, secs: f64) -> f64 {
    if secs > 0.0 {
        count as f64 / secs
    } else {
        0.0
    }
}

/// Spawns the reporter thread.
///
/// Every `interval` it samples `attempts` and writes a line to `out`. It only
/// reads the counter, and stops once `token` is cancelled after taking one
/// last sample.
pub fn spawn<W>(
    attempts: Arc<AttemptCounter>,
    token: CancellationToken,
    interval: Duration,
    mut out: W,
) -> io::Result<JoinHandle<()>>
where
    W: Write + Send + 'static,
{
    thread::Builder::new()
        .name("vanity-progress".into())
        .spawn(move || {
            let ticker = tick(interval);
            let mut tracker = RateTracker::new(Instant::now());

            loop {
                select! {
                    recv(ticker) -> _ => {
                        let sample = tracker.sample(attempts.get(), Instant::now());
                        if let Err(e) = writeln!(out, "{}", sample.line()) {
                            tracing::warn!(error = %e, "could not write progress line");
                        }
                    }
                    recv(token.done()) -> _ => break,
                }
            }

            let last = tracker.sample(attempts.get(), Instant::now());
            tracing::debug!(attempts = last.attempts, total_rate = last.total_rate, "progress reporter stopped");
        })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_rates() {
        let start = Instant::now();
        let mut tracker = RateTracker::new(start);

        let first = tracker.sample(100, start + Duration::from_secs(1));
        assert_eq!(first.delta, 100);
        assert_eq!(first.rate, 100.0);
        assert_eq!(first.total_rate, 100.0);

        let second = tracker.sample(400, start + Duration::from_secs(2));
        assert_eq!(second.delta, 300);
        assert_eq!(second.rate, 300.0);
        assert_eq!(second.total_rate, 200.0);
    }

    #[test]
    fn test_zero_elapsed() {
        let start = Instant::now();
        let sample = RateTracker::new(start).sample(5, start);
        assert_eq!(sample.rate, 0.0);
        assert_eq!(sample.total_rate, 0.0);
    }

    #[test]
    fn test_line_format() {
        let sample = Sample {
            attempts: 1234,
            delta: 34,
            rate: 34.0,
            total_rate: 617.0,
        };
        assert_eq!(
            sample.line(),
            "Attempts: 1234, Rate: 34.00/sec, Total rate: 617.00/sec"
        );
    }

    #[test]
    fn test_reporter_reads_without_mutating_and_stops() {
        let attempts = Arc::new(AttemptCounter::new());
        for _ in 0..42 {
            attempts.increment();
        }
        let token = CancellationToken::new();
        let out = Captured::default();

        let handle = spawn(
            attempts.clone(),
            token.clone(),
            Duration::from_millis(10),
            out.clone(),
        )
        .unwrap();
        thread::sleep(Duration::from_millis(55));
        token.cancel();
        handle.join().unwrap();

        assert_eq!(attempts.get(), 42);
        let text = String::from_utf8(out.0.lock().unwrap().clone()).unwrap();
        assert!(text.lines().count() >= 1);
        assert!(text.lines().all(|l| l.starts_with("Attempts: 42, ")));
    }
}
