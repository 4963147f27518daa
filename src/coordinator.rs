//! Search coordination: spawns the pool, consumes matches, decides when to
//! stop.

use std::io::{self, Write};
use std::time::Duration;

use crossbeam_channel::select;

use crate::crypto::{KeyGenerator, OsKeyGenerator};
use crate::matcher::Prefix;
use crate::profile::{ExportError, StorageError};
use crate::progress::{self, REPORT_INTERVAL};
use crate::worker::{CancellationToken, MatchResult, WorkerPool};

/// What to search for and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    prefix: Prefix,
    worker_count: usize,
    continuous: bool,
}

impl SearchRequest {
    pub fn new(prefix: Prefix, worker_count: usize, continuous: bool) -> Result<Self, SearchError> {
        if worker_count == 0 {
            return Err(SearchError::NoWorkers);
        }
        Ok(Self {
            prefix,
            worker_count,
            continuous,
        })
    }

    pub fn prefix(&self) -> &Prefix {
        &self.prefix
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Whether the search keeps going after the first match.
    pub fn continuous(&self) -> bool {
        self.continuous
    }
}

/// Receives each match on the coordinator thread.
pub trait MatchHandler {
    fn handle(&mut self, found: &MatchResult) -> Result<(), HandleError>;
}

/// Failure while handling one match.
#[derive(Debug, thiserror::Error)]
pub enum HandleError {
    /// The key material could not be written to the profile store.
    #[error(transparent)]
    Persist(StorageError),

    /// The key was stored but the bundle could not be written.
    #[error(transparent)]
    Export(ExportError),
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("worker count must be at least 1")]
    NoWorkers,

    #[error("could not start search threads: {0}")]
    Spawn(#[source] io::Error),

    #[error("failed to persist found key: {0}")]
    Persist(#[source] StorageError),
}

/// Why the receive loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Single-match mode found and handled its match
    Matched,
    /// The cancellation signal was set elsewhere
    Cancelled,
}

/// Result of a finished search.
///
/// The token is already cancelled; join `pool` to wait for every worker.
pub struct SearchOutcome {
    pub matches: usize,
    pub stop: StopReason,
    pub pool: WorkerPool,
}

/// Runs one search to completion.
pub struct Coordinator<G = OsKeyGenerator> {
    token: CancellationToken,
    generator: G,
    report_interval: Duration,
    progress_out: Option<Box<dyn Write + Send>>,
}

impl Coordinator {
    /// Coordinator using OS randomness and printing progress to stdout.
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            generator: OsKeyGenerator,
            report_interval: REPORT_INTERVAL,
            progress_out: Some(Box::new(io::stdout())),
        }
    }
}

impl<G: KeyGenerator> Coordinator<G> {
    /// Replaces the key source cloned into every worker.
    pub fn with_generator<H: KeyGenerator>(self, generator: H) -> Coordinator<H> {
        Coordinator {
            token: self.token,
            generator,
            report_interval: self.report_interval,
            progress_out: self.progress_out,
        }
    }

    /// Sends progress lines to `out` every `interval`.
    pub fn with_progress<W>(mut self, out: W, interval: Duration) -> Self
    where
        W: Write + Send + 'static,
    {
        self.progress_out = Some(Box::new(out));
        self.report_interval = interval;
        self
    }

    /// Disables progress reporting.
    pub fn without_progress(mut self) -> Self {
        self.progress_out = None;
        self
    }

    /// Searches until the first match (single mode) or until cancelled.
    ///
    /// Each match is printed to stdout and passed to `handler`. Export
    /// failures are logged and never end the search. A persistence failure
    /// is logged too, and in single mode it is returned after cancelling.
    pub fn run<H: MatchHandler>(
        self,
        request: &SearchRequest,
        handler: &mut H,
    ) -> Result<SearchOutcome, SearchError> {
        let token = self.token;
        let pool = WorkerPool::spawn(
            request.worker_count,
            &request.prefix,
            request.continuous,
            self.generator,
            token.clone(),
        )
        .map_err(SearchError::Spawn)?;
        tracing::debug!(
            workers = pool.num_workers(),
            prefix = request.prefix.as_str(),
            continuous = request.continuous,
            "search started"
        );

        let reporter = match self.progress_out {
            Some(out) => Some(
                progress::spawn(pool.attempts().clone(), token.clone(), self.report_interval, out)
                    .map_err(SearchError::Spawn)?,
            ),
            None => None,
        };

        let mut matches = 0;
        let result = loop {
            select! {
                recv(pool.results()) -> msg => {
                    let Ok(found) = msg else {
                        // Every worker has exited.
                        break Ok(StopReason::Cancelled);
                    };
                    matches += 1;
                    println!("{}", found.address());

                    match handler.handle(&found) {
                        Ok(()) => {}
                        Err(HandleError::Export(e)) => {
                            tracing::error!(address = %found.address(), error = %e, "export failed");
                        }
                        Err(HandleError::Persist(e)) => {
                            tracing::error!(address = %found.address(), error = %e, "could not store found key");
                            if !request.continuous {
                                break Err(SearchError::Persist(e));
                            }
                        }
                    }

                    if !request.continuous {
                        break Ok(StopReason::Matched);
                    }
                }
                recv(token.done()) -> _ => {
                    println!("Main loop received stop signal.");
                    break Ok(StopReason::Cancelled);
                }
            }
        };

        token.cancel();
        if let Some(handle) = reporter {
            if handle.join().is_err() {
                tracing::error!("progress reporter panicked");
            }
        }

        result.map(|stop| SearchOutcome {
            matches,
            stop,
            pool,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::crypto::{EntropyUnavailable, KeyPair, OnionAddress};
    use crate::worker::WorkerExit;

    /// Every worker produces the same keypair, so every attempt matches.
    #[derive(Clone)]
    struct FixedKey;

    impl KeyGenerator for FixedKey {
        fn generate(&mut self) -> Result<KeyPair, EntropyUnavailable> {
            Ok(KeyPair::from_seed(&[1u8; 32]))
        }
    }

    #[derive(Default)]
    struct Recorder {
        seen: Vec<OnionAddress>,
        stop_after: Option<(usize, CancellationToken)>,
        fail_persist: bool,
    }

    impl MatchHandler for Recorder {
        fn handle(&mut self, found: &MatchResult) -> Result<(), HandleError> {
            self.seen.push(found.address().clone());
            if let Some((limit, token)) = &self.stop_after {
                if self.seen.len() >= *limit {
                    token.cancel();
                }
            }
            if self.fail_persist {
                return Err(HandleError::Persist(StorageError::BadSalt {
                    path: "SALT".into(),
                }));
            }
            Ok(())
        }
    }

    fn fixed_prefix() -> String {
        KeyPair::from_seed(&[1u8; 32]).address().as_str()[..3].to_owned()
    }

    fn request(prefix: &str, workers: usize, continuous: bool) -> SearchRequest {
        SearchRequest::new(Prefix::parse(prefix).unwrap(), workers, continuous).unwrap()
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = SearchRequest::new(Prefix::parse("a").unwrap(), 0, false).unwrap_err();
        assert!(matches!(err, SearchError::NoWorkers));
    }

    #[test]
    fn test_single_mode_handles_exactly_one_match() {
        let mut recorder = Recorder::default();

        let outcome = Coordinator::new(CancellationToken::new())
            .with_generator(FixedKey)
            .without_progress()
            .run(&request(&fixed_prefix(), 8, false), &mut recorder)
            .unwrap();

        assert_eq!(outcome.stop, StopReason::Matched);
        assert_eq!(outcome.matches, 1);
        assert_eq!(recorder.seen.len(), 1);

        let reports = outcome.pool.join();
        assert_eq!(reports.len(), 8);
        assert_eq!(reports.iter().filter(|r| r.exit == WorkerExit::Matched).count(), 1);
    }

    #[test]
    fn test_continuous_mode_runs_until_cancelled() {
        let token = CancellationToken::new();
        let mut recorder = Recorder {
            stop_after: Some((3, token.clone())),
            ..Recorder::default()
        };

        let outcome = Coordinator::new(token.clone())
            .without_progress()
            .run(&request("a", 2, true), &mut recorder)
            .unwrap();

        assert_eq!(outcome.stop, StopReason::Cancelled);
        assert!(outcome.matches >= 3);
        assert!(token.is_cancelled());

        let distinct: HashSet<_> = recorder.seen.iter().collect();
        assert_eq!(distinct.len(), recorder.seen.len());
        assert!(recorder
            .seen
            .iter()
            .all(|a| a.as_str().starts_with('a')));
        outcome.pool.join();
    }

    #[test]
    fn test_external_cancel_stops_search() {
        let token = CancellationToken::new();
        let canceller = {
            let token = token.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(50));
                token.cancel();
            })
        };

        let mut recorder = Recorder::default();
        let outcome = Coordinator::new(token)
            .without_progress()
            .run(&request("zzzzzzzzzz", 2, false), &mut recorder)
            .unwrap();
        canceller.join().unwrap();

        assert_eq!(outcome.stop, StopReason::Cancelled);
        assert_eq!(outcome.matches, 0);
        assert!(outcome.pool.join().iter().all(|r| r.exit == WorkerExit::Cancelled));
    }

    #[test]
    fn test_persist_failure_ends_single_search() {
        let mut recorder = Recorder {
            fail_persist: true,
            ..Recorder::default()
        };
        let token = CancellationToken::new();

        let err = Coordinator::new(token.clone())
            .with_generator(FixedKey)
            .without_progress()
            .run(&request(&fixed_prefix(), 2, false), &mut recorder)
            .err()
            .unwrap();

        assert!(matches!(err, SearchError::Persist(_)));
        assert!(token.is_cancelled());
        assert_eq!(recorder.seen.len(), 1);
    }

    #[test]
    fn test_persist_failure_does_not_end_continuous_search() {
        let token = CancellationToken::new();
        let mut recorder = Recorder {
            stop_after: Some((2, token.clone())),
            fail_persist: true,
            ..Recorder::default()
        };

        let outcome = Coordinator::new(token)
            .with_generator(FixedKey)
            .without_progress()
            .run(&request(&fixed_prefix(), 2, true), &mut recorder)
            .unwrap();
        assert!(outcome.matches >= 2);
    }
}
