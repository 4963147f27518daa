//! CPU-based worker for vanity onion address search.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{select, Sender};

use crate::crypto::{KeyGenerator, KeyPair, OnionAddress};
use crate::matcher::Prefix;

use super::CancellationToken;

/// Process-wide count of generated keys.
///
/// Incremented once per generated key by every worker; read by the progress
/// reporter.
#[derive(Debug, Default)]
pub struct AttemptCounter(AtomicU64);

impl AttemptCounter {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A keypair whose onion address starts with the requested prefix.
#[derive(Debug)]
pub struct MatchResult {
    /// The matching keypair, owned by the receiver from now on
    pub key_pair: KeyPair,
    /// The ID of the worker that found it
    pub worker_id: usize,
}

impl MatchResult {
    pub fn address(&self) -> &OnionAddress {
        self.key_pair.address()
    }
}

/// How a worker left its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Delivered a match in single-match mode
    Matched,
    /// Observed cancellation, or nobody is listening for results anymore
    Cancelled,
}

/// Summary returned by a finished worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerReport {
    pub id: usize,
    /// Keys this worker generated and counted
    pub attempts: u64,
    pub exit: WorkerExit,
}

/// A worker that generates keypairs and tests them against the prefix.
pub struct SearchWorker<G> {
    id: usize,
    prefix: Prefix,
    continuous: bool,
    generator: G,
    result_tx: Sender<MatchResult>,
    token: CancellationToken,
    attempts: Arc<AttemptCounter>,
}

impl<G: KeyGenerator> SearchWorker<G> {
    pub fn new(
        id: usize,
        prefix: Prefix,
        continuous: bool,
        generator: G,
        result_tx: Sender<MatchResult>,
        token: CancellationToken,
        attempts: Arc<AttemptCounter>,
    ) -> Self {
        Self {
            id,
            prefix,
            continuous,
            generator,
            result_tx,
            token,
            attempts,
        }
    }

    /// Runs the worker loop until cancelled or, in single-match mode, until
    /// a match has been delivered.
    pub fn run(mut self) -> WorkerReport {
        tracing::debug!(worker = self.id, "worker started");
        let mut attempts = 0u64;

        let exit = loop {
            if self.token.is_cancelled() {
                break WorkerExit::Cancelled;
            }

            let key_pair = match self.generator.generate() {
                Ok(key_pair) => key_pair,
                Err(e) => {
                    tracing::warn!(worker = self.id, error = %e, "key generation failed, retrying");
                    continue;
                }
            };

            self.attempts.increment();
            attempts += 1;

            if !self.prefix.matches(key_pair.address()) {
                continue;
            }

            tracing::debug!(worker = self.id, address = %key_pair.address(), "match found");
            let result = MatchResult {
                key_pair,
                worker_id: self.id,
            };

            // Never wait on a coordinator that has stopped listening.
            let delivered = select! {
                send(self.result_tx, result) -> res => res.is_ok(),
                recv(self.token.done()) -> _ => false,
            };

            if !delivered {
                break WorkerExit::Cancelled;
            }
            if !self.continuous {
                break WorkerExit::Matched;
            }
        };

        tracing::debug!(worker = self.id, attempts, ?exit, "worker stopped");
        WorkerReport {
            id: self.id,
            attempts,
            exit,
        }
    }
}
