//! Worker pool management.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::crypto::KeyGenerator;
use crate::matcher::Prefix;

use super::cpu::{AttemptCounter, MatchResult, SearchWorker, WorkerReport};
use super::CancellationToken;

/// Manages a pool of workers searching for the same prefix.
pub struct WorkerPool {
    /// Number of workers
    num_workers: usize,
    /// Worker thread handles (Option to allow taking during join)
    handles: Option<Vec<JoinHandle<WorkerReport>>>,
    /// Channel receiver for matches
    result_rx: Receiver<MatchResult>,
    /// Shared cancellation signal
    token: CancellationToken,
    /// Shared attempt counter
    attempts: Arc<AttemptCounter>,
}

impl WorkerPool {
    /// Spawns `num_workers` workers, each with its own clone of `generator`.
    ///
    /// Matches are handed over through a zero-capacity channel, so a worker
    /// holding a match waits for the receiver or for `token`.
    pub fn spawn<G: KeyGenerator>(
        num_workers: usize,
        prefix: &Prefix,
        continuous: bool,
        generator: G,
        token: CancellationToken,
    ) -> io::Result<Self> {
        let (result_tx, result_rx) = bounded(0);
        let attempts = Arc::new(AttemptCounter::new());

        let handles = match Self::spawn_workers(
            num_workers,
            prefix,
            continuous,
            generator,
            result_tx,
            &token,
            &attempts,
        ) {
            Ok(handles) => handles,
            Err((e, spawned)) => {
                token.cancel();
                for handle in spawned {
                    let _ = handle.join();
                }
                return Err(e);
            }
        };

        Ok(Self {
            num_workers,
            handles: Some(handles),
            result_rx,
            token,
            attempts,
        })
    }

    /// Spawns worker threads, returning the ones already running on failure.
    #[allow(clippy::type_complexity)]
    fn spawn_workers<G: KeyGenerator>(
        num_workers: usize,
        prefix: &Prefix,
        continuous: bool,
        generator: G,
        result_tx: Sender<MatchResult>,
        token: &CancellationToken,
        attempts: &Arc<AttemptCounter>,
    ) -> Result<Vec<JoinHandle<WorkerReport>>, (io::Error, Vec<JoinHandle<WorkerReport>>)> {
        let mut handles = Vec::with_capacity(num_workers);

        for id in 0..num_workers {
            let worker = SearchWorker::new(
                id,
                prefix.clone(),
                continuous,
                generator.clone(),
                result_tx.clone(),
                token.clone(),
                attempts.clone(),
            );

            match thread::Builder::new()
                .name(format!("vanity-worker-{}", id))
                .spawn(move || worker.run())
            {
                Ok(handle) => handles.push(handle),
                Err(e) => return Err((e, handles)),
            }
        }

        Ok(handles)
    }

    /// Receiver side of the match channel.
    pub fn results(&self) -> &Receiver<MatchResult> {
        &self.result_rx
    }

    /// Signals all workers to stop.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Stops the workers and waits for each of them to exit.
    pub fn join(mut self) -> Vec<WorkerReport> {
        self.join_workers()
    }

    fn join_workers(&mut self) -> Vec<WorkerReport> {
        self.stop();
        let Some(handles) = self.handles.take() else {
            return Vec::new();
        };

        handles
            .into_iter()
            .filter_map(|handle| match handle.join() {
                Ok(report) => Some(report),
                Err(_) => {
                    tracing::error!("search worker panicked");
                    None
                }
            })
            .collect()
    }

    /// Returns the number of workers.
    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Returns the shared attempt counter.
    pub fn attempts(&self) -> &Arc<AttemptCounter> {
        &self.attempts
    }

}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Wait for workers to finish if they haven't been joined
        self.join_workers();
    }
}
