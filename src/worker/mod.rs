//! Worker pool for parallel vanity address search.
//!
//! This module provides:
//! - Multi-threaded CPU workers
//! - A one-shot cancellation signal shared by every thread
//! - The shared attempt counter used for progress reporting

mod cancel;
mod cpu;
mod pool;

pub use cancel::CancellationToken;
pub use cpu::{AttemptCounter, MatchResult, SearchWorker, WorkerExit, WorkerReport};
pub use pool::WorkerPool;
