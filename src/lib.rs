//! # onion_vanity
//!
//! Tor v3 vanity onion address generator that exports each find as an
//! encrypted Cwtch profile bundle.
//!
//! ## Architecture
//!
//! - `crypto`: Ed25519 key generation and onion address derivation
//! - `matcher`: Prefix validation and matching
//! - `worker`: Parallel search workers, cancellation and attempt counting
//! - `coordinator`: Drives a search and consumes its matches
//! - `progress`: Periodic throughput reporting
//! - `shutdown`: Interrupt handling with a grace period
//! - `profile`: Encrypted profile store and bundle export
//! - `config`: Runtime configuration

pub mod config;
pub mod coordinator;
pub mod crypto;
pub mod matcher;
pub mod profile;
pub mod progress;
pub mod shutdown;
pub mod worker;

pub use config::{Config, Settings};
pub use coordinator::{Coordinator, MatchHandler, SearchError, SearchOutcome, SearchRequest, StopReason};
pub use crypto::{KeyPair, OnionAddress};
pub use matcher::{Prefix, PrefixError};
pub use profile::{ProfileExporter, ProfileStore};
pub use shutdown::ShutdownController;
pub use worker::{CancellationToken, MatchResult, WorkerPool};
