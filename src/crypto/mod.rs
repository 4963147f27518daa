//! Cryptographic operations for onion key and address generation.
//!
//! This module provides:
//! - Secure random Ed25519 key generation
//! - Tor v3 onion address derivation
//! - Keypair management

mod keypair;
mod onion;

pub use keypair::{EntropyUnavailable, KeyGenerator, KeyPair, OsKeyGenerator};
pub use onion::{OnionAddress, ONION_ADDRESS_LEN};
