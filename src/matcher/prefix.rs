//! Vanity prefix validation and matching.

use std::fmt;

use crate::crypto::{OnionAddress, ONION_ADDRESS_LEN};

/// Symbols of the RFC 4648 base32 alphabet used by onion addresses.
pub const BASE32_ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Why a raw prefix was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PrefixError {
    #[error("prefix cannot be empty")]
    Empty,

    #[error("prefix is {len} characters long, an onion address has only 56")]
    TooLong { len: usize },

    #[error("prefix contains invalid character for Base32 charset: '{0}'")]
    InvalidCharacter(char),
}

/// A validated, uppercase vanity prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefix(String);

impl Prefix {
    /// Normalizes `raw` to uppercase and checks it against the base32 alphabet.
    pub fn parse(raw: &str) -> Result<Self, PrefixError> {
        if raw.is_empty() {
            return Err(PrefixError::Empty);
        }

        // ASCII only: `to_uppercase` maps 'ß' to "SS".
        if let Some(c) = raw
            .chars()
            .find(|c| !BASE32_ALPHABET.contains(c.to_ascii_uppercase()))
        {
            return Err(PrefixError::InvalidCharacter(c));
        }

        // Only ASCII survives the alphabet check, so bytes == chars here.
        if raw.len() > ONION_ADDRESS_LEN {
            return Err(PrefixError::TooLong { len: raw.len() });
        }

        Ok(Self(raw.to_ascii_uppercase()))
    }

    /// Returns the normalized prefix.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of characters in the prefix.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for a parsed prefix; provided for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Tests whether `address` starts with this prefix, ignoring case.
    #[inline]
    pub fn matches(&self, address: &OnionAddress) -> bool {
        address
            .as_str()
            .as_bytes()
            .get(..self.0.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(self.0.as_bytes()))
    }

    /// Expected number of attempts before a match (32 symbols per character).
    pub fn estimated_attempts(&self) -> u64 {
        32u64.saturating_pow(self.0.len() as u32)
    }

    /// Returns a human-readable difficulty estimate.
    pub fn difficulty_description(&self) -> String {
        let attempts = self.estimated_attempts();
        match attempts {
            0..=100_000 => "Very Easy (< 1 second)".into(),
            100_001..=10_000_000 => "Easy (seconds)".into(),
            10_000_001..=1_000_000_000 => "Medium (minutes)".into(),
            1_000_000_001..=100_000_000_000 => "Hard (hours)".into(),
            _ => "Very Hard (days or more)".into(),
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
