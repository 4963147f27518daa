//! Tor v3 onion address derivation.

use std::fmt;

use data_encoding::BASE32_NOPAD;
use ed25519_dalek::VerifyingKey;
use sha3::{Digest, Sha3_256};

/// Number of characters in a v3 onion address (without `.onion`).
pub const ONION_ADDRESS_LEN: usize = 56;

const CHECKSUM_CONTEXT: &[u8] = b".onion checksum";
const VERSION: u8 = 0x03;

/// A Tor v3 onion address in its canonical lowercase form, without the
/// `.onion` suffix.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct OnionAddress(String);

impl OnionAddress {
    /// Derives the address of a service identified by `public_key`.
    ///
    /// `base32(pubkey || checksum[..2] || version)` where
    /// `checksum = SHA3-256(".onion checksum" || pubkey || version)`.
    pub fn from_public_key(public_key: &VerifyingKey) -> Self {
        Self::from_public_key_bytes(public_key.as_bytes())
    }

    /// Same as [`from_public_key`](Self::from_public_key) on raw key bytes.
    pub fn from_public_key_bytes(public_key: &[u8; 32]) -> Self {
        let mut hasher = Sha3_256::new();
        hasher.update(CHECKSUM_CONTEXT);
        hasher.update(public_key);
        hasher.update([VERSION]);
        let checksum = hasher.finalize();

        let mut raw = [0u8; 35];
        raw[..32].copy_from_slice(public_key);
        raw[32..34].copy_from_slice(&checksum[..2]);
        raw[34] = VERSION;

        let mut encoded = BASE32_NOPAD.encode(&raw);
        encoded.make_ascii_lowercase();
        Self(encoded)
    }

    #[cfg(test)]
    pub(crate) fn from_encoded(encoded: String) -> Self {
        Self(encoded)
    }

    /// Returns the address as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the address with the `.onion` suffix.
    pub fn to_hostname(&self) -> String {
        format!("{}.onion", self.0)
    }

    /// File name used for the exported profile bundle.
    pub fn bundle_file_name(&self) -> String {
        format!("{}.tar.gz", self.0)
    }
}

impl fmt::Debug for OnionAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OnionAddress({})", self.0)
    }
}

impl fmt::Display for OnionAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
