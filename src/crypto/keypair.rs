//! Ed25519 keypair generation.

use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use super::OnionAddress;

/// The operating system random source could not supply bytes.
#[derive(Debug, thiserror::Error)]
#[error("entropy unavailable: {0}")]
pub struct EntropyUnavailable(#[from] pub rand::Error);

/// An Ed25519 keypair together with its derived onion address.
#[derive(Clone)]
pub struct KeyPair {
    /// The secret key; zeroized when dropped
    signing_key: SigningKey,
    /// The derived onion address
    address: OnionAddress,
}

impl KeyPair {
    /// Builds the keypair for a 32-byte Ed25519 seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let address = OnionAddress::from_public_key(&signing_key.verifying_key());

        Self {
            signing_key,
            address,
        }
    }

    /// Returns the public half.
    pub fn public_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Returns the 64-byte expanded private key form (`seed || public key`).
    pub fn private_key_bytes(&self) -> Zeroizing<[u8; 64]> {
        Zeroizing::new(self.signing_key.to_keypair_bytes())
    }

    /// Returns a reference to the derived onion address.
    #[inline]
    pub fn address(&self) -> &OnionAddress {
        &self.address
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Produces fresh keypairs for a search worker.
///
/// Each worker owns its own generator, so implementations need no internal
/// synchronization.
pub trait KeyGenerator: Clone + Send + 'static {
    fn generate(&mut self) -> Result<KeyPair, EntropyUnavailable>;
}

/// Generates keys from the operating system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsKeyGenerator;

impl KeyGenerator for OsKeyGenerator {
    #[inline]
    fn generate(&mut self) -> Result<KeyPair, EntropyUnavailable> {
        let mut seed = Zeroizing::new([0u8; 32]);
        OsRng.try_fill_bytes(&mut seed[..])?;
        Ok(KeyPair::from_seed(&seed))
    }
}
