//! Cwtch profile persistence for found keys.
//!
//! - `key`: password-derived database key
//! - `store`: encrypted profile directory (version, salt, database)
//! - `export`: portable `.tar.gz` bundles of a profile directory

mod export;
mod key;
mod store;

use std::path::PathBuf;

use rand::rngs::OsRng;
use rand::RngCore;

pub use export::{export_bundle, ExportError};
pub use key::{ProfileKey, KEY_LEN, PBKDF2_ROUNDS, SALT_LEN};
pub use store::{
    KeyType, ProfileStore, StorageError, DB_FILE, SALT_FILE, STORAGE_VERSION, VERSION_FILE,
};

use crate::coordinator::{HandleError, MatchHandler};
use crate::crypto::EntropyUnavailable;
use crate::worker::MatchResult;

/// Attribute holding the profile display name.
pub const NAME_ATTRIBUTE: &str = "public.profile.name";
/// Attribute holding the profile onion address.
pub const ONION_ATTRIBUTE: &str = "public.profile.onion";
pub const PRIVATE_KEY_NAME: &str = "Ed25519PrivateKey";
pub const PUBLIC_KEY_NAME: &str = "Ed25519PublicKey";

/// Random 128-bit identifier in lowercase hex.
pub fn random_id() -> Result<String, EntropyUnavailable> {
    let mut bytes = [0u8; 16];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(hex::encode(bytes))
}

/// Stores every match in a profile and exports it as `<onion>.tar.gz`.
#[derive(Debug)]
pub struct ProfileExporter {
    store: ProfileStore,
    out_dir: PathBuf,
}

impl ProfileExporter {
    /// Names the profile and prepares to write bundles into `out_dir`.
    pub fn new(
        store: ProfileStore,
        profile_name: &str,
        out_dir: impl Into<PathBuf>,
    ) -> Result<Self, StorageError> {
        store.store_key_value(KeyType::Attribute, NAME_ATTRIBUTE, profile_name.as_bytes())?;
        Ok(Self {
            store,
            out_dir: out_dir.into(),
        })
    }

    pub fn store(&self) -> &ProfileStore {
        &self.store
    }

    /// Where the bundle for `found` is written.
    pub fn bundle_path(&self, found: &MatchResult) -> PathBuf {
        self.out_dir.join(found.address().bundle_file_name())
    }

    fn persist(&self, found: &MatchResult) -> Result<(), StorageError> {
        let key_pair = &found.key_pair;
        self.store.store_key_value(
            KeyType::Attribute,
            ONION_ATTRIBUTE,
            key_pair.address().as_str().as_bytes(),
        )?;
        self.store.store_key_value(
            KeyType::PrivateKey,
            PRIVATE_KEY_NAME,
            &key_pair.private_key_bytes()[..],
        )?;
        self.store.store_key_value(
            KeyType::PublicKey,
            PUBLIC_KEY_NAME,
            key_pair.public_key().as_bytes(),
        )
    }
}

impl MatchHandler for ProfileExporter {
    fn handle(&mut self, found: &MatchResult) -> Result<(), HandleError> {
        self.persist(found).map_err(HandleError::Persist)?;

        let bundle = self.bundle_path(found);
        let root = export_bundle(&self.store, &bundle).map_err(HandleError::Export)?;
        tracing::info!(bundle = %bundle.display(), root = %root, "profile exported");
        Ok(())
    }
}
