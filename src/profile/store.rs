//! Encrypted profile store compatible with Cwtch v2 profile directories.
//!
//! A profile directory holds three files:
//! - `VERSION`: the storage format version (`2`)
//! - `SALT`: 128 random bytes used to derive the database key
//! - `db`: an SQLCipher database with the profile key/value table

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use zeroize::Zeroizing;

use super::key::{ProfileKey, SALT_LEN};
use crate::crypto::EntropyUnavailable;

pub const VERSION_FILE: &str = "VERSION";
pub const SALT_FILE: &str = "SALT";
pub const DB_FILE: &str = "db";

/// Storage format version written to `VERSION`.
pub const STORAGE_VERSION: &str = "2";

const CIPHER_PAGE_SIZE: i64 = 8192;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS profile_kv (
        KeyType TEXT,
        KeyName TEXT,
        KeyValue BLOB,
        PRIMARY KEY (KeyType, KeyName)
    );
    CREATE TABLE IF NOT EXISTS conversations (
        ID INTEGER UNIQUE PRIMARY KEY AUTOINCREMENT,
        Handle TEXT,
        Attributes BLOB,
        ACL BLOB,
        Accepted BOOL
    );";

/// Category of a profile key/value entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Attribute,
    PrivateKey,
    PublicKey,
}

impl KeyType {
    pub fn as_str(self) -> &'static str {
        match self {
            KeyType::Attribute => "Attribute",
            KeyType::PrivateKey => "PrivateKey",
            KeyType::PublicKey => "PublicKey",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the profile store.
///
/// Every variant except [`StorageError::Write`] can only occur while the
/// store is being created or opened.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("could not create profile directory '{}': {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("could not write '{}': {source}", path.display())]
    WriteFile { path: PathBuf, source: io::Error },

    #[error("could not read '{}': {source}", path.display())]
    ReadFile { path: PathBuf, source: io::Error },

    #[error("'{}' does not hold a 128-byte salt", path.display())]
    BadSalt { path: PathBuf },

    #[error("could not create key for profile store from password: {0}")]
    Entropy(#[from] EntropyUnavailable),

    #[error("could not open encrypted store '{}': {source}", path.display())]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },

    #[error("failed to store {key_type} '{key_name}': {source}")]
    Write {
        key_type: KeyType,
        key_name: String,
        source: rusqlite::Error,
    },

    #[error("failed to load {key_type} '{key_name}': {source}")]
    Read {
        key_type: KeyType,
        key_name: String,
        source: rusqlite::Error,
    },
}

/// An open, keyed profile store.
pub struct ProfileStore {
    // Declared before `scratch` so the connection closes before the
    // directory is removed.
    conn: Connection,
    dir: PathBuf,
    scratch: Option<ScratchDir>,
}

impl ProfileStore {
    /// Creates a profile in `dir`: version and salt files plus an encrypted
    /// database keyed from `password`.
    pub fn bootstrap(dir: &Path, password: &str) -> Result<Self, StorageError> {
        create_private_dir(dir)?;

        let (key, salt) = ProfileKey::create(password)?;
        write_private_file(&dir.join(VERSION_FILE), STORAGE_VERSION.as_bytes())?;
        write_private_file(&dir.join(SALT_FILE), &salt)?;

        let conn = open_encrypted(&dir.join(DB_FILE), &key)?;
        tracing::debug!(dir = %dir.display(), "profile store created");

        Ok(Self {
            conn,
            dir: dir.to_path_buf(),
            scratch: None,
        })
    }

    /// Like [`bootstrap`](Self::bootstrap), in a fresh randomly named
    /// directory under `parent` that is deleted when the store is dropped.
    pub fn bootstrap_scratch(parent: &Path, password: &str) -> Result<Self, StorageError> {
        let dir = parent.join(super::random_id()?);
        let scratch = ScratchDir(dir.clone());
        let mut store = Self::bootstrap(&dir, password)?;
        store.scratch = Some(scratch);
        Ok(store)
    }

    /// Opens an existing profile directory.
    pub fn open(dir: &Path, password: &str) -> Result<Self, StorageError> {
        let salt_path = dir.join(SALT_FILE);
        let salt_bytes = fs::read(&salt_path).map_err(|source| StorageError::ReadFile {
            path: salt_path.clone(),
            source,
        })?;
        let salt: [u8; SALT_LEN] = salt_bytes
            .try_into()
            .map_err(|_| StorageError::BadSalt { path: salt_path })?;

        let key = ProfileKey::derive(password, &salt);
        let conn = open_encrypted(&dir.join(DB_FILE), &key)?;

        Ok(Self {
            conn,
            dir: dir.to_path_buf(),
            scratch: None,
        })
    }

    /// Inserts or replaces one key/value entry.
    pub fn store_key_value(
        &self,
        key_type: KeyType,
        key_name: &str,
        value: &[u8],
    ) -> Result<(), StorageError> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO profile_kv (KeyType, KeyName, KeyValue) VALUES (?1, ?2, ?3)",
                params![key_type.as_str(), key_name, value],
            )
            .map(|_| ())
            .map_err(|source| StorageError::Write {
                key_type,
                key_name: key_name.to_owned(),
                source,
            })
    }

    /// Loads one key/value entry, if present.
    pub fn load_key_value(
        &self,
        key_type: KeyType,
        key_name: &str,
    ) -> Result<Option<Vec<u8>>, StorageError> {
        self.conn
            .query_row(
                "SELECT KeyValue FROM profile_kv WHERE KeyType = ?1 AND KeyName = ?2",
                params![key_type.as_str(), key_name],
                |row| row.get(0),
            )
            .optional()
            .map_err(|source| StorageError::Read {
                key_type,
                key_name: key_name.to_owned(),
                source,
            })
    }

    /// The profile directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[cfg(test)]
    pub(crate) fn make_read_only(&self) {
        self.conn.pragma_update(None, "query_only", true).unwrap();
    }

    /// The files making up the profile, in export order.
    pub fn files(&self) -> [PathBuf; 3] {
        [
            self.dir.join(DB_FILE),
            self.dir.join(SALT_FILE),
            self.dir.join(VERSION_FILE),
        ]
    }
}

impl fmt::Debug for ProfileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileStore")
            .field("dir", &self.dir)
            .field("scratch", &self.scratch.is_some())
            .finish()
    }
}

/// Directory removed on drop.
struct ScratchDir(PathBuf);

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.0) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(dir = %self.0.display(), error = %e, "could not remove profile directory");
            }
        }
    }
}

fn open_encrypted(path: &Path, key: &ProfileKey) -> Result<Connection, StorageError> {
    let open_err = |source| StorageError::Open {
        path: path.to_path_buf(),
        source,
    };

    let conn = Connection::open(path).map_err(open_err)?;
    // Raw key form, so SQLCipher skips its own passphrase derivation.
    let raw_key = Zeroizing::new(format!("x'{}'", key.to_hex().as_str()));
    conn.pragma_update(None, "key", raw_key.as_str())
        .map_err(open_err)?;
    conn.pragma_update(None, "cipher_page_size", CIPHER_PAGE_SIZE)
        .map_err(open_err)?;

    // A wrong key only surfaces once a page is read.
    conn.execute_batch(SCHEMA).map_err(open_err)?;
    Ok(conn)
}

fn create_private_dir(dir: &Path) -> Result<(), StorageError> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir).map_err(|source| StorageError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })
}

fn write_private_file(path: &Path, contents: &[u8]) -> Result<(), StorageError> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    options
        .open(path)
        .and_then(|mut file| file.write_all(contents))
        .map_err(|source| StorageError::WriteFile {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("profile");
        let store = ProfileStore::bootstrap(&dir, "pw").unwrap();

        assert_eq!(fs::read_to_string(dir.join(VERSION_FILE)).unwrap(), "2");
        assert_eq!(fs::read(dir.join(SALT_FILE)).unwrap().len(), SALT_LEN);
        assert!(dir.join(DB_FILE).is_file());
        assert!(store.files().iter().all(|f| f.is_file()));
    }

    #[test]
    fn test_values_round_trip_through_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("profile");
        {
            let store = ProfileStore::bootstrap(&dir, "pw").unwrap();
            store
                .store_key_value(KeyType::Attribute, "public.profile.name", b"first")
                .unwrap();
            store
                .store_key_value(KeyType::Attribute, "public.profile.name", b"second")
                .unwrap();
        }

        let store = ProfileStore::open(&dir, "pw").unwrap();
        assert_eq!(
            store
                .load_key_value(KeyType::Attribute, "public.profile.name")
                .unwrap(),
            Some(b"second".to_vec())
        );
        assert_eq!(
            store.load_key_value(KeyType::PublicKey, "Ed25519PublicKey").unwrap(),
            None
        );
    }

    #[test]
    fn test_wrong_password_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("profile");
        drop(ProfileStore::bootstrap(&dir, "right").unwrap());

        let err = ProfileStore::open(&dir, "wrong").unwrap_err();
        assert!(matches!(err, StorageError::Open { .. }), "{err}");
    }

    #[test]
    fn test_database_is_not_plaintext() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("profile");
        let store = ProfileStore::bootstrap(&dir, "pw").unwrap();
        store
            .store_key_value(KeyType::Attribute, "marker", b"plaintext-marker")
            .unwrap();
        drop(store);

        let raw = fs::read(dir.join(DB_FILE)).unwrap();
        assert!(!raw.starts_with(b"SQLite format 3"));
        assert!(!raw.windows(16).any(|w| w == b"plaintext-marker"));
    }

    #[test]
    fn test_scratch_dir_removed_on_drop() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ProfileStore::bootstrap_scratch(tmp.path(), "pw").unwrap();
        let dir = store.dir().to_path_buf();
        assert!(dir.starts_with(tmp.path()));
        assert!(dir.is_dir());
        drop(store);
        assert!(!dir.exists());
    }

    #[test]
    fn test_bootstrap_into_file_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, b"x").unwrap();

        let err = ProfileStore::bootstrap(&blocker.join("profile"), "pw").unwrap_err();
        assert!(matches!(err, StorageError::CreateDir { .. }));
    }
}
