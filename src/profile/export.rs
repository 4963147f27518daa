//! Profile bundle export.
//!
//! A bundle is a gzip-compressed tar holding the profile files under a
//! freshly generated top-level directory, so that several bundles from the
//! same run can be imported side by side.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Builder, EntryType, Header};

use super::store::ProfileStore;
use crate::crypto::EntropyUnavailable;

/// Errors raised while writing a bundle.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("could not create tarball file '{}': {source}", path.display())]
    Create { path: PathBuf, source: io::Error },

    #[error("could not add file '{}' to tarball: {source}", path.display())]
    AddFile { path: PathBuf, source: io::Error },

    #[error("could not finish tarball '{}': {source}", path.display())]
    Finish { path: PathBuf, source: io::Error },

    #[error("could not generate bundle root: {0}")]
    Entropy(#[from] EntropyUnavailable),
}

/// Writes the files of `store` to a `.tar.gz` at `destination`.
///
/// Returns the random directory name every entry was placed under.
pub fn export_bundle(store: &ProfileStore, destination: &Path) -> Result<String, ExportError> {
    let root = super::random_id()?;
    write_bundle(&store.files(), &root, destination)?;
    Ok(root)
}

fn write_bundle(files: &[PathBuf], root: &str, destination: &Path) -> Result<(), ExportError> {
    let file = File::create(destination).map_err(|source| ExportError::Create {
        path: destination.to_path_buf(),
        source,
    })?;

    let result = fill_bundle(file, files, root, destination);
    if result.is_err() {
        // Don't leave a truncated bundle behind under a valid-looking name.
        let _ = fs::remove_file(destination);
    }
    result
}

fn fill_bundle(
    file: File,
    files: &[PathBuf],
    root: &str,
    destination: &Path,
) -> Result<(), ExportError> {
    let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));

    for path in files {
        append_file(&mut builder, root, path).map_err(|source| ExportError::AddFile {
            path: path.clone(),
            source,
        })?;
    }

    builder
        .into_inner()
        .and_then(|gz| gz.finish())
        .and_then(|file| file.sync_all())
        .map_err(|source| ExportError::Finish {
            path: destination.to_path_buf(),
            source,
        })
}

fn append_file<W: io::Write>(builder: &mut Builder<W>, root: &str, path: &Path) -> io::Result<()> {
    let mut file = File::open(path)?;
    let metadata = file.metadata()?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "profile file has no name"))?;

    let mut header = Header::new_ustar();
    // Always '/'-joined so bundles import identically on every platform.
    header.set_path(format!("{}/{}", root, name))?;
    header.set_entry_type(EntryType::Regular);
    header.set_size(metadata.len());
    header.set_mode(file_mode(&metadata));
    header.set_mtime(
        metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map_or(0, |d| d.as_secs()),
    );
    header.set_cksum();

    builder.append(&header, &mut file)
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn file_mode(_metadata: &fs::Metadata) -> u32 {
    0o600
}
