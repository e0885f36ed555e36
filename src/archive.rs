//! Reading and replacing single entries of a `.miz` (zip) archive.
//!
//! Zip archives cannot overwrite one member in place, so [`write_entry`]
//! rebuilds the whole archive into a temporary file next to the original and
//! renames it over the original once complete. Other members are copied raw
//! (without recompression) and keep their order.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Name of the archive member holding the mission table.
pub const MISSION_ENTRY: &str = "mission";

/// Errors from archive access.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] ZipError),

    #[error("archive has no entry named {entry:?}")]
    MissingEntry { archive: PathBuf, entry: String },
}

fn open(archive: &Path) -> Result<ZipArchive<BufReader<File>>, ArchiveError> {
    let file = File::open(archive)?;
    Ok(ZipArchive::new(BufReader::new(file))?)
}

/// Read one member of an archive into memory.
///
/// # Errors
/// Returns [`ArchiveError::MissingEntry`] when the member does not exist, or
/// an I/O / zip error when the archive cannot be read.
pub fn read_entry(archive: &Path, entry: &str) -> Result<Vec<u8>, ArchiveError> {
    let mut zip = open(archive)?;
    let mut file = match zip.by_name(entry) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => {
            return Err(ArchiveError::MissingEntry {
                archive: archive.to_owned(),
                entry: entry.to_owned(),
            });
        }
        Err(e) => return Err(e.into()),
    };
    let mut bytes = Vec::with_capacity(usize::try_from(file.size()).unwrap_or_default());
    file.read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// Member names in archive order.
///
/// # Errors
/// Returns an error when the archive cannot be read.
pub fn entry_names(archive: &Path) -> Result<Vec<String>, ArchiveError> {
    let zip = open(archive)?;
    Ok((0..zip.len())
        .filter_map(|i| zip.name_for_index(i))
        .map(str::to_owned)
        .collect())
}

/// Replace (or add) one member of an archive.
///
/// The replaced member keeps its position; a new member is appended. The
/// archive on disk is swapped atomically, so a failure leaves the original
/// untouched.
///
/// # Errors
/// Returns an I/O or zip error if the archive cannot be read, rebuilt, or
/// renamed into place.
pub fn write_entry(archive: &Path, entry: &str, bytes: &[u8]) -> Result<(), ArchiveError> {
    let dir = archive
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut reader = open(archive)?;
    let mut writer = ZipWriter::new(NamedTempFile::new_in(dir)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut replaced = false;
    for i in 0..reader.len() {
        let file = reader.by_index_raw(i)?;
        if file.name() == entry {
            drop(file);
            writer.start_file(entry, options)?;
            writer.write_all(bytes)?;
            replaced = true;
        } else {
            writer.raw_copy_file(file)?;
        }
    }
    if !replaced {
        writer.start_file(entry, options)?;
        writer.write_all(bytes)?;
    }

    let rebuilt = writer.finish()?;
    drop(reader);
    rebuilt.persist(archive).map_err(|e| ArchiveError::Io(e.error))?;
    tracing::debug!(archive = %archive.display(), entry, "archive rebuilt");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
