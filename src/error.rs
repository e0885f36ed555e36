//! Error types for loading, saving and merging mission documents.
//!
//! Lower layers have their own errors ([`DecodeError`], [`ArchiveError`],
//! [`AllocationError`](crate::ids::AllocationError),
//! [`MergeError`](crate::merge::MergeError)). This module wraps them for the
//! document and whole-run levels, adding the file each failure belongs to.

use std::path::PathBuf;

use thiserror::Error;

use crate::archive::ArchiveError;
use crate::merge::MergeError;
use crate::tree::DecodeError;

// ---------------------------------------------------------------------------
// DocumentError
// ---------------------------------------------------------------------------

/// Failure to turn a file or text into a [`MissionDocument`](crate::document::MissionDocument),
/// or to write one back.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The archive could not be read or rewritten.
    #[error("{source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: ArchiveError,
    },

    /// The mission entry is not valid UTF-8.
    #[error("mission entry is not valid UTF-8")]
    NotUtf8 { path: PathBuf },

    /// The mission text is not a valid table literal.
    #[error("mission does not parse: {0}")]
    Decode(#[from] DecodeError),

    /// The mission text parsed to something other than a table.
    #[error("mission root is a {found}, expected a table")]
    NotATable { found: &'static str },

    /// The root table has no `coalition` table.
    #[error("mission has no coalition table")]
    MissingCoalitions,
}

impl DocumentError {
    /// Attach a file path to an error that was produced from text alone.
    #[must_use]
    pub fn in_file(self, path: &std::path::Path) -> RunError {
        RunError::Document {
            path: path.to_owned(),
            source: self,
        }
    }
}

// ---------------------------------------------------------------------------
// RunError
// ---------------------------------------------------------------------------

/// Failure of a whole merge run.
#[derive(Debug, Error)]
pub enum RunError {
    /// The output file would overwrite the base mission.
    #[error("output {} is the base mission itself; pick another output name", path.display())]
    OutputIsBase { path: PathBuf },

    /// Copying the base to the output failed.
    #[error("could not copy {} to {}: {source}", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The finished mission could not be moved to the output path.
    #[error("could not write {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A mission failed to load or save.
    #[error("{}: {source}", path.display())]
    Document {
        path: PathBuf,
        #[source]
        source: DocumentError,
    },

    /// A merge failed in a way that stops the run.
    #[error("merging from {}: {source}", donor.display())]
    Merge {
        donor: PathBuf,
        #[source]
        source: MergeError,
    },
}
