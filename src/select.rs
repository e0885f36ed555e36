//! Finding candidate missions and turning user input into a selection.
//!
//! Candidates are the `.miz` files of the missions directory whose file name
//! contains the configured filter, sorted by name and numbered from 0. The
//! base is picked by one number and the donors by a comma-separated list.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// A mission offered for selection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub file_name: String,
}

/// Invalid selection input or an unusable missions directory.
#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("could not read missions directory: {0}")]
    Glob(#[from] glob::GlobError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no missions matching {filter:?} in {}", dir.display())]
    NoCandidates { dir: PathBuf, filter: String },

    #[error("{input:?} is not a mission number")]
    NotANumber { input: String },

    #[error("mission number {index} is out of range (0..{len})")]
    OutOfRange { index: usize, len: usize },

    #[error("no mission named {name:?} among the candidates")]
    UnknownMission { name: String },

    #[error("nothing selected")]
    Empty,
}

/// List `*.miz` files in `dir` whose name contains `filter`, sorted by name.
///
/// # Errors
/// Returns an error if the directory cannot be read.
pub fn list_candidates(dir: &Path, filter: &str) -> Result<Vec<Candidate>, SelectionError> {
    let pattern = format!(
        "{}/*.miz",
        glob::Pattern::escape(&dir.to_string_lossy())
    );
    let mut candidates = Vec::new();
    for entry in glob::glob(&pattern)? {
        let path = entry?;
        let Some(file_name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if file_name.contains(filter) && path.is_file() {
            candidates.push(Candidate { path, file_name });
        }
    }
    candidates.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    tracing::debug!(dir = %dir.display(), filter, count = candidates.len(), "listed missions");
    Ok(candidates)
}

/// Parse one mission number.
///
/// # Errors
/// Returns an error for empty, non-numeric or out-of-range input.
pub fn parse_index(input: &str, len: usize) -> Result<usize, SelectionError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(SelectionError::Empty);
    }
    let index: usize = trimmed.parse().map_err(|_| SelectionError::NotANumber {
        input: trimmed.to_owned(),
    })?;
    if index >= len {
        return Err(SelectionError::OutOfRange { index, len });
    }
    Ok(index)
}

/// Parse a comma-separated list of mission numbers (`"1, 3,4"`).
///
/// Empty items are ignored; repeated numbers are kept once, in first-seen
/// order.
///
/// # Errors
/// Returns an error if any item is invalid or nothing is selected.
pub fn parse_indices(input: &str, len: usize) -> Result<Vec<usize>, SelectionError> {
    let mut indices = Vec::new();
    for item in input.split(',').filter(|s| !s.trim().is_empty()) {
        let index = parse_index(item, len)?;
        if !indices.contains(&index) {
            indices.push(index);
        }
    }
    if indices.is_empty() {
        return Err(SelectionError::Empty);
    }
    Ok(indices)
}

/// Find a candidate by number or by file name (with or without `.miz`).
///
/// # Errors
/// Returns an error if nothing matches.
pub fn resolve<'a>(candidates: &'a [Candidate], selector: &str) -> Result<&'a Candidate, SelectionError> {
    let selector = selector.trim();
    if let Ok(index) = selector.parse::<usize>() {
        return candidates
            .get(index)
            .ok_or(SelectionError::OutOfRange {
                index,
                len: candidates.len(),
            });
    }
    candidates
        .iter()
        .find(|c| {
            c.file_name == selector || c.file_name.strip_suffix(".miz") == Some(selector)
        })
        .ok_or_else(|| SelectionError::UnknownMission {
            name: selector.to_owned(),
        })
}

// ---------------------------------------------------------------------------
// Interactive prompts
// ---------------------------------------------------------------------------

fn print_candidates<W: Write>(out: &mut W, candidates: &[Candidate]) -> std::io::Result<()> {
    for (i, c) in candidates.iter().enumerate() {
        writeln!(out, "  {i:>3}  {}", c.file_name)?;
    }
    Ok(())
}

fn read_answer<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    question: &str,
) -> Result<String, SelectionError> {
    write!(out, "{question}")?;
    out.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(SelectionError::Empty);
    }
    Ok(line)
}

/// List candidates and ask for the base mission.
///
/// # Errors
/// Returns an error on I/O failure or invalid input.
pub fn prompt_base<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    candidates: &[Candidate],
) -> Result<usize, SelectionError> {
    writeln!(out, "Missions:")?;
    print_candidates(out, candidates)?;
    let answer = read_answer(input, out, "Base mission number: ")?;
    parse_index(&answer, candidates.len())
}

/// Ask for the donor missions. The base is not a valid donor.
///
/// # Errors
/// Returns an error on I/O failure or invalid input.
pub fn prompt_donors<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    candidates: &[Candidate],
    base: usize,
) -> Result<Vec<usize>, SelectionError> {
    let answer = read_answer(input, out, "Donor mission numbers (comma separated): ")?;
    let donors: Vec<usize> = parse_indices(&answer, candidates.len())?
        .into_iter()
        .filter(|&i| i != base)
        .collect();
    if donors.is_empty() {
        return Err(SelectionError::Empty);
    }
    Ok(donors)
}
