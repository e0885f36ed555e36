//! Summaries of a merge run and of a single mission, printable as text or
//! serialized as JSON.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::document::{MissionDocument, ScanSummary};
use crate::ids::IdKind;
use crate::merge::MergedGroup;
use crate::parking::ParkingConflict;
use crate::schema;

/// A group that could not be merged; the run carried on without it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FailedMerge {
    pub name: String,
    pub reason: String,
}

/// What happened with one donor.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DonorReport {
    pub donor: PathBuf,
    pub merged: Vec<MergedGroup>,
    /// Names the recipient already had.
    pub skipped: Vec<String>,
    pub failed: Vec<FailedMerge>,
}

/// Outcome of a whole run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub base: PathBuf,
    pub output: PathBuf,
    pub donors: Vec<DonorReport>,
    /// Group ids in use by the result.
    pub group_ids: usize,
    /// Unit ids in use by the result.
    pub unit_ids: usize,
    /// Every parking collision seen in the result, including those already
    /// present in the base.
    pub parking_conflicts: Vec<ParkingConflict>,
}

impl MergeReport {
    #[must_use]
    pub fn merged_count(&self) -> usize {
        self.donors.iter().map(|d| d.merged.len()).sum()
    }

    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.donors.iter().map(|d| d.skipped.len()).sum()
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.donors.iter().map(|d| d.failed.len()).sum()
    }

    /// Units whose id changed during the run.
    #[must_use]
    pub fn renamed_count(&self) -> usize {
        self.donors
            .iter()
            .flat_map(|d| &d.merged)
            .map(|m| m.renamed_units.len())
            .sum()
    }
}

impl fmt::Display for MergeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Base:   {}", self.base.display())?;
        writeln!(f, "Output: {}", self.output.display())?;
        for donor in &self.donors {
            writeln!(f)?;
            writeln!(f, "From {}:", donor.donor.display())?;
            if donor.merged.is_empty() && donor.skipped.is_empty() && donor.failed.is_empty() {
                writeln!(f, "  nothing to merge")?;
            }
            for m in &donor.merged {
                writeln!(
                    f,
                    "  merged   {} -> {} (group id {})",
                    m.name, m.country, m.group_id
                )?;
                if m.group_id_collided
                    && let Some(old) = m.previous_group_id
                {
                    writeln!(f, "           group id {old} was taken")?;
                }
                for r in &m.renamed_units {
                    match r.old {
                        Some(old) => writeln!(f, "           unit {} id {old} -> {}", r.unit, r.new)?,
                        None => writeln!(f, "           unit {} id {}", r.unit, r.new)?,
                    }
                }
            }
            for name in &donor.skipped {
                writeln!(f, "  skipped  {name} (already present)")?;
            }
            for failed in &donor.failed {
                writeln!(f, "  FAILED   {}: {}", failed.name, failed.reason)?;
            }
        }
        writeln!(f)?;
        for c in &self.parking_conflicts {
            writeln!(
                f,
                "Parking: {} and {} share slot {} at airdrome {}",
                c.previous.name, c.current.name, c.slot, c.airdrome
            )?;
        }
        write!(
            f,
            "{} merged, {} skipped, {} failed, {} units renumbered, {} parking conflicts; \
             {} group ids and {} unit ids in use",
            self.merged_count(),
            self.skipped_count(),
            self.failed_count(),
            self.renamed_count(),
            self.parking_conflicts.len(),
            self.group_ids,
            self.unit_ids
        )
    }
}

// ---------------------------------------------------------------------------
// Single document
// ---------------------------------------------------------------------------

/// A group offered for merging.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OfferedGroup {
    pub name: String,
    pub country: String,
    pub group_id: Option<i64>,
    pub units: usize,
}

/// What the scan of one mission found.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DocumentReport {
    pub path: Option<PathBuf>,
    pub summary: ScanSummary,
    pub group_ids: usize,
    pub unit_ids: usize,
    pub occupied_slots: usize,
    pub groups: Vec<OfferedGroup>,
    pub parking_conflicts: Vec<ParkingConflict>,
}

impl DocumentReport {
    #[must_use]
    pub fn from_document(doc: &MissionDocument) -> Self {
        let groups = doc
            .index()
            .names()
            .map(|name| {
                let group = doc.group(name);
                OfferedGroup {
                    name: name.to_owned(),
                    country: doc.index().country_of(name).unwrap_or_default().to_owned(),
                    group_id: group.and_then(schema::group_id),
                    units: group.map_or(0, |g| schema::unit_tables(g).count()),
                }
            })
            .collect();
        Self {
            path: doc.source().map(Path::to_owned),
            summary: *doc.summary(),
            group_ids: doc.ids().len(IdKind::Group),
            unit_ids: doc.ids().len(IdKind::Unit),
            occupied_slots: doc.parking().occupied(),
            groups,
            parking_conflicts: doc.parking().conflicts().to_vec(),
        }
    }
}

impl fmt::Display for DocumentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(path) = &self.path {
            writeln!(f, "{}", path.display())?;
        }
        writeln!(
            f,
            "{} groups, {} units, {} group ids, {} unit ids, {} parking slots in use",
            self.summary.groups, self.summary.units, self.group_ids, self.unit_ids, self.occupied_slots
        )?;
        if self.summary.duplicate_group_ids + self.summary.duplicate_unit_ids > 0 {
            writeln!(
                f,
                "duplicate ids: {} group, {} unit",
                self.summary.duplicate_group_ids, self.summary.duplicate_unit_ids
            )?;
        }
        for c in &self.parking_conflicts {
            writeln!(
                f,
                "parking: {} and {} share slot {} at airdrome {}",
                c.previous.name, c.current.name, c.slot, c.airdrome
            )?;
        }
        write!(f, "offered groups:")?;
        if self.groups.is_empty() {
            write!(f, " none")?;
        }
        for g in &self.groups {
            write!(f, "\n  {} ({}, ", g.name, g.country)?;
            match g.group_id {
                Some(id) => write!(f, "group id {id}, ")?,
                None => write!(f, "no group id, ")?,
            }
            write!(f, "{} units)", g.units)?;
        }
        Ok(())
    }
}
