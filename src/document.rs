//! A decoded mission together with what the initial scan learned about it.
//!
//! Constructors decode the mission table and scan it exactly once: every
//! group and unit id is recorded in the [`IdRegistry`], plane groups of the
//! configured coalition are indexed by name, and ground-start parking slots
//! are tracked. An unscanned document is never handed out.
//!
//! [`MissionDocument::save`] consumes the document, so nothing can touch it
//! once it has been written.

use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::instrument;

use crate::archive::{self, MISSION_ENTRY};
use crate::error::DocumentError;
use crate::ids::{AllocationPolicy, IdKind, IdRegistry};
use crate::index::{GroupIndex, GroupRef};
use crate::parking::ParkingTracker;
use crate::schema;
use crate::tree::{self, Table, Value};

/// Variable name the editor assigns the mission table to.
pub const DEFAULT_VAR_NAME: &str = "mission";

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Settings that shape the scan and id allocation of a document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentOptions {
    /// Side whose plane groups are offered for merging.
    pub coalition: String,
    /// Categories scanned for groups, ids and parking.
    pub categories: Vec<String>,
    pub ids: AllocationPolicy,
    /// Seed for the id allocator; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            coalition: "blue".to_owned(),
            categories: ["vehicle", "plane", "static"].map(str::to_owned).to_vec(),
            ids: AllocationPolicy::default(),
            seed: None,
        }
    }
}

/// Counts gathered by the initial scan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub groups: usize,
    pub units: usize,
    /// Groups offered for merging.
    pub indexed: usize,
    pub duplicate_group_ids: usize,
    pub duplicate_unit_ids: usize,
}

// ---------------------------------------------------------------------------
// MissionDocument
// ---------------------------------------------------------------------------

/// One mission, decoded and scanned.
#[derive(Debug)]
pub struct MissionDocument {
    source: Option<PathBuf>,
    var_name: String,
    pub(crate) tree: Value,
    pub(crate) options: DocumentOptions,
    pub(crate) ids: IdRegistry,
    pub(crate) index: GroupIndex,
    pub(crate) parking: ParkingTracker,
    summary: ScanSummary,
    pub(crate) rng: StdRng,
}

impl MissionDocument {
    /// Build a document from an already decoded tree.
    ///
    /// # Errors
    /// Returns an error if the root is not a table or has no `coalition`
    /// table.
    pub fn from_tree(tree: Value, options: DocumentOptions) -> Result<Self, DocumentError> {
        if !matches!(tree, Value::Table(_)) {
            return Err(DocumentError::NotATable {
                found: tree.type_name(),
            });
        }
        let rng = options
            .seed
            .map_or_else(|| StdRng::from_rng(&mut rand::rng()), StdRng::seed_from_u64);
        let mut doc = Self {
            source: None,
            var_name: DEFAULT_VAR_NAME.to_owned(),
            tree,
            ids: IdRegistry::new(options.ids),
            options,
            index: GroupIndex::new(),
            parking: ParkingTracker::new(),
            summary: ScanSummary::default(),
            rng,
        };
        doc.scan()?;
        Ok(doc)
    }

    /// Decode mission text (`mission = { ... }` or a bare table) and scan it.
    ///
    /// # Errors
    /// Returns an error if the text does not decode or is not a mission.
    pub fn from_text(text: &str, options: DocumentOptions) -> Result<Self, DocumentError> {
        let (name, tree) = tree::decode_assignment(text)?;
        let mut doc = Self::from_tree(tree, options)?;
        if let Some(name) = name {
            doc.var_name = name;
        }
        Ok(doc)
    }

    /// Read the `mission` entry of a `.miz` archive and scan it.
    ///
    /// # Errors
    /// Returns an error if the archive or its mission entry cannot be read,
    /// or the mission does not decode.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path, options: DocumentOptions) -> Result<Self, DocumentError> {
        let bytes = archive::read_entry(path, MISSION_ENTRY).map_err(|source| {
            DocumentError::Archive {
                path: path.to_owned(),
                source,
            }
        })?;
        let text = String::from_utf8(bytes).map_err(|_| DocumentError::NotUtf8 {
            path: path.to_owned(),
        })?;
        let mut doc = Self::from_text(&text, options)?;
        doc.source = Some(path.to_owned());
        tracing::info!(
            groups = doc.summary.groups,
            units = doc.summary.units,
            indexed = doc.summary.indexed,
            "loaded mission"
        );
        Ok(doc)
    }

    /// Encode the mission and write it into the archive at `path`,
    /// replacing its `mission` entry.
    ///
    /// # Errors
    /// Returns an error if the archive cannot be rewritten.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn save(self, path: &Path) -> Result<(), DocumentError> {
        let text = self.to_text();
        archive::write_entry(path, MISSION_ENTRY, text.as_bytes()).map_err(|source| {
            DocumentError::Archive {
                path: path.to_owned(),
                source,
            }
        })?;
        tracing::info!(bytes = text.len(), "saved mission");
        Ok(())
    }

    /// The mission in the editor's text layout.
    #[must_use]
    pub fn to_text(&self) -> String {
        tree::encode_assignment(&self.var_name, &self.tree)
    }

    /// File the document was loaded from.
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    #[must_use]
    pub const fn tree(&self) -> &Value {
        &self.tree
    }

    #[must_use]
    pub const fn options(&self) -> &DocumentOptions {
        &self.options
    }

    /// Ids in use by the document.
    #[must_use]
    pub const fn ids(&self) -> &IdRegistry {
        &self.ids
    }

    /// Groups offered for merging.
    #[must_use]
    pub const fn index(&self) -> &GroupIndex {
        &self.index
    }

    #[must_use]
    pub const fn parking(&self) -> &ParkingTracker {
        &self.parking
    }

    /// Counts from the initial scan (not updated by merges).
    #[must_use]
    pub const fn summary(&self) -> &ScanSummary {
        &self.summary
    }

    /// The indexed group with this name.
    #[must_use]
    pub fn group(&self, name: &str) -> Option<&Table> {
        self.index.get(name)?.resolve(&self.tree)
    }

    /// Remove an indexed group from the tree and the index.
    ///
    /// Returns the group table and the name of the country it belonged to.
    /// Its ids stay recorded in the registry.
    pub fn take_group(&mut self, name: &str) -> Option<(Table, String)> {
        let (location, country) = self.index.remove(name)?;
        let group = location.detach(&mut self.tree)?;
        tracing::debug!(group = name, from = %location, "detached group");
        Some((group, country))
    }

    // -----------------------------------------------------------------------
    // Scan
    // -----------------------------------------------------------------------

    fn scan(&mut self) -> Result<(), DocumentError> {
        let Self {
            tree,
            options,
            ids,
            index,
            parking,
            summary,
            ..
        } = self;
        let coalitions = tree
            .field(schema::COALITION)
            .and_then(Value::as_table)
            .ok_or(DocumentError::MissingCoalitions)?;

        for (side_key, side) in coalitions.tables() {
            let Some(side_name) = side_key.as_str() else {
                continue;
            };
            let Some(countries) = side.field(schema::COUNTRY).and_then(Value::as_table) else {
                tracing::debug!(coalition = side_name, "coalition has no countries");
                continue;
            };
            let offered = side_name == options.coalition;
            for (country_key, country) in countries.tables() {
                let country_name = schema::name(country).unwrap_or_default();
                for category in &options.categories {
                    let Some(groups) = country
                        .field(category)
                        .and_then(|c| c.as_table())
                        .and_then(|c| c.field(schema::GROUP))
                        .and_then(Value::as_table)
                    else {
                        continue;
                    };
                    for (group_key, group) in groups.tables() {
                        summary.groups += 1;
                        observe_ids(ids, summary, group);
                        parking.record(group);

                        if !(offered && category == schema::PLANE) {
                            continue;
                        }
                        let Some(name) = schema::name(group) else {
                            tracing::debug!(country = country_name, "skipping unnamed group");
                            continue;
                        };
                        let location = GroupRef {
                            coalition: side_name.to_owned(),
                            country: country_key.clone(),
                            category: category.clone(),
                            group: group_key.clone(),
                        };
                        if let Some(previous) = index.insert(name, location, country_name) {
                            tracing::warn!(
                                group = name,
                                replaced = %previous,
                                "duplicate group name; the later group wins"
                            );
                        }
                    }
                }
            }
        }

        summary.indexed = index.len();
        tracing::info!(
            "found {} group ids and {} unit ids",
            ids.len(IdKind::Group),
            ids.len(IdKind::Unit)
        );
        Ok(())
    }
}

fn observe_ids(ids: &mut IdRegistry, summary: &mut ScanSummary, group: &Table) {
    let group_name = schema::name(group).unwrap_or("<unnamed>");
    match schema::group_id(group) {
        Some(id) if !ids.observe(IdKind::Group, id) => {
            summary.duplicate_group_ids += 1;
            tracing::warn!(group = group_name, id, "group id used more than once");
        }
        Some(_) => {}
        None => tracing::warn!(group = group_name, "group has no groupId"),
    }
    for unit in schema::unit_tables(group) {
        summary.units += 1;
        let unit_name = schema::name(unit).unwrap_or("<unnamed>");
        match schema::unit_id(unit) {
            Some(id) if !ids.observe(IdKind::Unit, id) => {
                summary.duplicate_unit_ids += 1;
                tracing::warn!(unit = unit_name, id, "unit id used more than once");
            }
            Some(_) => {}
            None => tracing::warn!(unit = unit_name, "unit has no unitId"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
