//! Moving flight groups from a donor mission into a recipient.
//!
//! A merge gives the group a fresh `groupId`, keeps every `unitId` the
//! recipient does not already use (allocating a new one otherwise), appends
//! the group to the destination country's `plane.group` table, and records
//! it in the recipient's index and parking tracker.
//!
//! Every merge is planned first against copies of the recipient's id
//! registry and allocator, with the destination resolved up front. Only a
//! complete plan is applied, so a failed merge leaves both documents as they
//! were.

use rand::rngs::StdRng;
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use crate::document::MissionDocument;
use crate::ids::{AllocationError, IdKind, IdRegistry};
use crate::index::GroupRef;
use crate::schema;
use crate::tree::{Key, Table, Value};

// ---------------------------------------------------------------------------
// Errors and outcomes
// ---------------------------------------------------------------------------

/// Why a group could not be merged.
#[derive(Debug, Error)]
pub enum MergeError {
    /// The recipient has no country with the group's country name.
    #[error("no country named {country:?} in coalition {coalition:?}")]
    MissingDestination { coalition: String, country: String },

    /// The destination country exists but its plane groups are not a table.
    #[error("country {country:?} is malformed: {reason}")]
    MalformedDestination { country: String, reason: String },

    /// No free group or unit id was left.
    #[error(transparent)]
    IdentifierExhausted(#[from] AllocationError),

    /// The group table lacks something the merge needs.
    #[error("group {name:?} is malformed: {reason}")]
    MalformedGroup { name: String, reason: String },

    /// The donor does not offer a group with this name.
    #[error("donor has no group named {name:?}")]
    GroupNotFound { name: String },
}

/// A unit whose `unitId` had to change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UnitRename {
    pub unit: String,
    /// `None` when the unit had no id at all.
    pub old: Option<i64>,
    pub new: i64,
}

/// What a successful merge did.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MergedGroup {
    pub name: String,
    pub group_id: i64,
    pub previous_group_id: Option<i64>,
    /// The previous id was already used in the recipient.
    pub group_id_collided: bool,
    pub country: String,
    /// Key of the group in the destination `plane.group` table.
    pub key: i64,
    pub units: usize,
    pub renamed_units: Vec<UnitRename>,
    /// Parking collisions the merged group caused.
    pub parking_conflicts: usize,
}

/// Result of asking for a merge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MergeOutcome {
    Merged(MergedGroup),
    /// The recipient already has a group with this name; nothing changed.
    Skipped { name: String },
}

// ---------------------------------------------------------------------------
// Group name variants
// ---------------------------------------------------------------------------

/// Default suffixes tried after each base name.
pub const DEFAULT_SUFFIXES: [&str; 7] = ["", " 1", " 2", " 3", " 4", "-1", "-2"];

/// Base group names and the suffixes appended to them.
///
/// `"Stingray"` with the default suffixes expands to `"Stingray"`,
/// `"Stingray 1"`, ..., `"Stingray-2"`. Each variant is a separate group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NameVariants {
    pub names: Vec<String>,
    pub suffixes: Vec<String>,
}

impl NameVariants {
    /// Variants of `names` using [`DEFAULT_SUFFIXES`].
    #[must_use]
    pub fn new(names: Vec<String>) -> Self {
        Self {
            names,
            suffixes: DEFAULT_SUFFIXES.map(str::to_owned).to_vec(),
        }
    }

    /// Every name with every suffix, grouped by name in configured order.
    pub fn variants(&self) -> impl Iterator<Item = String> + '_ {
        self.names
            .iter()
            .flat_map(|name| self.suffixes.iter().map(move |suffix| format!("{name}{suffix}")))
    }
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Everything a merge will change, computed without touching the document.
struct Plan {
    ids: IdRegistry,
    rng: StdRng,
    country: Key,
    key: i64,
    group_id: i64,
    unit_ids: Vec<(Key, i64)>,
    renamed: Vec<UnitRename>,
}

fn malformed(name: &str, reason: &str) -> MergeError {
    MergeError::MalformedGroup {
        name: name.to_owned(),
        reason: reason.to_owned(),
    }
}

/// `plane.group` of a country, created on demand.
fn plane_groups<'a>(tree: &'a mut Value, coalition: &str, country: &Key) -> Option<&'a mut Table> {
    let country = tree
        .as_table_mut()?
        .field_mut(schema::COALITION)?
        .as_table_mut()?
        .field_mut(coalition)?
        .as_table_mut()?
        .field_mut(schema::COUNTRY)?
        .as_table_mut()?
        .get_mut(country)?
        .as_table_mut()?;
    if country.field(schema::PLANE).is_none() {
        country.insert(schema::PLANE, Table::new());
    }
    let plane = country.field_mut(schema::PLANE)?.as_table_mut()?;
    if plane.field(schema::GROUP).is_none() {
        plane.insert(schema::GROUP, Table::new());
    }
    plane.field_mut(schema::GROUP)?.as_table_mut()
}

impl MissionDocument {
    fn plan_merge(&self, group: &Table, name: &str, country: &str) -> Result<Plan, MergeError> {
        let coalition = &self.options.coalition;
        let missing = || MergeError::MissingDestination {
            coalition: coalition.clone(),
            country: country.to_owned(),
        };
        let countries = self
            .tree
            .field(schema::COALITION)
            .and_then(|c| c.field(coalition))
            .and_then(|s| s.field(schema::COUNTRY))
            .and_then(Value::as_table)
            .ok_or_else(missing)?;
        let country_key = countries
            .find_by_field(schema::NAME, country)
            .cloned()
            .ok_or_else(missing)?;
        if let Some(plane) = countries.get(&country_key).and_then(|c| c.field(schema::PLANE)) {
            let groups_ok = match plane {
                Value::Table(t) => t.field(schema::GROUP).is_none_or(|g| g.as_table().is_some()),
                _ => false,
            };
            if !groups_ok {
                return Err(MergeError::MalformedDestination {
                    country: country.to_owned(),
                    reason: "plane.group is not a table".to_owned(),
                });
            }
        }
        let key = countries
            .get(&country_key)
            .and_then(|c| c.field(schema::PLANE))
            .and_then(|p| p.field(schema::GROUP))
            .and_then(Value::as_table)
            .map_or(Some(1), Table::next_index)
            .ok_or_else(|| MergeError::MalformedDestination {
                country: country.to_owned(),
                reason: "plane.group has no free integer key".to_owned(),
            })?;

        let units = match group.field(schema::UNITS) {
            None => None,
            Some(Value::Table(t)) => Some(t),
            Some(other) => {
                return Err(malformed(
                    name,
                    &format!("units is a {}, expected a table", other.type_name()),
                ));
            }
        };

        let mut ids = self.ids.clone();
        let mut rng = self.rng.clone();
        let group_id = ids.allocate(IdKind::Group, &mut rng)?;

        let mut unit_ids = Vec::new();
        let mut renamed = Vec::new();
        for (key, unit) in units.into_iter().flat_map(Table::tables) {
            let id = match schema::unit_id(unit) {
                Some(id) if ids.observe(IdKind::Unit, id) => id,
                old => {
                    let new = ids.allocate(IdKind::Unit, &mut rng)?;
                    renamed.push(UnitRename {
                        unit: schema::name(unit).unwrap_or("<unnamed>").to_owned(),
                        old,
                        new,
                    });
                    new
                }
            };
            unit_ids.push((key.clone(), id));
        }

        Ok(Plan {
            ids,
            rng,
            country: country_key,
            key,
            group_id,
            unit_ids,
            renamed,
        })
    }

    fn apply_merge(
        &mut self,
        mut group: Table,
        name: &str,
        country: &str,
        plan: Plan,
    ) -> Result<MergedGroup, MergeError> {
        let previous_group_id = schema::group_id(&group);
        let collided = previous_group_id.is_some_and(|old| self.ids.contains(IdKind::Group, old));
        group.insert(schema::GROUP_ID, plan.group_id);
        if let Some(units) = group.field_mut(schema::UNITS).and_then(Value::as_table_mut) {
            for (key, id) in &plan.unit_ids {
                if let Some(unit) = units.get_mut(key).and_then(Value::as_table_mut) {
                    unit.insert(schema::UNIT_ID, *id);
                }
            }
        }

        let coalition = self.options.coalition.clone();
        let groups = plane_groups(&mut self.tree, &coalition, &plan.country).ok_or_else(|| {
            MergeError::MissingDestination {
                coalition: coalition.clone(),
                country: country.to_owned(),
            }
        })?;
        let key = plan.key;
        groups.insert(key, group);

        self.ids = plan.ids;
        self.rng = plan.rng;
        let location = GroupRef {
            coalition,
            country: plan.country,
            category: schema::PLANE.to_owned(),
            group: Key::Int(key),
        };
        let parking_conflicts = location
            .resolve(&self.tree)
            .map_or(0, |g| self.parking.record(g));
        self.index.insert(name, location, country);

        for rename in &plan.renamed {
            tracing::info!(
                unit = %rename.unit,
                old = ?rename.old,
                new = rename.new,
                "unit id already taken; renumbered"
            );
        }
        if collided {
            tracing::warn!(
                group = name,
                old = ?previous_group_id,
                new = plan.group_id,
                "group id already taken; renumbered"
            );
        } else {
            tracing::debug!(
                group = name,
                old = ?previous_group_id,
                new = plan.group_id,
                "group id assigned"
            );
        }
        tracing::info!(
            group = name,
            group_id = plan.group_id,
            previous_group_id = ?previous_group_id,
            country,
            key,
            "merged group"
        );
        Ok(MergedGroup {
            name: name.to_owned(),
            group_id: plan.group_id,
            previous_group_id,
            group_id_collided: collided,
            country: country.to_owned(),
            key,
            units: plan.unit_ids.len(),
            renamed_units: plan.renamed,
            parking_conflicts,
        })
    }

    // -----------------------------------------------------------------------
    // Public merge operations
    // -----------------------------------------------------------------------

    /// Merge a detached group table into `country` of the configured
    /// coalition.
    ///
    /// # Errors
    /// Returns a [`MergeError`] if the group has no name, the country does
    /// not exist, or no free id is left. The document is unchanged then.
    pub fn merge_group(&mut self, group: Table, country: &str) -> Result<MergeOutcome, MergeError> {
        let Some(name) = schema::name(&group).map(str::to_owned) else {
            return Err(malformed("<unnamed>", "group has no name"));
        };
        if self.index.contains(&name) {
            tracing::info!(group = %name, "recipient already has this group; skipping");
            return Ok(MergeOutcome::Skipped { name });
        }
        let plan = self.plan_merge(&group, &name, country)?;
        self.apply_merge(group, &name, country, plan)
            .map(MergeOutcome::Merged)
    }

    /// Move the named group out of `donor` and into this document, under the
    /// country it belonged to in the donor.
    ///
    /// If this document already indexes a group with the same name, nothing
    /// happens and [`MergeOutcome::Skipped`] is returned.
    ///
    /// # Errors
    /// Returns a [`MergeError`] if the donor does not offer the group, the
    /// destination country is missing, or ids run out. Neither document
    /// changes in that case.
    #[instrument(skip_all, fields(group = name))]
    pub fn merge_group_from(
        &mut self,
        donor: &mut Self,
        name: &str,
    ) -> Result<MergeOutcome, MergeError> {
        if self.index.contains(name) {
            tracing::info!("recipient already has this group; skipping");
            return Ok(MergeOutcome::Skipped {
                name: name.to_owned(),
            });
        }
        let not_found = || MergeError::GroupNotFound {
            name: name.to_owned(),
        };
        let country = donor.index.country_of(name).ok_or_else(not_found)?;
        let group = donor.group(name).ok_or_else(not_found)?;
        let plan = self.plan_merge(group, name, country)?;

        let (group, country) = donor.take_group(name).ok_or_else(not_found)?;
        self.apply_merge(group, name, &country, plan)
            .map(MergeOutcome::Merged)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentOptions;
    use crate::ids::{AllocationPolicy, AllocationStrategy};
    use crate::tree::decode;

    const RECIPIENT: &str = r#"{ coalition = { blue = { country = {
        [1] = { name = "USA" },
        [2] = { name = "Germany", plane = { group = {
            [1] = { name = "Alpha", groupId = 801,
                units = { [1] = { name = "Alpha 1-1", unitId = 901 } } },
        } } },
    } } } }"#;

    const DONOR: &str = r#"{ coalition = { blue = { country = {
        [1] = { name = "Germany", plane = { group = {
            [1] = { name = "Stingray 1", groupId = 801,
                units = {
                    [1] = { name = "Stingray 1-1", unitId = 901 },
                    [2] = { name = "Stingray 1-2", unitId = 905 },
                } },
            [2] = { name = "Alpha", groupId = 802,
                units = { [1] = { name = "Alpha 1-1", unitId = 950 } } },
        } } },
        [2] = { name = "France", plane = { group = {
            [1] = { name = "Rafale", groupId = 810, units = { [1] = { unitId = 911 } } },
        } } },
        [3] = { name = "USA", plane = { group = {
            [1] = { name = "Hornet", groupId = 820, units = { [1] = { unitId = 921 } } },
        } } },
    } } } }"#;

    fn options() -> DocumentOptions {
        DocumentOptions {
            seed: Some(42),
            ..DocumentOptions::default()
        }
    }

    fn docs() -> (MissionDocument, MissionDocument) {
        (
            MissionDocument::from_text(RECIPIENT, options()).unwrap(),
            MissionDocument::from_text(DONOR, options()).unwrap(),
        )
    }

    fn merged(outcome: MergeOutcome) -> MergedGroup {
        match outcome {
            MergeOutcome::Merged(m) => m,
            MergeOutcome::Skipped { name } => panic!("{name} was skipped"),
        }
    }

    #[test]
    fn merge_renumbers_group_and_clashing_units() {
        let (mut recipient, mut donor) = docs();
        let m = merged(recipient.merge_group_from(&mut donor, "Stingray 1").unwrap());

        assert_eq!(m.previous_group_id, Some(801));
        assert!(m.group_id_collided);
        assert_ne!(m.group_id, 801);
        assert!((800..=999).contains(&m.group_id));
        assert_eq!(m.country, "Germany");
        assert_eq!(m.key, 2);
        assert_eq!(m.units, 2);
        assert_eq!(m.renamed_units.len(), 1);
        assert_eq!(m.renamed_units[0].unit, "Stingray 1-1");
        assert_eq!(m.renamed_units[0].old, Some(901));

        let group = recipient.group("Stingray 1").unwrap();
        assert_eq!(schema::group_id(group), Some(m.group_id));
        let ids: Vec<_> = schema::unit_tables(group).filter_map(schema::unit_id).collect();
        assert_eq!(ids, vec![m.renamed_units[0].new, 905]);
        assert!(recipient.ids().contains(IdKind::Unit, 905));
        assert!(recipient.ids().contains(IdKind::Group, m.group_id));
    }

    #[test]
    fn merge_moves_group_out_of_donor() {
        let (mut recipient, mut donor) = docs();
        recipient.merge_group_from(&mut donor, "Stingray 1").unwrap();
        assert!(!donor.index().contains("Stingray 1"));
        assert!(donor.group("Stingray 1").is_none());
        assert_eq!(recipient.index().country_of("Stingray 1"), Some("Germany"));
    }

    #[test]
    fn existing_name_is_skipped_without_changes() {
        let (mut recipient, mut donor) = docs();
        let tree = recipient.tree().clone();
        let ids = recipient.ids().clone();
        let outcome = recipient.merge_group_from(&mut donor, "Alpha").unwrap();
        assert_eq!(
            outcome,
            MergeOutcome::Skipped {
                name: "Alpha".to_owned()
            }
        );
        assert_eq!(recipient.tree(), &tree);
        assert_eq!(recipient.ids(), &ids);
        assert!(donor.index().contains("Alpha"));
    }

    #[test]
    fn missing_country_fails_without_changes() {
        let (mut recipient, mut donor) = docs();
        let tree = recipient.tree().clone();
        let ids = recipient.ids().clone();
        let err = recipient.merge_group_from(&mut donor, "Rafale").unwrap_err();
        assert!(
            matches!(err, MergeError::MissingDestination { ref country, .. } if country == "France")
        );
        assert_eq!(recipient.tree(), &tree);
        assert_eq!(recipient.ids(), &ids);
        assert!(donor.group("Rafale").is_some());
    }

    #[test]
    fn plane_table_is_created_on_demand() {
        let (mut recipient, mut donor) = docs();
        let m = merged(recipient.merge_group_from(&mut donor, "Hornet").unwrap());
        assert_eq!(m.country, "USA");
        assert_eq!(m.key, 1);
        let location = recipient.index().get("Hornet").unwrap();
        assert_eq!(location.country, Key::Int(1));
        assert_eq!(location.category, "plane");
    }

    #[test]
    fn free_group_id_is_not_a_collision() {
        let (mut recipient, mut donor) = docs();
        let m = merged(recipient.merge_group_from(&mut donor, "Hornet").unwrap());
        assert_eq!(m.previous_group_id, Some(820));
        assert!(!m.group_id_collided);
    }

    #[test]
    fn full_group_table_fails_without_changes() {
        let text = r#"{ coalition = { blue = { country = {
            [1] = { name = "Germany", plane = { group = {
                [9223372036854775807] = { name = "Alpha", groupId = 801,
                    units = { [1] = { name = "Alpha 1-1", unitId = 901 } } },
            } } },
        } } } }"#;
        let mut recipient = MissionDocument::from_text(text, options()).unwrap();
        let mut donor = MissionDocument::from_text(DONOR, options()).unwrap();
        let tree = recipient.tree().clone();
        let ids = recipient.ids().clone();
        let err = recipient.merge_group_from(&mut donor, "Stingray 1").unwrap_err();
        assert!(
            matches!(err, MergeError::MalformedDestination { ref country, .. } if country == "Germany")
        );
        assert_eq!(recipient.tree(), &tree);
        assert_eq!(recipient.ids(), &ids);
        assert!(donor.group("Stingray 1").is_some());
    }

    #[test]
    fn unknown_group_is_reported() {
        let (mut recipient, mut donor) = docs();
        let err = recipient.merge_group_from(&mut donor, "Nobody").unwrap_err();
        assert!(matches!(err, MergeError::GroupNotFound { .. }));
    }

    #[test]
    fn exhaustion_fails_without_changes() {
        let opts = DocumentOptions {
            ids: AllocationPolicy {
                min: 801,
                max: 801,
                attempts: 5,
                strategy: AllocationStrategy::Sequential,
            },
            ..options()
        };
        let mut recipient = MissionDocument::from_text(RECIPIENT, opts).unwrap();
        let mut donor = MissionDocument::from_text(DONOR, options()).unwrap();
        let tree = recipient.tree().clone();
        let err = recipient.merge_group_from(&mut donor, "Stingray 1").unwrap_err();
        assert!(matches!(
            err,
            MergeError::IdentifierExhausted(AllocationError::Exhausted {
                kind: IdKind::Group,
                ..
            })
        ));
        assert_eq!(recipient.tree(), &tree);
        assert!(donor.index().contains("Stingray 1"));
    }

    #[test]
    fn unit_exhaustion_also_rolls_back() {
        // room for the group id but not for the renamed unit
        let opts = DocumentOptions {
            ids: AllocationPolicy {
                min: 901,
                max: 901,
                attempts: 5,
                strategy: AllocationStrategy::Sequential,
            },
            ..options()
        };
        let mut recipient = MissionDocument::from_text(RECIPIENT, opts).unwrap();
        let mut donor = MissionDocument::from_text(DONOR, options()).unwrap();
        let ids = recipient.ids().clone();
        let err = recipient.merge_group_from(&mut donor, "Stingray 1").unwrap_err();
        assert!(matches!(
            err,
            MergeError::IdentifierExhausted(AllocationError::Exhausted {
                kind: IdKind::Unit,
                ..
            })
        ));
        assert_eq!(recipient.ids(), &ids);
    }

    #[test]
    fn merge_group_takes_a_detached_table() {
        let (mut recipient, _) = docs();
        let group = match decode(r#"{ name = "Carver", units = { [1] = { name = "Carver 1-1" } } }"#)
        {
            Ok(Value::Table(t)) => t,
            other => panic!("{other:?}"),
        };
        let m = merged(recipient.merge_group(group, "Germany").unwrap());
        assert_eq!(m.previous_group_id, None);
        assert_eq!(m.renamed_units.len(), 1);
        assert_eq!(m.renamed_units[0].old, None);
    }

    #[test]
    fn unnamed_group_is_malformed() {
        let (mut recipient, _) = docs();
        let err = recipient.merge_group(Table::new(), "Germany").unwrap_err();
        assert!(matches!(err, MergeError::MalformedGroup { .. }));
    }

    #[test]
    fn name_variants_expand_in_order() {
        let variants = NameVariants {
            names: vec!["Stingray".to_owned(), "Carver".to_owned()],
            suffixes: vec![String::new(), " 1".to_owned()],
        };
        assert_eq!(
            variants.variants().collect::<Vec<_>>(),
            vec!["Stingray", "Stingray 1", "Carver", "Carver 1"]
        );
        assert_eq!(NameVariants::new(vec!["A".to_owned()]).variants().count(), 7);
    }
}
