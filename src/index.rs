//! By-name index of the flight groups a document offers for merging.
//!
//! Entries are paths into the document tree ([`GroupRef`]), not borrowed
//! references, so the index can live next to the tree it points into and
//! stays valid while other parts of the tree are mutated.

use std::collections::BTreeMap;
use std::fmt;

use crate::schema;
use crate::tree::{Key, Table, Value};

// ---------------------------------------------------------------------------
// GroupRef
// ---------------------------------------------------------------------------

/// Location of a group inside a mission tree:
/// `coalition[side].country[country][category].group[group]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupRef {
    pub coalition: String,
    pub country: Key,
    pub category: String,
    pub group: Key,
}

impl GroupRef {
    fn groups<'a>(&self, root: &'a Value) -> Option<&'a Table> {
        root.field(schema::COALITION)?
            .field(&self.coalition)?
            .field(schema::COUNTRY)?
            .as_table()?
            .get(&self.country)?
            .field(&self.category)?
            .field(schema::GROUP)?
            .as_table()
    }

    fn groups_mut<'a>(&self, root: &'a mut Value) -> Option<&'a mut Table> {
        root.as_table_mut()?
            .field_mut(schema::COALITION)?
            .as_table_mut()?
            .field_mut(&self.coalition)?
            .as_table_mut()?
            .field_mut(schema::COUNTRY)?
            .as_table_mut()?
            .get_mut(&self.country)?
            .as_table_mut()?
            .field_mut(&self.category)?
            .as_table_mut()?
            .field_mut(schema::GROUP)?
            .as_table_mut()
    }

    /// The group table this path points to.
    #[must_use]
    pub fn resolve<'a>(&self, root: &'a Value) -> Option<&'a Table> {
        self.groups(root)?.get(&self.group)?.as_table()
    }

    /// Mutable access to the group table.
    pub fn resolve_mut<'a>(&self, root: &'a mut Value) -> Option<&'a mut Table> {
        self.groups_mut(root)?.get_mut(&self.group)?.as_table_mut()
    }

    /// Remove the group from the tree and return it.
    pub fn detach(&self, root: &mut Value) -> Option<Table> {
        match self.groups_mut(root)?.remove(&self.group)? {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }
}

impl fmt::Display for GroupRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "coalition.{}.country{}.{}.group{}",
            self.coalition, self.country, self.category, self.group
        )
    }
}

// ---------------------------------------------------------------------------
// GroupIndex
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
struct Entry {
    location: GroupRef,
    country: String,
}

/// Group name → location and owning country.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupIndex {
    entries: BTreeMap<String, Entry>,
}

impl GroupIndex {
    /// An empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a group. A previous entry with the same name is replaced and
    /// returned.
    pub fn insert(&mut self, name: &str, location: GroupRef, country: &str) -> Option<GroupRef> {
        self.entries
            .insert(
                name.to_owned(),
                Entry {
                    location,
                    country: country.to_owned(),
                },
            )
            .map(|e| e.location)
    }

    /// Where the named group lives.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&GroupRef> {
        self.entries.get(name).map(|e| &e.location)
    }

    /// Name of the country that owns the named group.
    #[must_use]
    pub fn country_of(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(|e| e.country.as_str())
    }

    /// `true` if a group with this name is indexed.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Drop the entry for a name, returning its location and country.
    pub fn remove(&mut self, name: &str) -> Option<(GroupRef, String)> {
        self.entries.remove(name).map(|e| (e.location, e.country))
    }

    /// Number of indexed groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Indexed names in ascending order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
