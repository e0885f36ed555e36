//! Field names and typed accessors for the parts of a mission the merge
//! engine reads.
//!
//! Layout of the relevant sub-tree:
//!
//! ```text
//! mission
//! └── coalition
//!     └── <side>                 "blue" | "red" | "neutrals"
//!         └── country
//!             └── [i]            { name = "Germany", ... }
//!                 └── <category> "plane" | "vehicle" | "static" | ...
//!                     └── group
//!                         └── [j]    { name, groupId, units, route }
//!                             ├── units
//!                             │   └── [k]    { name, unitId, parking_id }
//!                             └── route
//!                                 └── points
//!                                     └── [1]    { airdromeId }
//! ```

use crate::tree::{Table, Value};

pub const COALITION: &str = "coalition";
pub const COUNTRY: &str = "country";
pub const GROUP: &str = "group";
pub const UNITS: &str = "units";
pub const NAME: &str = "name";
pub const GROUP_ID: &str = "groupId";
pub const UNIT_ID: &str = "unitId";
pub const ROUTE: &str = "route";
pub const POINTS: &str = "points";
pub const AIRDROME_ID: &str = "airdromeId";
pub const PARKING_ID: &str = "parking_id";

/// The category whose blue groups are indexed by name.
pub const PLANE: &str = "plane";

/// `name` of a group, unit or country.
#[must_use]
pub fn name(table: &Table) -> Option<&str> {
    table.field(NAME).and_then(Value::as_str)
}

/// `groupId` of a group.
#[must_use]
pub fn group_id(group: &Table) -> Option<i64> {
    group.field(GROUP_ID).and_then(Value::as_int)
}

/// `unitId` of a unit.
#[must_use]
pub fn unit_id(unit: &Table) -> Option<i64> {
    unit.field(UNIT_ID).and_then(Value::as_int)
}

/// The `units` table of a group.
#[must_use]
pub fn units(group: &Table) -> Option<&Table> {
    group.field(UNITS).and_then(Value::as_table)
}

/// Iterate the unit tables of a group (empty if the group has none).
pub fn unit_tables(group: &Table) -> impl Iterator<Item = &Table> {
    units(group).into_iter().flat_map(|u| u.tables().map(|(_, t)| t))
}

/// `airdromeId` of the first route point, for groups that start on the
/// ground at an airfield.
#[must_use]
pub fn start_airdrome(group: &Table) -> Option<i64> {
    group
        .field(ROUTE)?
        .field(POINTS)?
        .index(1)?
        .field(AIRDROME_ID)?
        .as_int()
}

/// `parking_id` of a unit, as text. The editor writes it as a string but
/// older files carry plain numbers.
#[must_use]
pub fn parking_slot(unit: &Table) -> Option<String> {
    match unit.field(PARKING_ID)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
