//! Parking-slot occupancy tracking.
//!
//! Groups that start on the ground put each unit on a named parking slot of
//! an airdrome. Two units on the same slot make the mission misbehave, so the
//! tracker records every occupied slot and reports collisions. Collisions are
//! advisory: nothing is renumbered and no merge is blocked.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::schema;
use crate::tree::Table;

/// The unit occupying a slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UnitRef {
    pub name: String,
    pub unit_id: Option<i64>,
}

impl UnitRef {
    fn from_unit(unit: &Table) -> Self {
        Self {
            name: schema::name(unit).unwrap_or("<unnamed>").to_owned(),
            unit_id: schema::unit_id(unit),
        }
    }
}

/// Two units claiming the same slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ParkingConflict {
    pub airdrome: i64,
    pub slot: String,
    /// The unit that held the slot before.
    pub previous: UnitRef,
    /// The unit that now holds it.
    pub current: UnitRef,
}

/// Occupied slots per airdrome.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParkingTracker {
    slots: BTreeMap<i64, BTreeMap<String, UnitRef>>,
    conflicts: Vec<ParkingConflict>,
}

impl ParkingTracker {
    /// An empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the parking slots of a group.
    ///
    /// Only groups whose first route point names an airdrome are considered.
    /// When a slot is already held by a different unit a warning is logged,
    /// the conflict is kept for the summary, and the new unit takes the slot.
    ///
    /// Returns the number of conflicts found for this group.
    pub fn record(&mut self, group: &Table) -> usize {
        let Some(airdrome) = schema::start_airdrome(group) else {
            return 0;
        };
        let mut found = 0;
        for unit in schema::unit_tables(group) {
            let Some(slot) = schema::parking_slot(unit) else {
                continue;
            };
            let current = UnitRef::from_unit(unit);
            let occupied = self.slots.entry(airdrome).or_default();
            match occupied.insert(slot.clone(), current.clone()) {
                Some(previous) if previous != current => {
                    tracing::warn!(
                        airdrome,
                        slot = %slot,
                        unit = %current.name,
                        other = %previous.name,
                        "{} is on the same parking slot ({slot}) as {}",
                        current.name,
                        previous.name
                    );
                    self.conflicts.push(ParkingConflict {
                        airdrome,
                        slot,
                        previous,
                        current,
                    });
                    found += 1;
                }
                _ => {
                    tracing::debug!(unit = %current.name, "parking position {airdrome}/{slot}");
                }
            }
        }
        found
    }

    /// The unit on a slot, if any.
    #[must_use]
    pub fn occupant(&self, airdrome: i64, slot: &str) -> Option<&UnitRef> {
        self.slots.get(&airdrome)?.get(slot)
    }

    /// Every conflict seen so far, in detection order.
    #[must_use]
    pub fn conflicts(&self) -> &[ParkingConflict] {
        &self.conflicts
    }

    /// Total number of occupied slots across all airdromes.
    #[must_use]
    pub fn occupied(&self) -> usize {
        self.slots.values().map(BTreeMap::len).sum()
    }

    /// `true` when no slot is occupied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.occupied() == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
