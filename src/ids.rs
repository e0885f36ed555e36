//! Group and unit identifier registry.
//!
//! Every group and unit in a mission carries a numeric id that must be unique
//! within the mission. [`IdRegistry`] remembers every id seen in a document
//! and hands out fresh ones for merged groups.
//!
//! Fresh ids come from a small closed range (`800..=999` by default). The
//! default strategy draws random candidates and gives up after a fixed number
//! of attempts; the sequential strategy scans the range for the first free
//! value. Both report [`AllocationError::Exhausted`] instead of returning a
//! bogus id.

use std::collections::BTreeSet;
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// IdKind
// ---------------------------------------------------------------------------

/// Which identifier space an id belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdKind {
    /// `groupId` of a group.
    Group,
    /// `unitId` of a unit.
    Unit,
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Group => write!(f, "group"),
            Self::Unit => write!(f, "unit"),
        }
    }
}

// ---------------------------------------------------------------------------
// Allocation policy
// ---------------------------------------------------------------------------

/// How candidates are picked from the range.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AllocationStrategy {
    /// Uniformly random candidates, bounded by `attempts`.
    #[default]
    Random,
    /// Lowest free value in the range.
    Sequential,
}

impl fmt::Display for AllocationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Random => write!(f, "random"),
            Self::Sequential => write!(f, "sequential"),
        }
    }
}

/// The range and retry bound used for fresh ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllocationPolicy {
    /// Smallest id handed out (inclusive).
    pub min: i64,
    /// Largest id handed out (inclusive).
    pub max: i64,
    /// Number of random draws before giving up.
    pub attempts: u32,
    pub strategy: AllocationStrategy,
}

impl Default for AllocationPolicy {
    fn default() -> Self {
        Self {
            min: 800,
            max: 999,
            attempts: 30,
            strategy: AllocationStrategy::Random,
        }
    }
}

/// No free id could be found.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AllocationError {
    #[error("could not find a free {kind} id between {min} and {max} after {attempts} attempts")]
    Exhausted {
        kind: IdKind,
        min: i64,
        max: i64,
        attempts: u32,
    },
}

// ---------------------------------------------------------------------------
// IdRegistry
// ---------------------------------------------------------------------------

/// The set of group and unit ids in use by one document.
///
/// Sets only grow: ids are added when observed or allocated and never
/// released.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IdRegistry {
    groups: BTreeSet<i64>,
    units: BTreeSet<i64>,
    policy: AllocationPolicy,
}

impl IdRegistry {
    /// An empty registry with the given allocation policy.
    #[must_use]
    pub fn new(policy: AllocationPolicy) -> Self {
        Self {
            groups: BTreeSet::new(),
            units: BTreeSet::new(),
            policy,
        }
    }

    /// The active policy.
    #[must_use]
    pub const fn policy(&self) -> &AllocationPolicy {
        &self.policy
    }

    fn set(&self, kind: IdKind) -> &BTreeSet<i64> {
        match kind {
            IdKind::Group => &self.groups,
            IdKind::Unit => &self.units,
        }
    }

    fn set_mut(&mut self, kind: IdKind) -> &mut BTreeSet<i64> {
        match kind {
            IdKind::Group => &mut self.groups,
            IdKind::Unit => &mut self.units,
        }
    }

    /// Mark an id as used. Returns `false` if it was already used.
    pub fn observe(&mut self, kind: IdKind, id: i64) -> bool {
        self.set_mut(kind).insert(id)
    }

    /// `true` if the id is in use.
    #[must_use]
    pub fn contains(&self, kind: IdKind, id: i64) -> bool {
        self.set(kind).contains(&id)
    }

    /// Number of ids in use.
    #[must_use]
    pub fn len(&self, kind: IdKind) -> usize {
        self.set(kind).len()
    }

    /// `true` if no id of this kind is in use.
    #[must_use]
    pub fn is_empty(&self, kind: IdKind) -> bool {
        self.set(kind).is_empty()
    }

    /// Ids of one kind, ascending.
    pub fn iter(&self, kind: IdKind) -> impl Iterator<Item = i64> + '_ {
        self.set(kind).iter().copied()
    }

    /// Pick an unused id, mark it used, and return it.
    ///
    /// # Errors
    /// Returns [`AllocationError::Exhausted`] when no free id was found within
    /// the policy's bound. The registry is unchanged in that case.
    pub fn allocate<R: Rng>(
        &mut self,
        kind: IdKind,
        rng: &mut R,
    ) -> Result<i64, AllocationError> {
        let AllocationPolicy {
            min,
            max,
            attempts,
            strategy,
        } = self.policy;
        let used = self.set(kind);
        let found = match strategy {
            AllocationStrategy::Random if min <= max => (0..attempts)
                .map(|_| rng.random_range(min..=max))
                .find(|candidate| !used.contains(candidate)),
            AllocationStrategy::Random => None,
            AllocationStrategy::Sequential => (min..=max).find(|candidate| !used.contains(candidate)),
        };
        let Some(id) = found else {
            return Err(AllocationError::Exhausted {
                kind,
                min,
                max,
                attempts,
            });
        };
        self.set_mut(kind).insert(id);
        Ok(id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
