// model = "claude-opus-4-5"
// created = 2026-10-19
// modified = 2026-10-19
// driver = "Isaac Clayton"

//! Identifier types for blocks.
//!
//! # Identifier Hierarchy
//!
//! - `ReplicaId`: one per document instance, chosen at creation
//! - `Id`: a single clock unit allocated by a replica (replica, clock)
//! - `ClockRange`: a half-open run of clocks from one replica
//!
//! A block of length `n` starting at `Id { replica, clock }` owns every id in
//! `clock..clock + n`. Ids are never reused.

use std::cmp::Ordering;
use std::fmt;

/// Identifies a replica of a document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReplicaId(pub u64);

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "{}", self.0);
    }
}

impl From<u64> for ReplicaId {
    fn from(value: u64) -> ReplicaId {
        return ReplicaId(value);
    }
}

/// A unique identifier for one clock unit.
///
/// Ordered by replica first, then clock. The order only matters for
/// tie-breaking, there is no global order across replicas otherwise.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Id {
    pub replica: ReplicaId,
    pub clock: u32,
}

impl Id {
    /// Create a new identifier.
    pub fn new(replica: ReplicaId, clock: u32) -> Id {
        return Id { replica, clock };
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "{}@{}", self.replica.0, self.clock);
    }
}

impl PartialOrd for Id {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        return Some(self.cmp(other));
    }
}

impl Ord for Id {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.replica.cmp(&other.replica) {
            Ordering::Equal => self.clock.cmp(&other.clock),
            other => other,
        }
    }
}

/// A half-open range of clocks, `start..end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClockRange {
    pub start: u32,
    pub end: u32,
}

impl ClockRange {
    pub fn new(start: u32, end: u32) -> ClockRange {
        return ClockRange { start, end };
    }

    #[inline]
    pub fn len(&self) -> u32 {
        return self.end.saturating_sub(self.start);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        return self.end <= self.start;
    }

    #[inline]
    pub fn contains(&self, clock: u32) -> bool {
        return clock >= self.start && clock < self.end;
    }
}
