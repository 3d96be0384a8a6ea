// model = "claude-opus-4-5"
// created = 2026-10-19
// modified = 2026-10-19
// driver = "Isaac Clayton"

//! Delete sets: per-replica sets of deleted clock ranges.
//!
//! Ranges for a replica are kept sorted, disjoint and coalesced, so two delete
//! sets describing the same deletions are always structurally equal.
//!
//! Complexity:
//! - insert: O(k) where k is the number of ranges for that replica
//! - contains: O(log k)
//! - merge: O(total ranges)

use std::collections::BTreeMap;

use smallvec::SmallVec;

use crate::codec::Decoder;
use crate::codec::Encoder;
use crate::error::DecodeError;

use super::id::ClockRange;
use super::id::Id;
use super::id::ReplicaId;

type Ranges = SmallVec<[ClockRange; 2]>;

/// A set of deleted clock ranges, grouped by replica.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeleteSet {
    ranges: BTreeMap<ReplicaId, Ranges>,
}

impl DeleteSet {
    pub fn new() -> DeleteSet {
        return DeleteSet {
            ranges: BTreeMap::new(),
        };
    }

    /// Add a range, merging it with any overlapping or adjacent range.
    pub fn insert(&mut self, replica: ReplicaId, range: ClockRange) {
        if range.is_empty() {
            return;
        }
        let ranges = self.ranges.entry(replica).or_default();

        // First range that overlaps or touches the new one.
        let first = ranges.partition_point(|r| r.end < range.start);
        let mut merged = range;
        let mut last = first;
        while last < ranges.len() && ranges[last].start <= merged.end {
            merged.start = merged.start.min(ranges[last].start);
            merged.end = merged.end.max(ranges[last].end);
            last += 1;
        }
        ranges.drain(first..last);
        ranges.insert(first, merged);
    }

    /// Add a single id.
    pub fn insert_id(&mut self, id: Id, len: u32) {
        self.insert(id.replica, ClockRange::new(id.clock, id.clock + len));
    }

    /// Union with another delete set.
    pub fn merge(&mut self, other: &DeleteSet) {
        for (&replica, ranges) in &other.ranges {
            for range in ranges {
                self.insert(replica, *range);
            }
        }
    }

    /// Whether the given id is deleted.
    pub fn contains(&self, id: &Id) -> bool {
        let Some(ranges) = self.ranges.get(&id.replica) else {
            return false;
        };
        let idx = ranges.partition_point(|r| r.end <= id.clock);
        return idx < ranges.len() && ranges[idx].contains(id.clock);
    }

    /// Iterate over replicas and their sorted ranges.
    pub fn iter(&self) -> impl Iterator<Item = (ReplicaId, &[ClockRange])> + '_ {
        return self.ranges.iter().map(|(&replica, ranges)| (replica, ranges.as_slice()));
    }

    /// Ranges for one replica.
    pub fn ranges(&self, replica: ReplicaId) -> &[ClockRange] {
        return self.ranges.get(&replica).map(|r| r.as_slice()).unwrap_or(&[]);
    }

    /// Total number of deleted clocks.
    pub fn deleted_len(&self) -> u64 {
        return self
            .ranges
            .values()
            .flat_map(|ranges| ranges.iter())
            .map(|r| r.len() as u64)
            .sum();
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        return self.ranges.is_empty();
    }

    pub(crate) fn encode_into(&self, enc: &mut Encoder) {
        enc.write_var_u64(self.ranges.len() as u64);
        for (replica, ranges) in self.iter() {
            enc.write_var_u64(replica.0);
            enc.write_var_u64(ranges.len() as u64);
            for range in ranges {
                enc.write_var_u32(range.start);
                enc.write_var_u32(range.len());
            }
        }
    }

    pub(crate) fn decode_from(dec: &mut Decoder<'_>) -> Result<DeleteSet, DecodeError> {
        let mut ds = DeleteSet::new();
        let replicas = dec.read_var_u64()?;
        for _ in 0..replicas {
            let replica = ReplicaId(dec.read_var_u64()?);
            let count = dec.read_var_u64()?;
            for _ in 0..count {
                let start = dec.read_var_u32()?;
                let len = dec.read_var_u32()?;
                let end = start
                    .checked_add(len)
                    .ok_or(DecodeError::Malformed("delete range overflows the clock"))?;
                if len == 0 {
                    return Err(DecodeError::Malformed("empty delete range"));
                }
                ds.insert(replica, ClockRange::new(start, end));
            }
        }
        return Ok(ds);
    }
}
