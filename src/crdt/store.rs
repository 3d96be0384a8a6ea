// model = "claude-opus-4-5"
// created = 2026-10-19
// modified = 2026-10-19
// driver = "Isaac Clayton"

//! The block store: per-replica append-only columns of blocks.
//!
//! Each replica has a column of blocks in increasing, contiguous clock order.
//! Blocks are found by binary search on the clock, so neighbours and origins
//! are plain ids instead of pointers. Splitting a block inserts the right part
//! directly after it in the column, keeping the column sorted.

use rustc_hash::FxHashMap;

use super::block::Block;
use super::primitives::ClockRange;
use super::primitives::Id;
use super::primitives::ReplicaId;
use super::primitives::StateVector;

/// Returned when a block does not start where its replica's column ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("gap in replica {replica}: expected clock {expected}, found {found}")]
pub struct GapError {
    pub replica: ReplicaId,
    pub expected: u32,
    pub found: u32,
}

/// Owns every block of a document.
#[derive(Clone, Debug, Default)]
pub struct BlockStore {
    columns: FxHashMap<ReplicaId, Vec<Block>>,
}

impl BlockStore {
    pub fn new() -> BlockStore {
        return BlockStore {
            columns: FxHashMap::default(),
        };
    }

    /// Next clock expected from a replica.
    pub fn state(&self, replica: ReplicaId) -> u32 {
        return self
            .columns
            .get(&replica)
            .and_then(|column| column.last())
            .map(|block| block.end())
            .unwrap_or(0);
    }

    /// State of every replica with at least one block.
    pub fn state_vector(&self) -> StateVector {
        return self
            .columns
            .keys()
            .map(|&replica| (replica, self.state(replica)))
            .collect();
    }

    /// Append a block to its replica's column.
    pub fn append(&mut self, block: Block) -> Result<(), GapError> {
        let replica = block.id.replica;
        let expected = self.state(replica);
        if block.id.clock != expected || block.len == 0 {
            return Err(GapError {
                replica,
                expected,
                found: block.id.clock,
            });
        }
        self.columns.entry(replica).or_default().push(block);
        return Ok(());
    }

    /// Index of the block covering `id` within its column.
    pub fn find_index(&self, id: &Id) -> Option<usize> {
        let column = self.columns.get(&id.replica)?;
        let idx = column.partition_point(|block| block.end() <= id.clock);
        if idx < column.len() && column[idx].id.clock <= id.clock {
            return Some(idx);
        }
        return None;
    }

    /// The block covering `id`.
    pub fn get(&self, id: &Id) -> Option<&Block> {
        let idx = self.find_index(id)?;
        return self.columns.get(&id.replica).map(|column| &column[idx]);
    }

    /// The block covering `id`, mutably.
    pub fn get_mut(&mut self, id: &Id) -> Option<&mut Block> {
        let idx = self.find_index(id)?;
        return self.columns.get_mut(&id.replica).map(|column| &mut column[idx]);
    }

    /// Start id of the block covering `id`.
    #[inline]
    pub fn block_start(&self, id: &Id) -> Option<Id> {
        return self.get(id).map(|block| block.id);
    }

    /// All blocks of a replica, in clock order.
    pub fn column(&self, replica: ReplicaId) -> &[Block] {
        return self.columns.get(&replica).map(|c| c.as_slice()).unwrap_or(&[]);
    }

    pub(crate) fn column_mut(&mut self, replica: ReplicaId) -> Option<&mut Vec<Block>> {
        return self.columns.get_mut(&replica);
    }

    /// Replicas with at least one block, in ascending order.
    pub fn replicas(&self) -> Vec<ReplicaId> {
        let mut replicas: Vec<ReplicaId> = self.columns.keys().copied().collect();
        replicas.sort();
        return replicas;
    }

    /// Total number of blocks.
    pub fn block_count(&self) -> usize {
        return self.columns.values().map(|c| c.len()).sum();
    }

    /// Make sure a block starts at `id`, splitting the covering block if
    /// needed. Returns false if `id` is unknown.
    pub fn split_at(&mut self, id: Id) -> bool {
        let Some(idx) = self.find_index(&id) else {
            return false;
        };
        let Some(column) = self.columns.get_mut(&id.replica) else {
            return false;
        };
        let block = &mut column[idx];
        if block.id.clock == id.clock {
            return true;
        }
        let right = block.split(id.clock - block.id.clock);
        let right_id = right.id;
        let right_neighbour = right.right;
        column.insert(idx + 1, right);

        if let Some(neighbour) = right_neighbour {
            if let Some(block) = self.get_mut(&neighbour) {
                block.left = Some(right_id);
            }
        }
        return true;
    }

    /// Split so that a block starts at `id`; returns that block's id.
    pub fn clean_start(&mut self, id: Id) -> Option<Id> {
        if !self.split_at(id) {
            return None;
        }
        return Some(id);
    }

    /// Split so that a block ends at `id`; returns that block's start id.
    pub fn clean_end(&mut self, id: Id) -> Option<Id> {
        let block = self.get(&id)?;
        if id.clock + 1 < block.end() {
            self.split_at(Id::new(id.replica, id.clock + 1));
        }
        return self.block_start(&id);
    }

    /// Mark every item in `range` deleted, splitting at the bounds.
    ///
    /// Returns the newly deleted fragments as (start id, length). Fragments
    /// that were already deleted, deletion markers and clocks the store does
    /// not hold are skipped.
    pub fn mark_deleted(&mut self, replica: ReplicaId, range: ClockRange) -> Vec<(Id, u32)> {
        let mut deleted = Vec::new();
        let end = range.end.min(self.state(replica));
        if range.start >= end {
            return deleted;
        }
        self.split_at(Id::new(replica, range.start));
        self.split_at(Id::new(replica, end));

        let Some(mut idx) = self.find_index(&Id::new(replica, range.start)) else {
            return deleted;
        };
        let Some(column) = self.columns.get_mut(&replica) else {
            return deleted;
        };
        while idx < column.len() && column[idx].id.clock < end {
            let block = &mut column[idx];
            if !block.deleted && block.content.is_item() {
                block.deleted = true;
                deleted.push((block.id, block.len));
            }
            idx += 1;
        }
        return deleted;
    }

    /// Clear the deleted flag on every item in `range`. Only used to roll
    /// back an uncommitted transaction; returns the restored fragments.
    pub(crate) fn unmark_deleted(&mut self, replica: ReplicaId, range: ClockRange) -> Vec<(Id, u32)> {
        let mut restored = Vec::new();
        let end = range.end.min(self.state(replica));
        if range.start >= end {
            return restored;
        }
        self.split_at(Id::new(replica, range.start));
        self.split_at(Id::new(replica, end));

        let Some(mut idx) = self.find_index(&Id::new(replica, range.start)) else {
            return restored;
        };
        let Some(column) = self.columns.get_mut(&replica) else {
            return restored;
        };
        while idx < column.len() && column[idx].id.clock < end {
            let block = &mut column[idx];
            if block.deleted && block.content.is_item() {
                block.deleted = false;
                restored.push((block.id, block.len));
            }
            idx += 1;
        }
        return restored;
    }

    /// Drop every block at or above `clock`. Only used to roll back an
    /// uncommitted transaction, whose blocks always start at a block boundary.
    pub(crate) fn truncate(&mut self, replica: ReplicaId, clock: u32) {
        let Some(column) = self.columns.get_mut(&replica) else {
            return;
        };
        let keep = column.partition_point(|block| block.id.clock < clock);
        column.truncate(keep);
        if column.is_empty() {
            self.columns.remove(&replica);
        }
    }
}
