// model = "claude-opus-4-5"
// created = 2026-10-19
// modified = 2026-10-19
// driver = "Isaac Clayton"

//! Blocks received before their dependencies.
//!
//! A block waits here while its replica's column has a gap below it, or while
//! one of its origins (or, for a deletion marker, one of its targets) is not
//! yet integrated. Every apply drains the queue until no block makes progress.

use std::collections::BTreeMap;

use super::block::Block;
use super::integrate::is_ready;
use super::primitives::ReplicaId;
use super::store::BlockStore;

/// What to do with the lowest pending block of a replica.
enum Next {
    /// Fully known already.
    Drop,
    /// Can be appended and integrated now.
    Ready(Block),
    /// Still waiting.
    Wait,
}

#[derive(Clone, Debug, Default)]
pub struct Pending {
    blocks: BTreeMap<ReplicaId, BTreeMap<u32, Block>>,
}

impl Pending {
    pub fn new() -> Pending {
        return Pending::default();
    }

    /// Buffer a block. A block with the same start is replaced only by a
    /// longer one.
    pub fn insert(&mut self, block: Block) {
        let column = self.blocks.entry(block.id.replica).or_default();
        match column.get(&block.id.clock) {
            Some(existing) if existing.len >= block.len => {}
            _ => {
                column.insert(block.id.clock, block);
            }
        }
    }

    /// Take the next block that can be integrated, dropping anything the
    /// store already holds along the way. A block straddling the store's
    /// state is cut down to its unknown suffix.
    pub fn pop_ready(&mut self, store: &BlockStore) -> Option<Block> {
        let replicas: Vec<ReplicaId> = self.blocks.keys().copied().collect();
        for replica in replicas {
            loop {
                let next = match self.blocks.get(&replica).and_then(|c| c.first_key_value()) {
                    None => break,
                    Some((_, block)) => classify(store, block),
                };
                match next {
                    Next::Drop => {
                        self.pop_first(replica);
                    }
                    Next::Ready(block) => {
                        self.pop_first(replica);
                        return Some(block);
                    }
                    Next::Wait => break,
                }
            }
        }
        return None;
    }

    fn pop_first(&mut self, replica: ReplicaId) {
        if let Some(column) = self.blocks.get_mut(&replica) {
            column.pop_first();
            if column.is_empty() {
                self.blocks.remove(&replica);
            }
        }
    }

    /// Replicas with buffered blocks.
    pub fn replicas(&self) -> impl Iterator<Item = ReplicaId> + '_ {
        return self.blocks.keys().copied();
    }

    /// Buffered blocks, in replica then clock order.
    pub fn iter(&self) -> impl Iterator<Item = &Block> + '_ {
        return self.blocks.values().flat_map(|column| column.values());
    }

    /// Number of buffered blocks.
    pub fn len(&self) -> usize {
        return self.blocks.values().map(|c| c.len()).sum();
    }

    pub fn is_empty(&self) -> bool {
        return self.blocks.is_empty();
    }
}

fn classify(store: &BlockStore, block: &Block) -> Next {
    let state = store.state(block.id.replica);
    if block.end() <= state {
        return Next::Drop;
    }
    if block.id.clock > state {
        return Next::Wait;
    }
    let block = if block.id.clock < state {
        block.to_wire(state - block.id.clock)
    } else {
        block.clone()
    };
    if !is_ready(store, &block) {
        return Next::Wait;
    }
    return Next::Ready(block);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::crdt::block::Content;
    use crate::crdt::primitives::Id;

    fn text(replica: u64, clock: u32, left: Option<Id>, s: &str) -> Block {
        let parent = if left.is_none() { Some(Arc::from("t")) } else { None };
        return Block::new(
            Id::new(ReplicaId(replica), clock),
            left,
            None,
            parent,
            None,
            Content::Text(s.to_string()),
        );
    }

    #[test]
    fn waits_for_gap() {
        let store = BlockStore::new();
        let mut pending = Pending::new();
        pending.insert(text(1, 2, Some(Id::new(ReplicaId(1), 1)), "c"));
        assert!(pending.pop_ready(&store).is_none());
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn waits_for_origin_from_other_replica() {
        let mut store = BlockStore::new();
        let mut pending = Pending::new();
        pending.insert(text(2, 0, Some(Id::new(ReplicaId(1), 0)), "x"));
        assert!(pending.pop_ready(&store).is_none());

        store.append(text(1, 0, None, "a")).unwrap();
        let ready = pending.pop_ready(&store).unwrap();
        assert_eq!(ready.id, Id::new(ReplicaId(2), 0));
        assert!(pending.is_empty());
    }

    #[test]
    fn keeps_longer_duplicate() {
        let mut pending = Pending::new();
        pending.insert(text(1, 0, None, "abc"));
        pending.insert(text(1, 0, None, "a"));
        assert_eq!(pending.iter().next().unwrap().len, 3);
        pending.insert(text(1, 0, None, "abcd"));
        assert_eq!(pending.iter().next().unwrap().len, 4);
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn drops_known_and_slices_overlap() {
        let mut store = BlockStore::new();
        store.append(text(1, 0, None, "ab")).unwrap();

        let mut pending = Pending::new();
        pending.insert(text(1, 0, None, "a"));
        pending.insert(text(1, 1, Some(Id::new(ReplicaId(1), 0)), "bcd"));

        let ready = pending.pop_ready(&store).unwrap();
        assert_eq!(ready.id, Id::new(ReplicaId(1), 2));
        assert_eq!(ready.content, Content::Text("cd".to_string()));
        assert_eq!(ready.left_origin, Some(Id::new(ReplicaId(1), 1)));
        assert!(pending.is_empty());
        assert_eq!(pending.replicas().count(), 0);
    }
}
