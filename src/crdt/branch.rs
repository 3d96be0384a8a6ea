// model = "claude-opus-4-5"
// created = 2026-10-19
// modified = 2026-10-19
// driver = "Isaac Clayton"

//! Root branches: the per-name entry points into the block store.
//!
//! A branch owns no blocks. It only remembers where its sequence starts,
//! the head entry of each map key, and the visible sequence length so that
//! index bounds can be checked without a walk.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::primitives::Id;
use super::store::BlockStore;
use crate::types::TypeKind;

/// State of one named root type.
#[derive(Clone, Debug)]
pub struct Branch {
    pub name: Arc<str>,
    /// None until a local accessor binds the name to a kind.
    pub kind: Option<TypeKind>,
    /// First block of the sequence.
    pub start: Option<Id>,
    /// Rightmost (winning) entry for each map key.
    pub map: BTreeMap<Arc<str>, Id>,
    /// Visible length of the sequence.
    pub len: u32,
}

impl Branch {
    pub fn new(name: Arc<str>) -> Branch {
        return Branch {
            name,
            kind: None,
            start: None,
            map: BTreeMap::new(),
            len: 0,
        };
    }

    /// Iterate over the sequence blocks in document order, tombstones
    /// included.
    pub fn iter<'a>(&self, store: &'a BlockStore) -> SequenceIter<'a> {
        return SequenceIter {
            store,
            next: self.start,
        };
    }
}

/// Walks the `right` links of a sequence.
pub struct SequenceIter<'a> {
    store: &'a BlockStore,
    next: Option<Id>,
}

impl<'a> Iterator for SequenceIter<'a> {
    type Item = &'a crate::crdt::block::Block;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        let block = self.store.get(&id)?;
        self.next = block.right;
        return Some(block);
    }
}

/// Walk left from a map head to the oldest entry of its key.
pub(crate) fn leftmost(store: &BlockStore, head: Id) -> Id {
    let mut current = head;
    while let Some(left) = store.get(&current).and_then(|block| block.left) {
        current = left;
    }
    return current;
}

/// Root branches by name.
pub(crate) type Roots = rustc_hash::FxHashMap<Arc<str>, Branch>;
