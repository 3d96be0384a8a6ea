// model = "claude-opus-4-5"
// created = 2026-10-19
// modified = 2026-10-19
// driver = "Isaac Clayton"

//! Transactions: the only way to change a document.
//!
//! A transaction borrows its document mutably, so at most one is open per
//! document at a time. Every change is recorded as it happens:
//! - blocks integrated, in order
//! - ranges deleted
//! - the pending queue as it was before the first apply
//!
//! `commit` folds the deletions into the document and optionally collects
//! garbage. A transaction dropped without commit undoes everything it did.

use std::sync::Arc;

use crate::crdt::block::Block;
use crate::crdt::block::Content;
use crate::crdt::block::Value;
use crate::crdt::gc;
use crate::crdt::gc::GcPolicy;
use crate::crdt::gc::GcStats;
use crate::crdt::integrate;
use crate::crdt::pending::Pending;
use crate::crdt::primitives::ClockRange;
use crate::crdt::primitives::DeleteSet;
use crate::crdt::primitives::Id;
use crate::crdt::primitives::ReplicaId;
use crate::crdt::primitives::StateVector;
use crate::doc::Doc;
use crate::error::Error;
use crate::error::Result;
use crate::types::ArrayRef;
use crate::types::MapRef;
use crate::types::TextRef;
use crate::types::TypeKind;
use crate::update::Update;

// ============================================================================
// Read access
// ============================================================================

/// Read-only access to a document's state, shared by [`Doc`] and
/// [`Transaction`].
pub trait ReadTxn {
    /// The document being read.
    fn doc(&self) -> &Doc;

    fn state_vector(&self) -> StateVector {
        return self.doc().store.state_vector();
    }

    fn encode_state_vector(&self) -> Vec<u8> {
        return self.state_vector().encode();
    }

    /// Everything this replica holds that `since` does not cover.
    fn diff(&self, since: &StateVector) -> Update {
        return Update::diff(&self.doc().store, since);
    }

    fn encode_diff(&self, since: &StateVector) -> Vec<u8> {
        return self.diff(since).encode();
    }

    /// Diff against an encoded state vector. `None` gives a full snapshot.
    fn encode_state_diff(&self, remote: Option<&[u8]>) -> Result<Vec<u8>> {
        let since = match remote {
            Some(bytes) => StateVector::decode(bytes)?,
            None => StateVector::new(),
        };
        return Ok(self.encode_diff(&since));
    }
}

// ============================================================================
// Transaction
// ============================================================================

pub struct Transaction<'doc> {
    doc: &'doc mut Doc,
    origin: Option<Vec<u8>>,
    before_state: StateVector,
    after_state: Option<StateVector>,
    delete_set: DeleteSet,
    /// (start, len) of every block integrated, in order.
    integrated: Vec<(Id, u32)>,
    /// Pending queue before the first apply.
    pending_snapshot: Option<Pending>,
    /// Root names and kinds before the first change.
    roots_snapshot: Option<Vec<(Arc<str>, Option<TypeKind>)>>,
    gc: Option<GcPolicy>,
    gc_stats: Option<GcStats>,
    committed: bool,
}

impl<'doc> Transaction<'doc> {
    pub(crate) fn new(doc: &'doc mut Doc, origin: Option<Vec<u8>>) -> Transaction<'doc> {
        let before_state = doc.store.state_vector();
        return Transaction {
            doc,
            origin,
            before_state,
            after_state: None,
            delete_set: DeleteSet::new(),
            integrated: Vec::new(),
            pending_snapshot: None,
            roots_snapshot: None,
            gc: None,
            gc_stats: None,
            committed: false,
        };
    }

    /// The origin this transaction was opened with.
    pub fn origin(&self) -> Option<&[u8]> {
        return self.origin.as_deref();
    }

    /// State vector when the transaction was opened.
    pub fn before_state(&self) -> &StateVector {
        return &self.before_state;
    }

    /// State vector at commit, or None while open.
    pub fn after_state(&self) -> Option<&StateVector> {
        return self.after_state.as_ref();
    }

    /// Ranges deleted by this transaction.
    pub fn delete_set(&self) -> &DeleteSet {
        return &self.delete_set;
    }

    /// What the collection at commit reclaimed, if one ran.
    pub fn gc_stats(&self) -> Option<GcStats> {
        return self.gc_stats;
    }

    pub fn is_committed(&self) -> bool {
        return self.committed;
    }

    pub fn replica_id(&self) -> ReplicaId {
        return self.doc.options.replica_id;
    }

    fn ensure_open(&self) -> Result<()> {
        if self.committed {
            return Err(Error::UseAfterCommit);
        }
        return Ok(());
    }

    /// Commit. Calling it again does nothing.
    pub fn commit(&mut self) {
        if self.committed {
            return;
        }
        self.committed = true;

        let doc = &mut *self.doc;
        doc.delete_set.merge(&self.delete_set);
        if let Some(policy) = self.gc.take() {
            let stats = gc::collect(&mut doc.store, &mut doc.roots, &doc.delete_set, &policy);
            self.gc_stats = Some(stats);
        }
        let after = doc.store.state_vector();

        tracing::debug!(
            replica = %doc.options.replica_id,
            blocks = self.integrated.len(),
            deleted = self.delete_set.deleted_len(),
            pending = doc.pending.len(),
            "committed transaction"
        );
        self.after_state = Some(after);
    }

    /// Undo every change made so far and close the transaction.
    pub fn abort(self) {
        // Dropping an uncommitted transaction rolls it back.
    }

    /// Collect every tombstone at commit, whether or not peers have seen the
    /// deletion.
    pub fn force_gc(&mut self) {
        self.gc = Some(GcPolicy::Unchecked);
    }

    /// Collect tombstones at commit under the given policy.
    pub fn collect_garbage(&mut self, policy: GcPolicy) {
        self.gc = Some(policy);
    }

    // ========================================================================
    // Roots
    // ========================================================================

    pub fn get_or_insert_text(&mut self, name: &str) -> Result<TextRef> {
        let name = self.bind_root(name, TypeKind::Text)?;
        return Ok(TextRef::new(name));
    }

    pub fn get_or_insert_array(&mut self, name: &str) -> Result<ArrayRef> {
        let name = self.bind_root(name, TypeKind::Array)?;
        return Ok(ArrayRef::new(name));
    }

    pub fn get_or_insert_map(&mut self, name: &str) -> Result<MapRef> {
        let name = self.bind_root(name, TypeKind::Map)?;
        return Ok(MapRef::new(name));
    }

    fn bind_root(&mut self, name: &str, kind: TypeKind) -> Result<Arc<str>> {
        self.ensure_open()?;
        self.snapshot_roots();
        return self.doc.bind_root(name, kind);
    }

    fn snapshot_roots(&mut self) {
        if self.roots_snapshot.is_none() {
            let kinds = self
                .doc
                .roots
                .iter()
                .map(|(name, branch)| (name.clone(), branch.kind))
                .collect();
            self.roots_snapshot = Some(kinds);
        }
    }

    // ========================================================================
    // Applying updates
    // ========================================================================

    /// Queue the blocks of an update and integrate everything that is ready.
    pub fn apply_update(&mut self, update: Update) -> Result<()> {
        self.ensure_open()?;
        if self.pending_snapshot.is_none() {
            self.pending_snapshot = Some(self.doc.pending.clone());
        }
        self.snapshot_roots();

        let received = update.block_count();
        for block in update.into_blocks() {
            self.doc.pending.insert(block);
        }
        let before = self.integrated.len();
        self.drain_pending();

        tracing::debug!(
            received,
            integrated = self.integrated.len() - before,
            pending = self.doc.pending.len(),
            "applied update"
        );
        return Ok(());
    }

    /// Decode and apply an encoded update. Nothing changes if decoding
    /// fails.
    pub fn apply_update_v1(&mut self, bytes: &[u8]) -> Result<()> {
        self.ensure_open()?;
        let update = Update::decode(bytes)?;
        return self.apply_update(update);
    }

    fn drain_pending(&mut self) {
        loop {
            let doc = &mut *self.doc;
            let Some(block) = doc.pending.pop_ready(&doc.store) else {
                break;
            };
            let id = block.id;
            let len = block.len;
            if let Err(err) = doc.store.append(block) {
                // Ready blocks always start at the store's state.
                tracing::warn!(%err, "dropping block that no longer fits");
                continue;
            }
            self.integrate(id, len);
        }
    }

    fn integrate(&mut self, id: Id, len: u32) {
        let doc = &mut *self.doc;
        let deletions = integrate::integrate(&mut doc.store, &mut doc.roots, id);
        for (at, n) in deletions {
            self.delete_set.insert_id(at, n);
        }
        self.integrated.push((id, len));
    }

    // ========================================================================
    // Local edits
    // ========================================================================

    /// Append a locally created block and integrate it.
    fn push_local(&mut self, block: Block) -> Result<()> {
        self.snapshot_roots();
        let id = block.id;
        let len = block.len;
        self.doc.store.append(block)?;
        self.integrate(id, len);
        return Ok(());
    }

    fn next_id(&self) -> Id {
        let replica = self.doc.options.replica_id;
        return Id::new(replica, self.doc.store.state(replica));
    }

    fn sequence_len(&self, name: &str) -> u32 {
        return self.doc.roots.get(name).map(|b| b.len).unwrap_or(0);
    }

    /// Insert content at a visible index of a sequence root.
    pub(crate) fn insert_sequence(&mut self, name: &Arc<str>, index: u32, content: Content) -> Result<()> {
        self.ensure_open()?;
        let len = self.sequence_len(name);
        if index > len {
            return Err(Error::InvalidIndex { index, len });
        }
        if content.len() == 0 {
            return Ok(());
        }

        let (left_origin, right_origin) = self.find_position(name, index);
        let block = Block::new(
            self.next_id(),
            left_origin,
            right_origin,
            Some(name.clone()),
            None,
            content,
        );
        return self.push_local(block);
    }

    /// Origins for an insert at `index`: the last visible unit before it and
    /// whatever follows.
    fn find_position(&mut self, name: &str, index: u32) -> (Option<Id>, Option<Id>) {
        let doc = &mut *self.doc;
        let Some(branch) = doc.roots.get(name) else {
            return (None, None);
        };
        let mut remaining = index;
        let mut left: Option<Id> = None;
        let mut cursor = branch.start;
        while let Some(at) = cursor {
            let Some(block) = doc.store.get(&at) else {
                break;
            };
            if remaining == 0 {
                return (left, Some(block.id));
            }
            let visible = block.visible_len();
            if remaining < visible {
                let split = Id::new(block.id.replica, block.id.clock + remaining);
                doc.store.split_at(split);
                return (Some(Id::new(split.replica, split.clock - 1)), Some(split));
            }
            remaining -= visible;
            left = Some(block.last_id());
            cursor = block.right;
        }
        return (left, None);
    }

    /// Delete `len` visible units starting at `index`.
    pub(crate) fn remove_sequence(&mut self, name: &Arc<str>, index: u32, len: u32) -> Result<()> {
        self.ensure_open()?;
        let total = self.sequence_len(name);
        let end = index.checked_add(len).unwrap_or(u32::MAX);
        if index > total || end > total {
            return Err(Error::InvalidIndex { index: end.max(index), len: total });
        }
        if len == 0 {
            return Ok(());
        }

        let mut targets = DeleteSet::new();
        if let Some(branch) = self.doc.roots.get(name.as_ref()) {
            let mut position = 0u32;
            for block in branch.iter(&self.doc.store) {
                if position >= end {
                    break;
                }
                let visible = block.visible_len();
                if visible == 0 {
                    continue;
                }
                let from = index.max(position);
                let to = end.min(position + visible);
                if from < to {
                    let start = block.id.clock + (from - position);
                    targets.insert(block.id.replica, ClockRange::new(start, start + (to - from)));
                }
                position += visible;
            }
        }
        return self.push_local(Block::delete_marker(self.next_id(), targets));
    }

    pub(crate) fn map_insert(&mut self, name: &Arc<str>, key: &str, value: Value) -> Result<()> {
        self.ensure_open()?;
        let head = self.map_head(name, key).map(|block| block.last_id());
        let block = Block::new(
            self.next_id(),
            head,
            None,
            Some(name.clone()),
            Some(Arc::from(key)),
            Content::Values(vec![value]),
        );
        return self.push_local(block);
    }

    pub(crate) fn map_remove(&mut self, name: &Arc<str>, key: &str) -> Result<Option<Value>> {
        self.ensure_open()?;
        let Some(head) = self.map_head(name, key) else {
            return Ok(None);
        };
        if head.deleted {
            return Ok(None);
        }
        let previous = match &head.content {
            Content::Values(values) => values.last().cloned(),
            _ => None,
        };
        let mut targets = DeleteSet::new();
        targets.insert_id(head.id, head.len);
        self.push_local(Block::delete_marker(self.next_id(), targets))?;
        return Ok(previous);
    }

    fn map_head(&self, name: &str, key: &str) -> Option<&Block> {
        let head = self.doc.roots.get(name)?.map.get(key)?;
        return self.doc.store.get(head);
    }

    // ========================================================================
    // Rollback
    // ========================================================================

    fn rollback(&mut self) {
        let doc = &mut *self.doc;

        // Unlink in reverse so every neighbour sees the list it was linked into.
        for &(id, len) in self.integrated.iter().rev() {
            let end = id.clock + len;
            let mut fragments = Vec::new();
            let mut at = Some(id);
            while let Some(fragment) = at.and_then(|a| doc.store.get(&a)) {
                fragments.push(fragment.id);
                at = if fragment.end() < end {
                    Some(Id::new(id.replica, fragment.end()))
                } else {
                    None
                };
            }
            for fragment in fragments.into_iter().rev() {
                unlink(doc, fragment);
            }
        }

        for replica in doc.store.replicas() {
            doc.store.truncate(replica, self.before_state.get(replica));
        }

        for (replica, ranges) in self.delete_set.iter() {
            let known = self.before_state.get(replica);
            for range in ranges {
                if range.start >= known {
                    continue;
                }
                let range = ClockRange::new(range.start, range.end.min(known));
                for (at, n) in doc.store.unmark_deleted(replica, range) {
                    restore_len(doc, at, n);
                }
            }
        }

        if let Some(pending) = self.pending_snapshot.take() {
            doc.pending = pending;
        }
        if let Some(kinds) = self.roots_snapshot.take() {
            doc.roots.retain(|name, _| kinds.iter().any(|(known, _)| known == name));
            for (name, kind) in kinds {
                if let Some(branch) = doc.roots.get_mut(&name) {
                    branch.kind = kind;
                }
            }
        }

        tracing::debug!(
            replica = %doc.options.replica_id,
            blocks = self.integrated.len(),
            "rolled back transaction"
        );
        self.integrated.clear();
        self.delete_set = DeleteSet::new();
    }
}

/// Remove one integrated fragment from its list.
fn unlink(doc: &mut Doc, id: Id) {
    let Some(block) = doc.store.get(&id) else {
        return;
    };
    let (left, right) = (block.left, block.right);
    let visible = if block.is_sequence_item() { block.visible_len() } else { 0 };
    let (Some(parent), key) = (block.parent.clone(), block.key.clone()) else {
        return;
    };
    if !block.content.is_item() {
        return;
    }

    if let Some(l) = left {
        if let Some(left_block) = doc.store.get_mut(&l) {
            left_block.right = right;
        }
    }
    if let Some(r) = right {
        if let Some(right_block) = doc.store.get_mut(&r) {
            right_block.left = left;
        }
    }

    let Some(branch) = doc.roots.get_mut(&parent) else {
        return;
    };
    match key {
        Some(key) => {
            if branch.map.get(&key) == Some(&id) {
                match left {
                    Some(l) => {
                        branch.map.insert(key, l);
                    }
                    None => {
                        branch.map.remove(&key);
                    }
                }
            }
        }
        None => {
            if branch.start == Some(id) {
                branch.start = right;
            }
            branch.len = branch.len.saturating_sub(visible);
        }
    }
}

fn restore_len(doc: &mut Doc, id: Id, len: u32) {
    let Some(block) = doc.store.get(&id) else {
        return;
    };
    if !block.is_sequence_item() {
        return;
    }
    if let Some(branch) = block.parent.as_ref().and_then(|p| doc.roots.get_mut(p)) {
        branch.len += len;
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.rollback();
        }
    }
}

impl ReadTxn for Transaction<'_> {
    fn doc(&self) -> &Doc {
        return &*self.doc;
    }
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return f
            .debug_struct("Transaction")
            .field("replica", &self.doc.options.replica_id)
            .field("origin", &self.origin)
            .field("before_state", &self.before_state)
            .field("integrated", &self.integrated.len())
            .field("committed", &self.committed)
            .finish();
    }
}
