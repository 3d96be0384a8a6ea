// model = "claude-opus-4-5"
// created = 2026-10-19
// modified = 2026-10-19
// driver = "Isaac Clayton"

//! Tombstone garbage collection.
//!
//! Deleted blocks stay in the store so that concurrent inserts can still find
//! their origins. Collecting a tombstone only drops its payload: the block
//! keeps its id, length, origins and neighbours, and its content becomes
//! `Content::Deleted(len)`. Adjacent reclaimed fragments that were split from
//! the same insert are then squashed back into one block.
//!
//! A tombstone is stable for a set of peers when every peer is known to have
//! deleted it too:
//! - a block deleted by a marker, once every peer has integrated the marker
//! - an overwritten map entry, once every peer holds the entry to its right

use super::block::Block;
use super::block::Content;
use super::branch::Roots;
use super::primitives::ClockRange;
use super::primitives::DeleteSet;
use super::primitives::Id;
use super::primitives::ReplicaId;
use super::primitives::StateVector;
use super::store::BlockStore;

/// Which tombstones a collection may reclaim.
#[derive(Clone, Debug, PartialEq)]
pub enum GcPolicy {
    /// Every tombstone, whether or not peers have seen the deletion.
    /// Peers that have not may be unable to merge later updates cleanly.
    Unchecked,
    /// Only tombstones whose deletion every listed peer has integrated.
    /// With no peers listed every locally known deletion counts as stable.
    ObservedBy(Vec<StateVector>),
}

/// Totals from one collection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Clock units whose payload was dropped.
    pub reclaimed: u64,
    /// Blocks merged into a neighbour.
    pub squashed: usize,
}

/// Reclaim stable tombstones and squash the result.
pub(crate) fn collect(
    store: &mut BlockStore,
    roots: &mut Roots,
    deleted: &DeleteSet,
    policy: &GcPolicy,
) -> GcStats {
    let candidates = match policy {
        GcPolicy::Unchecked => deleted.clone(),
        GcPolicy::ObservedBy(peers) => stable(store, roots, peers),
    };

    let mut stats = GcStats::default();
    for (replica, ranges) in candidates.iter() {
        for range in ranges {
            stats.reclaimed += reclaim(store, replica, *range);
        }
    }
    stats.squashed = squash(store, roots);

    tracing::debug!(
        reclaimed = stats.reclaimed,
        squashed = stats.squashed,
        "collected garbage"
    );
    return stats;
}

fn observed(peers: &[StateVector], id: &Id) -> bool {
    return peers.iter().all(|sv| sv.contains(id));
}

/// Deleted ranges every peer is known to have deleted.
fn stable(store: &BlockStore, roots: &Roots, peers: &[StateVector]) -> DeleteSet {
    let mut out = DeleteSet::new();

    for replica in store.replicas() {
        for block in store.column(replica) {
            if let Content::Delete(targets) = &block.content {
                if observed(peers, &block.id) {
                    out.merge(targets);
                }
            }
        }
    }

    for branch in roots.values() {
        for &head in branch.map.values() {
            let mut right = head;
            let mut cursor = store.get(&head).and_then(|b| b.left);
            while let Some(id) = cursor {
                let Some(block) = store.get(&id) else {
                    break;
                };
                if block.deleted && observed(peers, &block.last_id()) && observed(peers, &right) {
                    out.insert_id(block.id, block.len);
                }
                right = block.id;
                cursor = block.left;
            }
        }
    }

    return out;
}

/// Drop the payload of every tombstone in `range`.
fn reclaim(store: &mut BlockStore, replica: ReplicaId, range: ClockRange) -> u64 {
    let end = range.end.min(store.state(replica));
    if range.start >= end {
        return 0;
    }
    store.split_at(Id::new(replica, range.start));
    store.split_at(Id::new(replica, end));

    let Some(mut idx) = store.find_index(&Id::new(replica, range.start)) else {
        return 0;
    };
    let Some(column) = store.column_mut(replica) else {
        return 0;
    };
    let mut reclaimed = 0;
    while idx < column.len() && column[idx].id.clock < end {
        let block = &mut column[idx];
        let live_payload = matches!(block.content, Content::Text(_) | Content::Values(_));
        if block.deleted && live_payload {
            block.content = Content::Deleted(block.len);
            reclaimed += block.len as u64;
        }
        idx += 1;
    }
    return reclaimed;
}

/// Whether `b` can be folded into `a`, its left neighbour in both the column
/// and the list.
fn can_squash(a: &Block, b: &Block) -> bool {
    return a.deleted
        && b.deleted
        && matches!(a.content, Content::Deleted(_))
        && matches!(b.content, Content::Deleted(_))
        && a.end() == b.id.clock
        && a.right == Some(b.id)
        && b.left_origin == Some(a.last_id())
        && a.right_origin == b.right_origin
        && a.parent == b.parent
        && a.key == b.key;
}

fn squash(store: &mut BlockStore, roots: &mut Roots) -> usize {
    let mut squashed = 0;
    for replica in store.replicas() {
        let mut i = 0;
        loop {
            let Some(column) = store.column_mut(replica) else {
                break;
            };
            if i + 1 >= column.len() {
                break;
            }
            if !can_squash(&column[i], &column[i + 1]) {
                i += 1;
                continue;
            }

            let b = column.remove(i + 1);
            let a = &mut column[i];
            a.len += b.len;
            a.content = Content::Deleted(a.len);
            a.right = b.right;
            let a_id = a.id;

            if let Some(r) = b.right {
                if let Some(right) = store.get_mut(&r) {
                    right.left = Some(a_id);
                }
            }
            if let (Some(parent), Some(key)) = (&b.parent, &b.key) {
                if let Some(branch) = roots.get_mut(parent) {
                    if branch.map.get(key) == Some(&b.id) {
                        branch.map.insert(key.clone(), a_id);
                    }
                }
            }
            squashed += 1;
        }
    }
    return squashed;
}
