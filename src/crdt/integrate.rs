// model = "claude-opus-4-5"
// created = 2026-10-19
// modified = 2026-10-19
// driver = "Isaac Clayton"

//! Integration: placing an appended block into its parent with YATA.
//!
//! YATA (Yet Another Transformation Approach) orders concurrent inserts by
//! their dual origins. A new block is placed somewhere between the block at
//! its left origin and the block at its right origin. Everything already
//! between them is scanned once:
//!
//! 1. A block with the same left origin is a true concurrent sibling. The
//!    lower replica id goes left; if right origins also match, stop.
//! 2. A block whose left origin lies inside the scanned window was inserted
//!    into the subtree of something we already passed; skip over it unless
//!    that origin is still in the conflicting set.
//! 3. Anything else marks the end of the window.
//!
//! Map entries use the same scan within the chain of entries for their key.
//! The rightmost entry of a chain wins; everything left of it is deleted.

use rustc_hash::FxHashSet;

use super::block::Content;
use super::branch::Branch;
use super::branch::Roots;
use super::branch::leftmost;
use super::primitives::ClockRange;
use super::primitives::Id;
use super::primitives::ReplicaId;
use super::store::BlockStore;

/// Fragments deleted as a side effect, as (start id, length).
pub(crate) type Deletions = Vec<(Id, u32)>;

/// Integrate the block starting at `id`, which must already be appended to
/// the store with its dependencies present.
pub(crate) fn integrate(store: &mut BlockStore, roots: &mut Roots, id: Id) -> Deletions {
    let mut deletions = Deletions::new();
    let Some(block) = store.get(&id) else {
        return deletions;
    };

    if let Content::Delete(targets) = &block.content {
        let targets = targets.clone();
        for (replica, ranges) in targets.iter() {
            for range in ranges {
                deletions.extend(delete_range(store, roots, replica, *range));
            }
        }
        tracing::trace!(?id, "integrated deletion marker");
        return deletions;
    }

    let left_origin = block.left_origin;
    let right_origin = block.right_origin;
    let len = block.len;
    let arrived_deleted = block.deleted;
    let mut parent = block.parent.clone();
    let mut key = block.key.clone();

    // Resolve origins to block boundaries.
    let origin_left = left_origin.and_then(|o| store.clean_end(o));
    let origin_right = right_origin.and_then(|o| store.clean_start(o));

    if parent.is_none() {
        let neighbour = origin_left.or(origin_right).and_then(|n| store.get(&n));
        if let Some(neighbour) = neighbour {
            parent = neighbour.parent.clone();
            key = neighbour.key.clone();
        }
    }

    let Some(parent) = parent else {
        // The origin resolved to something that is not placed anywhere.
        tracing::warn!(?id, "block has no resolvable parent, keeping it as a tombstone");
        if let Some(block) = store.get_mut(&id) {
            block.content = Content::Deleted(len);
            block.deleted = true;
        }
        deletions.push((id, len));
        return deletions;
    };

    let branch = roots
        .entry(parent.clone())
        .or_insert_with(|| Branch::new(parent.clone()));

    let left = resolve_left(store, branch, id, &key, origin_left, origin_right, left_origin, right_origin);

    // Link between `left` and whatever currently follows it.
    let right = match left {
        Some(l) => match store.get_mut(&l) {
            Some(left_block) => {
                let right = left_block.right;
                left_block.right = Some(id);
                right
            }
            None => None,
        },
        None => match &key {
            Some(k) => branch.map.get(k).map(|&head| leftmost(store, head)),
            None => {
                let right = branch.start;
                branch.start = Some(id);
                right
            }
        },
    };

    if let Some(block) = store.get_mut(&id) {
        block.left = left;
        block.right = right;
        block.parent = Some(parent.clone());
        block.key = key.clone();
    }

    match right {
        Some(r) => {
            if let Some(right_block) = store.get_mut(&r) {
                right_block.left = Some(id);
            }
        }
        None => {
            if let Some(k) = &key {
                // New winner for this key: the previous head is overwritten.
                branch.map.insert(k.clone(), id);
                if let Some(l) = left {
                    let l_len = store.get(&l).map(|b| b.len).unwrap_or(0);
                    deletions.extend(store.mark_deleted(l.replica, ClockRange::new(l.clock, l.clock + l_len)));
                }
            }
        }
    }

    if arrived_deleted {
        deletions.push((id, len));
    } else if key.is_some() {
        if right.is_some() {
            // A newer entry already sits to the right.
            deletions.extend(store.mark_deleted(id.replica, ClockRange::new(id.clock, id.clock + len)));
        }
    } else {
        branch.len += len;
    }

    tracing::trace!(?id, ?left, ?right, "integrated block");
    return deletions;
}

/// Find the block the new one goes after.
#[allow(clippy::too_many_arguments)]
fn resolve_left(
    store: &BlockStore,
    branch: &Branch,
    id: Id,
    key: &Option<std::sync::Arc<str>>,
    origin_left: Option<Id>,
    origin_right: Option<Id>,
    left_origin: Option<Id>,
    right_origin: Option<Id>,
) -> Option<Id> {
    let needs_scan = match origin_left {
        None => match origin_right {
            None => true,
            Some(r) => store.get(&r).map(|b| b.left.is_some()).unwrap_or(false),
        },
        Some(l) => store.get(&l).map(|b| b.right) != Some(origin_right),
    };
    if !needs_scan {
        return origin_left;
    }

    let mut left = origin_left;
    let mut cursor = match origin_left {
        Some(l) => store.get(&l).and_then(|b| b.right),
        None => match key {
            Some(k) => branch.map.get(k).map(|&head| leftmost(store, head)),
            None => branch.start,
        },
    };

    let mut conflicting: FxHashSet<Id> = FxHashSet::default();
    let mut before_origin: FxHashSet<Id> = FxHashSet::default();

    while let Some(oid) = cursor {
        if Some(oid) == origin_right {
            break;
        }
        let Some(other) = store.get(&oid) else {
            break;
        };
        before_origin.insert(oid);
        conflicting.insert(oid);

        if other.left_origin == left_origin {
            // Case 1: concurrent sibling.
            if other.id.replica < id.replica {
                left = Some(oid);
                conflicting.clear();
            } else if other.right_origin == right_origin {
                break;
            }
        } else {
            // Case 2: other was inserted after something we already passed.
            let origin_block = other.left_origin.and_then(|o| store.block_start(&o));
            match origin_block {
                Some(ob) if before_origin.contains(&ob) => {
                    if !conflicting.contains(&ob) {
                        left = Some(oid);
                        conflicting.clear();
                    }
                }
                _ => break,
            }
        }
        cursor = other.right;
    }

    return left;
}

/// Delete a clock range, keeping sequence lengths in step.
pub(crate) fn delete_range(
    store: &mut BlockStore,
    roots: &mut Roots,
    replica: ReplicaId,
    range: ClockRange,
) -> Deletions {
    let fragments = store.mark_deleted(replica, range);
    for (id, len) in &fragments {
        let Some(block) = store.get(id) else {
            continue;
        };
        if !block.is_sequence_item() {
            continue;
        }
        if let Some(branch) = block.parent.as_ref().and_then(|p| roots.get_mut(p)) {
            branch.len = branch.len.saturating_sub(*len);
        }
    }
    return fragments;
}

/// Whether every dependency of `block` has been integrated.
pub(crate) fn is_ready(store: &BlockStore, block: &super::block::Block) -> bool {
    for origin in [block.left_origin, block.right_origin].into_iter().flatten() {
        if origin.clock >= store.state(origin.replica) {
            return false;
        }
    }
    if let Content::Delete(targets) = &block.content {
        for (replica, ranges) in targets.iter() {
            if let Some(last) = ranges.last() {
                if last.end > store.state(replica) {
                    return false;
                }
            }
        }
    }
    return true;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::crdt::block::Block;
    use crate::crdt::primitives::DeleteSet;

    fn id(replica: u64, clock: u32) -> Id {
        return Id::new(ReplicaId(replica), clock);
    }

    fn text(at: Id, left: Option<Id>, right: Option<Id>, s: &str) -> Block {
        return Block::new(at, left, right, Some(Arc::from("t")), None, Content::Text(s.to_string()));
    }

    fn render(store: &BlockStore, roots: &Roots) -> String {
        let Some(branch) = roots.get("t") else {
            return String::new();
        };
        let mut out = String::new();
        for block in branch.iter(store) {
            if let (false, Content::Text(s)) = (block.deleted, &block.content) {
                out.push_str(s);
            }
        }
        return out;
    }

    fn apply(store: &mut BlockStore, roots: &mut Roots, block: Block) {
        let at = block.id;
        assert!(is_ready(store, &block));
        store.append(block).unwrap();
        integrate(store, roots, at);
    }

    #[test]
    fn concurrent_inserts_at_start_lower_replica_left() {
        let cat = text(id(1, 0), None, None, "cat");
        let dog = text(id(2, 0), None, None, "dog");

        let mut s1 = BlockStore::new();
        let mut r1 = Roots::default();
        apply(&mut s1, &mut r1, cat.clone());
        apply(&mut s1, &mut r1, dog.clone());

        let mut s2 = BlockStore::new();
        let mut r2 = Roots::default();
        apply(&mut s2, &mut r2, dog);
        apply(&mut s2, &mut r2, cat);

        assert_eq!(render(&s1, &r1), "catdog");
        assert_eq!(render(&s2, &r2), "catdog");
        assert_eq!(r1["t"].len, 6);
    }

    #[test]
    fn insert_inside_block_splits_origin() {
        let mut store = BlockStore::new();
        let mut roots = Roots::default();
        apply(&mut store, &mut roots, text(id(1, 0), None, None, "ac"));
        apply(&mut store, &mut roots, text(id(2, 0), Some(id(1, 0)), Some(id(1, 1)), "b"));
        assert_eq!(render(&store, &roots), "abc");
        assert_eq!(store.column(ReplicaId(1)).len(), 2);
    }

    #[test]
    fn no_interleaving_of_concurrent_runs() {
        // Both replicas type a word after "x", one character per block.
        let base = text(id(9, 0), None, None, "x");
        let mut blocks = vec![base.clone()];
        for (replica, word) in [(1u64, "abc"), (2u64, "xyz")] {
            let mut left = id(9, 0);
            for (i, ch) in word.chars().enumerate() {
                let at = id(replica, i as u32);
                blocks.push(text(at, Some(left), None, &ch.to_string()));
                left = at;
            }
        }

        let mut forward = (BlockStore::new(), Roots::default());
        for block in &blocks {
            apply(&mut forward.0, &mut forward.1, block.clone());
        }

        // Replica 2's run first, then replica 1's.
        let mut reordered = vec![base];
        reordered.extend(blocks[4..].iter().cloned());
        reordered.extend(blocks[1..4].iter().cloned());
        let mut backward = (BlockStore::new(), Roots::default());
        for block in &reordered {
            apply(&mut backward.0, &mut backward.1, block.clone());
        }

        assert_eq!(render(&forward.0, &forward.1), "xabcxyz");
        assert_eq!(render(&backward.0, &backward.1), "xabcxyz");
    }

    #[test]
    fn map_entries_last_writer_wins() {
        let entry = |at: Id, left: Option<Id>, v: i64| {
            return Block::new(
                at,
                left,
                None,
                if left.is_none() { Some(Arc::from("m")) } else { None },
                if left.is_none() { Some(Arc::from("k")) } else { None },
                Content::Values(vec![crate::crdt::block::Value::Int(v)]),
            );
        };
        let a = entry(id(1, 0), None, 1);
        let b = entry(id(2, 0), None, 2);
        let c = entry(id(1, 1), Some(id(2, 0)), 3);

        for order in [[&a, &b, &c], [&b, &a, &c], [&b, &c, &a]] {
            let mut store = BlockStore::new();
            let mut roots = Roots::default();
            let mut pending: Vec<Block> = order.iter().map(|b| (*b).clone()).collect();
            while !pending.is_empty() {
                let idx = pending.iter().position(|b| is_ready(&store, b) && b.id.clock == store.state(b.id.replica)).unwrap();
                let block = pending.remove(idx);
                apply(&mut store, &mut roots, block);
            }
            let head = roots["m"].map["k"];
            assert_eq!(head, id(1, 1));
            assert!(!store.get(&head).unwrap().deleted);
            assert!(store.get(&id(1, 0)).unwrap().deleted);
            assert!(store.get(&id(2, 0)).unwrap().deleted);
        }
    }

    #[test]
    fn deletion_marker_updates_length() {
        let mut store = BlockStore::new();
        let mut roots = Roots::default();
        apply(&mut store, &mut roots, text(id(1, 0), None, None, "hello"));

        let mut targets = DeleteSet::new();
        targets.insert(ReplicaId(1), ClockRange::new(1, 4));
        let marker = Block::delete_marker(id(2, 0), targets);
        let at = marker.id;
        store.append(marker).unwrap();
        let deleted = integrate(&mut store, &mut roots, at);

        assert_eq!(deleted, vec![(id(1, 1), 3)]);
        assert_eq!(render(&store, &roots), "ho");
        assert_eq!(roots["t"].len, 2);
    }

    #[test]
    fn marker_waits_for_its_targets() {
        let store = BlockStore::new();
        let mut targets = DeleteSet::new();
        targets.insert(ReplicaId(1), ClockRange::new(0, 1));
        assert!(!is_ready(&store, &Block::delete_marker(id(2, 0), targets)));
    }
}
