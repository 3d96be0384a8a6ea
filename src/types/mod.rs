// model = "claude-opus-4-5"
// created = 2026-10-19
// modified = 2026-10-19
// driver = "Isaac Clayton"

//! Shared types: handles onto the named roots of a document.
//!
//! A handle is only a name. Reads take anything implementing
//! [`ReadTxn`](crate::ReadTxn), writes take a [`Transaction`](crate::Transaction).

mod array;
mod map;
mod text;

pub use array::ArrayRef;
pub use map::MapRef;
pub use text::TextRef;

use crate::crdt::block::Block;
use crate::crdt::branch::Branch;
use crate::transaction::ReadTxn;

/// The kind a root name is bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Text,
    Array,
    Map,
}

/// The branch behind a root, if any block or accessor created it.
fn branch<'a, T: ReadTxn + ?Sized>(txn: &'a T, name: &str) -> Option<&'a Branch> {
    return txn.doc().roots.get(name);
}

/// Visible sequence blocks of a root, in order.
fn visible<'a, T: ReadTxn + ?Sized>(txn: &'a T, name: &str) -> impl Iterator<Item = &'a Block> + 'a {
    let store = &txn.doc().store;
    return branch(txn, name)
        .into_iter()
        .flat_map(move |branch| branch.iter(store))
        .filter(|block| block.visible_len() > 0);
}

/// Visible length of a sequence root.
fn sequence_len<T: ReadTxn + ?Sized>(txn: &T, name: &str) -> u32 {
    return branch(txn, name).map(|branch| branch.len).unwrap_or(0);
}
