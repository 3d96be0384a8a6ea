// model = "claude-opus-4-5"
// created = 2026-10-19
// modified = 2026-10-19
// driver = "Isaac Clayton"

//! Collaborative maps from string keys to primitive values.
//!
//! Concurrent writes to one key resolve to the entry that sorts rightmost in
//! the key's chain. An entry written after observing another always wins
//! over it; between concurrent entries the higher replica id wins.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::crdt::block::Block;
use crate::crdt::block::Content;
use crate::crdt::block::Value;
use crate::error::Result;
use crate::transaction::ReadTxn;
use crate::transaction::Transaction;

/// Handle to a map root.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MapRef {
    name: Arc<str>,
}

impl MapRef {
    pub(crate) fn new(name: Arc<str>) -> MapRef {
        return MapRef { name };
    }

    pub fn name(&self) -> &str {
        return &self.name;
    }

    pub fn insert(&self, txn: &mut Transaction<'_>, key: &str, value: impl Into<Value>) -> Result<()> {
        return txn.map_insert(&self.name, key, value.into());
    }

    /// Remove `key`, returning its value if it was present.
    pub fn remove(&self, txn: &mut Transaction<'_>, key: &str) -> Result<Option<Value>> {
        return txn.map_remove(&self.name, key);
    }

    pub fn get<T: ReadTxn + ?Sized>(&self, txn: &T, key: &str) -> Option<Value> {
        let head = txn.doc().roots.get(self.name.as_ref())?.map.get(key)?;
        let block = txn.doc().store.get(head)?;
        return live_value(block);
    }

    pub fn contains_key<T: ReadTxn + ?Sized>(&self, txn: &T, key: &str) -> bool {
        return self.get(txn, key).is_some();
    }

    /// Live keys, in ascending order.
    pub fn keys<T: ReadTxn + ?Sized>(&self, txn: &T) -> Vec<String> {
        return self.to_map(txn).into_keys().collect();
    }

    pub fn to_map<T: ReadTxn + ?Sized>(&self, txn: &T) -> BTreeMap<String, Value> {
        let mut out = BTreeMap::new();
        let doc = txn.doc();
        let Some(branch) = doc.roots.get(self.name.as_ref()) else {
            return out;
        };
        for (key, head) in &branch.map {
            if let Some(value) = doc.store.get(head).and_then(live_value) {
                out.insert(key.to_string(), value);
            }
        }
        return out;
    }

    /// Number of live keys.
    pub fn len<T: ReadTxn + ?Sized>(&self, txn: &T) -> u32 {
        return self.to_map(txn).len() as u32;
    }

    pub fn is_empty<T: ReadTxn + ?Sized>(&self, txn: &T) -> bool {
        return self.len(txn) == 0;
    }
}

fn live_value(block: &Block) -> Option<Value> {
    if block.deleted {
        return None;
    }
    match &block.content {
        Content::Values(values) => return values.last().cloned(),
        _ => return None,
    }
}
