// model = "claude-opus-4-5"
// created = 2026-10-19
// modified = 2026-10-19
// driver = "Isaac Clayton"

//! Collaborative arrays of primitive values.

use std::sync::Arc;

use crate::crdt::block::Content;
use crate::crdt::block::Value;
use crate::error::Result;
use crate::transaction::ReadTxn;
use crate::transaction::Transaction;

/// Handle to an array root.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArrayRef {
    name: Arc<str>,
}

impl ArrayRef {
    pub(crate) fn new(name: Arc<str>) -> ArrayRef {
        return ArrayRef { name };
    }

    pub fn name(&self) -> &str {
        return &self.name;
    }

    /// Insert one value at `index`.
    pub fn insert(&self, txn: &mut Transaction<'_>, index: u32, value: impl Into<Value>) -> Result<()> {
        return self.insert_range(txn, index, vec![value.into()]);
    }

    /// Insert several values starting at `index`, as one block.
    pub fn insert_range(&self, txn: &mut Transaction<'_>, index: u32, values: Vec<Value>) -> Result<()> {
        return txn.insert_sequence(&self.name, index, Content::Values(values));
    }

    pub fn push_back(&self, txn: &mut Transaction<'_>, value: impl Into<Value>) -> Result<()> {
        let len = self.len(&*txn);
        return self.insert(txn, len, value);
    }

    pub fn remove_range(&self, txn: &mut Transaction<'_>, index: u32, len: u32) -> Result<()> {
        return txn.remove_sequence(&self.name, index, len);
    }

    pub fn get<T: ReadTxn + ?Sized>(&self, txn: &T, index: u32) -> Option<Value> {
        let mut remaining = index;
        for block in super::visible(txn, &self.name) {
            if remaining < block.len {
                if let Content::Values(values) = &block.content {
                    return values.get(remaining as usize).cloned();
                }
                return None;
            }
            remaining -= block.len;
        }
        return None;
    }

    pub fn to_vec<T: ReadTxn + ?Sized>(&self, txn: &T) -> Vec<Value> {
        let mut out = Vec::new();
        for block in super::visible(txn, &self.name) {
            if let Content::Values(values) = &block.content {
                out.extend(values.iter().cloned());
            }
        }
        return out;
    }

    pub fn len<T: ReadTxn + ?Sized>(&self, txn: &T) -> u32 {
        return super::sequence_len(txn, &self.name);
    }

    pub fn is_empty<T: ReadTxn + ?Sized>(&self, txn: &T) -> bool {
        return self.len(txn) == 0;
    }
}
