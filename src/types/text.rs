// model = "claude-opus-4-5"
// created = 2026-10-19
// modified = 2026-10-19
// driver = "Isaac Clayton"

//! Collaborative text.
//!
//! Indices and lengths count Unicode scalar values (`char`s), the same unit
//! the clocks advance by.

use std::sync::Arc;

use crate::crdt::block::Content;
use crate::error::Result;
use crate::transaction::ReadTxn;
use crate::transaction::Transaction;

/// Handle to a text root.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TextRef {
    name: Arc<str>,
}

impl TextRef {
    pub(crate) fn new(name: Arc<str>) -> TextRef {
        return TextRef { name };
    }

    pub fn name(&self) -> &str {
        return &self.name;
    }

    /// Insert `chunk` so that it starts at char `index`.
    pub fn insert(&self, txn: &mut Transaction<'_>, index: u32, chunk: &str) -> Result<()> {
        return txn.insert_sequence(&self.name, index, Content::Text(chunk.to_string()));
    }

    /// Append `chunk` at the end.
    pub fn push(&self, txn: &mut Transaction<'_>, chunk: &str) -> Result<()> {
        let len = self.len(&*txn);
        return self.insert(txn, len, chunk);
    }

    /// Delete `len` chars starting at `index`.
    pub fn remove_range(&self, txn: &mut Transaction<'_>, index: u32, len: u32) -> Result<()> {
        return txn.remove_sequence(&self.name, index, len);
    }

    pub fn get_string<T: ReadTxn + ?Sized>(&self, txn: &T) -> String {
        let mut out = String::new();
        for block in super::visible(txn, &self.name) {
            if let Content::Text(text) = &block.content {
                out.push_str(text);
            }
        }
        return out;
    }

    /// Length in chars.
    pub fn len<T: ReadTxn + ?Sized>(&self, txn: &T) -> u32 {
        return super::sequence_len(txn, &self.name);
    }

    pub fn is_empty<T: ReadTxn + ?Sized>(&self, txn: &T) -> bool {
        return self.len(txn) == 0;
    }
}
