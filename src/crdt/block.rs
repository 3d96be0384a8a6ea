// model = "claude-opus-4-5"
// created = 2026-10-19
// modified = 2026-10-19
// driver = "Isaac Clayton"

//! Blocks: the unit of storage shared by every type.
//!
//! A block is a clock-ranged run of content inserted by one replica, or a
//! deletion marker. Like the items of a YATA list, an inserted block records
//! two origins:
//! - `left_origin`: the id immediately to its left when it was created
//! - `right_origin`: the id immediately to its right when it was created
//!
//! Origins are immutable and capture the insertion context. The current
//! neighbours (`left`, `right`) are tracked separately, also by id, and change
//! as other blocks are integrated around this one.

use std::sync::Arc;

use super::primitives::DeleteSet;
use super::primitives::Id;

/// A primitive value stored in arrays and maps.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
}

impl From<bool> for Value {
    fn from(value: bool) -> Value {
        return Value::Bool(value);
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Value {
        return Value::Int(value);
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Value {
        return Value::Int(value as i64);
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Value {
        return Value::Float(value);
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Value {
        return Value::String(value.to_string());
    }
}

impl From<String> for Value {
    fn from(value: String) -> Value {
        return Value::String(value);
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Value {
        return Value::Bytes(value);
    }
}

/// The payload of a block.
#[derive(Clone, Debug, PartialEq)]
pub enum Content {
    /// A run of text; one clock unit per `char`.
    Text(String),
    /// Array elements or a single map value; one clock unit per value.
    Values(Vec<Value>),
    /// A tombstone whose payload has been reclaimed.
    Deleted(u32),
    /// A deletion marker. Occupies one clock unit and deletes its targets.
    Delete(DeleteSet),
}

impl Content {
    /// Number of clock units this content occupies.
    pub fn len(&self) -> u32 {
        match self {
            Content::Text(text) => return text.chars().count() as u32,
            Content::Values(values) => return values.len() as u32,
            Content::Deleted(len) => return *len,
            Content::Delete(_) => return 1,
        }
    }

    /// Whether this content can be placed in a sequence or map.
    #[inline]
    pub fn is_item(&self) -> bool {
        return !matches!(self, Content::Delete(_));
    }

    /// Split at `offset`, keeping `[0, offset)` and returning the rest.
    ///
    /// Deletion markers are a single unit and never split.
    pub(crate) fn split(&mut self, offset: u32) -> Content {
        match self {
            Content::Text(text) => {
                let byte = char_to_byte(text, offset);
                return Content::Text(text.split_off(byte));
            }
            Content::Values(values) => {
                return Content::Values(values.split_off(offset as usize));
            }
            Content::Deleted(len) => {
                let right = *len - offset;
                *len = offset;
                return Content::Deleted(right);
            }
            Content::Delete(_) => {
                debug_assert!(false, "deletion markers cannot be split");
                return Content::Deleted(0);
            }
        }
    }

    /// Copy of the content from `offset` to the end.
    pub(crate) fn slice_from(&self, offset: u32) -> Content {
        match self {
            Content::Text(text) => {
                let byte = char_to_byte(text, offset);
                return Content::Text(text[byte..].to_string());
            }
            Content::Values(values) => {
                return Content::Values(values[offset as usize..].to_vec());
            }
            Content::Deleted(len) => return Content::Deleted(*len - offset),
            Content::Delete(ds) => return Content::Delete(ds.clone()),
        }
    }
}

/// Byte offset of the `offset`-th char, or the string length.
fn char_to_byte(text: &str, offset: u32) -> usize {
    return text
        .char_indices()
        .nth(offset as usize)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
}

/// A block in the store.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    /// Id of the first clock unit.
    pub id: Id,
    /// Number of clock units.
    pub len: u32,

    /// What was to the left at creation. None means the start.
    pub left_origin: Option<Id>,
    /// What was to the right at creation. None means the end.
    pub right_origin: Option<Id>,

    /// Name of the root type this block belongs to.
    ///
    /// Blocks received with an origin carry no parent on the wire; it is
    /// resolved from the origin during integration.
    pub parent: Option<Arc<str>>,
    /// Map key, for blocks that are map entries.
    pub key: Option<Arc<str>>,

    pub content: Content,
    /// Whether this block is a tombstone.
    pub deleted: bool,

    /// Current left neighbour (start id of its block).
    pub(crate) left: Option<Id>,
    /// Current right neighbour (start id of its block).
    pub(crate) right: Option<Id>,
}

impl Block {
    /// Create an unlinked block. The length is taken from the content.
    pub fn new(
        id: Id,
        left_origin: Option<Id>,
        right_origin: Option<Id>,
        parent: Option<Arc<str>>,
        key: Option<Arc<str>>,
        content: Content,
    ) -> Block {
        let len = content.len();
        return Block {
            id,
            len,
            left_origin,
            right_origin,
            parent,
            key,
            content,
            deleted: false,
            left: None,
            right: None,
        };
    }

    /// A deletion marker for the given targets.
    pub fn delete_marker(id: Id, targets: DeleteSet) -> Block {
        return Block::new(id, None, None, None, None, Content::Delete(targets));
    }

    /// One past the last clock of this block.
    #[inline]
    pub fn end(&self) -> u32 {
        return self.id.clock + self.len;
    }

    /// Id of the last clock unit.
    #[inline]
    pub fn last_id(&self) -> Id {
        return Id::new(self.id.replica, self.id.clock + self.len - 1);
    }

    /// Whether this block covers `id`.
    #[inline]
    pub fn contains(&self, id: &Id) -> bool {
        return self.id.replica == id.replica && id.clock >= self.id.clock && id.clock < self.end();
    }

    /// Visible length: 0 for tombstones and markers, otherwise `len`.
    #[inline]
    pub fn visible_len(&self) -> u32 {
        if self.deleted || !self.content.is_item() {
            return 0;
        }
        return self.len;
    }

    /// Whether this block is an entry of a sequence (text or array).
    #[inline]
    pub fn is_sequence_item(&self) -> bool {
        return self.content.is_item() && self.key.is_none();
    }

    /// Split at `offset`, returning the right part.
    ///
    /// After split:
    /// - self covers `[0, offset)`
    /// - the returned block covers `[offset, len)`
    ///
    /// The right part's left origin becomes the last unit of the left part;
    /// both keep the original right origin. Neighbour links are the caller's
    /// job.
    pub(crate) fn split(&mut self, offset: u32) -> Block {
        debug_assert!(offset > 0 && offset < self.len);

        let right = Block {
            id: Id::new(self.id.replica, self.id.clock + offset),
            len: self.len - offset,
            left_origin: Some(Id::new(self.id.replica, self.id.clock + offset - 1)),
            right_origin: self.right_origin,
            parent: self.parent.clone(),
            key: self.key.clone(),
            content: self.content.split(offset),
            deleted: self.deleted,
            left: Some(self.id),
            right: self.right,
        };

        self.len = offset;
        self.right = Some(right.id);

        return right;
    }

    /// The wire form of this block, starting `offset` units in.
    ///
    /// Neighbour links are dropped, and the parent and key are omitted when
    /// an origin is present since the receiver resolves them from it.
    pub(crate) fn to_wire(&self, offset: u32) -> Block {
        let (id, left_origin, content) = if offset == 0 {
            (self.id, self.left_origin, self.content.clone())
        } else {
            (
                Id::new(self.id.replica, self.id.clock + offset),
                Some(Id::new(self.id.replica, self.id.clock + offset - 1)),
                self.content.slice_from(offset),
            )
        };
        let has_origin = left_origin.is_some() || self.right_origin.is_some();
        return Block {
            id,
            len: self.len - offset,
            left_origin,
            right_origin: self.right_origin,
            parent: if has_origin { None } else { self.parent.clone() },
            key: if has_origin { None } else { self.key.clone() },
            content,
            deleted: self.deleted,
            left: None,
            right: None,
        };
    }
}
