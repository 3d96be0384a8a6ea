// model = "claude-opus-4-5"
// created = 2026-10-19
// modified = 2026-10-19
// driver = "Isaac Clayton"

//! Updates: the unit of synchronization between replicas.
//!
//! An update is a set of per-replica runs of clock-contiguous blocks. It is
//! produced by diffing a store against a peer's state vector and consumed by
//! `Transaction::apply_update`.
//!
//! # Wire format
//!
//! ```text
//! update  := count run*                       (runs in ascending replica order)
//! run     := replica start_clock block_count entry*
//! entry   := info len origins [parent has_key [key]] content
//! info    := tag (bits 0..3) | 0x80 left | 0x40 right | 0x20 deleted
//!            | 0x10 left is local | 0x08 right is local
//! ```
//!
//! A local origin belongs to the same replica and precedes the block, so it
//! is written as the clock distance back from the block's first clock. The
//! parent name and key are only written when the block has no origin.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::codec::Decoder;
use crate::codec::Encoder;
use crate::crdt::block::Block;
use crate::crdt::block::Content;
use crate::crdt::block::Value;
use crate::crdt::primitives::DeleteSet;
use crate::crdt::primitives::Id;
use crate::crdt::primitives::ReplicaId;
use crate::crdt::primitives::StateVector;
use crate::crdt::store::BlockStore;
use crate::error::DecodeError;

const TAG_TEXT: u8 = 1;
const TAG_VALUES: u8 = 2;
const TAG_DELETED: u8 = 3;
const TAG_DELETE: u8 = 4;
const TAG_MASK: u8 = 0x07;

const HAS_LEFT: u8 = 0x80;
const HAS_RIGHT: u8 = 0x40;
const DELETED: u8 = 0x20;
const LEFT_LOCAL: u8 = 0x10;
const RIGHT_LOCAL: u8 = 0x08;

const VALUE_NULL: u8 = 0;
const VALUE_BOOL: u8 = 1;
const VALUE_INT: u8 = 2;
const VALUE_FLOAT: u8 = 3;
const VALUE_STRING: u8 = 4;
const VALUE_BYTES: u8 = 5;

/// A set of blocks to be integrated by a peer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Update {
    /// Clock-contiguous runs of blocks, by replica.
    pub(crate) blocks: BTreeMap<ReplicaId, Vec<Block>>,
}

impl Update {
    pub fn new() -> Update {
        return Update::default();
    }

    /// Every block the store holds at or above `since`.
    pub(crate) fn diff(store: &BlockStore, since: &StateVector) -> Update {
        let mut blocks = BTreeMap::new();
        for replica in store.replicas() {
            let from = since.get(replica);
            let column = store.column(replica);
            let first = column.partition_point(|block| block.end() <= from);
            if first == column.len() {
                continue;
            }
            let run: Vec<Block> = column[first..]
                .iter()
                .map(|block| block.to_wire(from.saturating_sub(block.id.clock)))
                .collect();
            blocks.insert(replica, run);
        }
        return Update { blocks };
    }

    /// Whether the update carries no blocks.
    pub fn is_empty(&self) -> bool {
        return self.blocks.is_empty();
    }

    /// Number of blocks carried.
    pub fn block_count(&self) -> usize {
        return self.blocks.values().map(|run| run.len()).sum();
    }

    /// The clocks this update covers, as a state vector of run ends.
    pub fn state_vector(&self) -> StateVector {
        return self
            .blocks
            .iter()
            .filter_map(|(&replica, run)| run.last().map(|block| (replica, block.end())))
            .collect();
    }

    /// Iterate over every block, in replica then clock order.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> + '_ {
        return self.blocks.values().flatten();
    }

    pub(crate) fn into_blocks(self) -> impl Iterator<Item = Block> {
        return self.blocks.into_values().flatten();
    }

    // ========================================================================
    // Encoding
    // ========================================================================

    pub fn encode(&self) -> Vec<u8> {
        let mut enc = Encoder::new();
        enc.write_var_u64(self.blocks.len() as u64);
        for (replica, run) in &self.blocks {
            let start = run.first().map(|block| block.id.clock).unwrap_or(0);
            enc.write_var_u64(replica.0);
            enc.write_var_u32(start);
            enc.write_var_u64(run.len() as u64);
            for block in run {
                encode_block(&mut enc, block);
            }
        }
        return enc.into_bytes();
    }

    /// Decode an update. Fails on empty input and on trailing bytes.
    pub fn decode(bytes: &[u8]) -> Result<Update, DecodeError> {
        let mut dec = Decoder::new(bytes);
        let runs = dec.read_var_u64()?;
        let mut blocks = BTreeMap::new();
        for _ in 0..runs {
            let replica = ReplicaId(dec.read_var_u64()?);
            let mut clock = dec.read_var_u32()?;
            let count = dec.read_var_u64()?;
            if blocks.contains_key(&replica) {
                return Err(DecodeError::Malformed("duplicate replica run"));
            }
            let mut run = Vec::new();
            for _ in 0..count {
                let block = decode_block(&mut dec, Id::new(replica, clock))?;
                clock = block
                    .id
                    .clock
                    .checked_add(block.len)
                    .ok_or(DecodeError::Malformed("clock overflow"))?;
                run.push(block);
            }
            if !run.is_empty() {
                blocks.insert(replica, run);
            }
        }
        dec.finish()?;
        return Ok(Update { blocks });
    }
}

fn encode_origin(enc: &mut Encoder, origin: Id, local: bool, at: Id) {
    if local {
        enc.write_var_u32(at.clock - origin.clock);
    } else {
        enc.write_var_u64(origin.replica.0);
        enc.write_var_u32(origin.clock);
    }
}

fn is_local(origin: Option<Id>, at: Id) -> bool {
    return match origin {
        Some(o) => o.replica == at.replica && o.clock < at.clock,
        None => false,
    };
}

fn encode_block(enc: &mut Encoder, block: &Block) {
    let tag = match &block.content {
        Content::Text(_) => TAG_TEXT,
        Content::Values(_) => TAG_VALUES,
        Content::Deleted(_) => TAG_DELETED,
        Content::Delete(_) => TAG_DELETE,
    };
    let left_local = is_local(block.left_origin, block.id);
    let right_local = is_local(block.right_origin, block.id);

    let mut info = tag;
    if block.left_origin.is_some() {
        info |= HAS_LEFT;
    }
    if block.right_origin.is_some() {
        info |= HAS_RIGHT;
    }
    if block.deleted {
        info |= DELETED;
    }
    if left_local {
        info |= LEFT_LOCAL;
    }
    if right_local {
        info |= RIGHT_LOCAL;
    }
    enc.write_u8(info);
    enc.write_var_u32(block.len);

    if let Some(origin) = block.left_origin {
        encode_origin(enc, origin, left_local, block.id);
    }
    if let Some(origin) = block.right_origin {
        encode_origin(enc, origin, right_local, block.id);
    }
    if block.content.is_item() && block.left_origin.is_none() && block.right_origin.is_none() {
        enc.write_string(block.parent.as_deref().unwrap_or(""));
        match &block.key {
            Some(key) => {
                enc.write_u8(1);
                enc.write_string(key);
            }
            None => enc.write_u8(0),
        }
    }

    match &block.content {
        Content::Text(text) => enc.write_string(text),
        Content::Values(values) => {
            enc.write_var_u64(values.len() as u64);
            for value in values {
                encode_value(enc, value);
            }
        }
        Content::Deleted(_) => {}
        Content::Delete(targets) => targets.encode_into(enc),
    }
}

fn encode_value(enc: &mut Encoder, value: &Value) {
    match value {
        Value::Null => enc.write_u8(VALUE_NULL),
        Value::Bool(b) => {
            enc.write_u8(VALUE_BOOL);
            enc.write_u8(*b as u8);
        }
        Value::Int(i) => {
            enc.write_u8(VALUE_INT);
            enc.write_var_i64(*i);
        }
        Value::Float(f) => {
            enc.write_u8(VALUE_FLOAT);
            enc.write_f64(*f);
        }
        Value::String(s) => {
            enc.write_u8(VALUE_STRING);
            enc.write_string(s);
        }
        Value::Bytes(bytes) => {
            enc.write_u8(VALUE_BYTES);
            enc.write_bytes(bytes);
        }
    }
}

fn decode_origin(dec: &mut Decoder<'_>, local: bool, at: Id) -> Result<Id, DecodeError> {
    if local {
        let delta = dec.read_var_u32()?;
        if delta == 0 || delta > at.clock {
            return Err(DecodeError::Malformed("local origin out of range"));
        }
        return Ok(Id::new(at.replica, at.clock - delta));
    }
    let replica = ReplicaId(dec.read_var_u64()?);
    let clock = dec.read_var_u32()?;
    return Ok(Id::new(replica, clock));
}

fn decode_block(dec: &mut Decoder<'_>, id: Id) -> Result<Block, DecodeError> {
    let info = dec.read_u8()?;
    let tag = info & TAG_MASK;
    let len = dec.read_var_u32()?;
    if len == 0 {
        return Err(DecodeError::Malformed("zero-length block"));
    }
    if id.clock.checked_add(len).is_none() {
        return Err(DecodeError::Malformed("clock overflow"));
    }
    if info & HAS_LEFT == 0 && info & LEFT_LOCAL != 0 {
        return Err(DecodeError::Malformed("local flag without left origin"));
    }
    if info & HAS_RIGHT == 0 && info & RIGHT_LOCAL != 0 {
        return Err(DecodeError::Malformed("local flag without right origin"));
    }

    if tag == TAG_DELETE {
        if info & !TAG_MASK != 0 {
            return Err(DecodeError::Malformed("deletion marker with flags"));
        }
        if len != 1 {
            return Err(DecodeError::LengthMismatch { declared: len, actual: 1 });
        }
        let targets = DeleteSet::decode_from(dec)?;
        return Ok(Block::delete_marker(id, targets));
    }
    if !matches!(tag, TAG_TEXT | TAG_VALUES | TAG_DELETED) {
        return Err(DecodeError::UnknownContentTag(tag));
    }

    let left_origin = if info & HAS_LEFT != 0 {
        Some(decode_origin(dec, info & LEFT_LOCAL != 0, id)?)
    } else {
        None
    };
    let right_origin = if info & HAS_RIGHT != 0 {
        Some(decode_origin(dec, info & RIGHT_LOCAL != 0, id)?)
    } else {
        None
    };

    let (parent, key) = if left_origin.is_none() && right_origin.is_none() {
        let parent: Arc<str> = Arc::from(dec.read_string()?);
        let key: Option<Arc<str>> = match dec.read_u8()? {
            0 => None,
            1 => Some(Arc::from(dec.read_string()?)),
            _ => return Err(DecodeError::Malformed("invalid key flag")),
        };
        (Some(parent), key)
    } else {
        (None, None)
    };

    let content = match tag {
        TAG_TEXT => Content::Text(dec.read_string()?.to_string()),
        TAG_VALUES => {
            let count = dec.read_var_u64()?;
            if count != len as u64 {
                return Err(DecodeError::LengthMismatch {
                    declared: len,
                    actual: u32::try_from(count).unwrap_or(u32::MAX),
                });
            }
            let mut values = Vec::new();
            for _ in 0..count {
                values.push(decode_value(dec)?);
            }
            Content::Values(values)
        }
        _ => Content::Deleted(len),
    };
    let actual = content.len();
    if actual != len {
        return Err(DecodeError::LengthMismatch { declared: len, actual });
    }

    let mut block = Block::new(id, left_origin, right_origin, parent, key, content);
    block.deleted = info & DELETED != 0 || tag == TAG_DELETED;
    return Ok(block);
}

fn decode_value(dec: &mut Decoder<'_>) -> Result<Value, DecodeError> {
    let tag = dec.read_u8()?;
    let value = match tag {
        VALUE_NULL => Value::Null,
        VALUE_BOOL => match dec.read_u8()? {
            0 => Value::Bool(false),
            1 => Value::Bool(true),
            _ => return Err(DecodeError::Malformed("invalid bool")),
        },
        VALUE_INT => Value::Int(dec.read_var_i64()?),
        VALUE_FLOAT => Value::Float(dec.read_f64()?),
        VALUE_STRING => Value::String(dec.read_string()?.to_string()),
        VALUE_BYTES => Value::Bytes(dec.read_bytes()?.to_vec()),
        other => return Err(DecodeError::UnknownValueTag(other)),
    };
    return Ok(value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crdt::primitives::ClockRange;

    fn sample() -> Update {
        let a = ReplicaId(1);
        let b = ReplicaId(7);
        let mut targets = DeleteSet::new();
        targets.insert(a, ClockRange::new(1, 2));

        let mut deleted = Block::new(
            Id::new(a, 3),
            Some(Id::new(a, 2)),
            Some(Id::new(b, 0)),
            None,
            None,
            Content::Deleted(2),
        );
        deleted.deleted = true;

        let mut blocks = BTreeMap::new();
        blocks.insert(
            a,
            vec![
                Block::new(Id::new(a, 0), None, None, Some(Arc::from("doc")), None, Content::Text("hé".to_string())),
                Block::new(Id::new(a, 2), Some(Id::new(a, 1)), None, None, None, Content::Text("y".to_string())),
                deleted,
            ],
        );
        blocks.insert(
            b,
            vec![
                Block::new(
                    Id::new(b, 0),
                    None,
                    None,
                    Some(Arc::from("m")),
                    Some(Arc::from("k")),
                    Content::Values(vec![Value::Null, Value::Float(1.5), Value::Bytes(vec![1, 2])]),
                ),
                Block::delete_marker(Id::new(b, 3), targets),
            ],
        );
        return Update { blocks };
    }

    #[test]
    fn roundtrip() {
        let update = sample();
        let decoded = Update::decode(&update.encode()).unwrap();
        assert_eq!(decoded, update);
        assert_eq!(decoded.block_count(), 5);
        assert_eq!(decoded.state_vector().get(ReplicaId(1)), 5);
        assert_eq!(decoded.state_vector().get(ReplicaId(7)), 4);
    }

    #[test]
    fn local_origin_is_a_delta() {
        let mut enc = Encoder::new();
        let block = Block::new(
            Id::new(ReplicaId(300), 10),
            Some(Id::new(ReplicaId(300), 9)),
            None,
            None,
            None,
            Content::Text("z".to_string()),
        );
        encode_block(&mut enc, &block);
        let bytes = enc.into_bytes();
        assert_eq!(bytes[0], TAG_TEXT | HAS_LEFT | LEFT_LOCAL);
        assert_eq!(bytes[1], 1); // len
        assert_eq!(bytes[2], 1); // delta
    }

    #[test]
    fn empty_update() {
        let update = Update::new();
        assert_eq!(update.encode(), vec![0]);
        assert!(Update::decode(&[0]).unwrap().is_empty());
        assert_eq!(Update::decode(&[]), Err(DecodeError::UnexpectedEnd(0)));
    }

    #[test]
    fn rejects_bad_input() {
        let bytes = sample().encode();

        // Truncation anywhere fails.
        for cut in 0..bytes.len() {
            assert!(Update::decode(&bytes[..cut]).is_err(), "cut at {}", cut);
        }

        let mut trailing = bytes.clone();
        trailing.push(0);
        assert_eq!(Update::decode(&trailing), Err(DecodeError::TrailingBytes(1)));

        // one run, replica 1, clock 0, one block with tag 6
        assert_eq!(Update::decode(&[1, 1, 0, 1, 6, 1]), Err(DecodeError::UnknownContentTag(6)));
        // zero length
        assert!(matches!(Update::decode(&[1, 1, 0, 1, TAG_TEXT, 0]), Err(DecodeError::Malformed(_))));
        // local left origin at clock 0 cannot exist
        assert!(matches!(
            Update::decode(&[1, 1, 0, 1, TAG_TEXT | HAS_LEFT | LEFT_LOCAL, 1, 1, 1, b'a']),
            Err(DecodeError::Malformed(_))
        ));
        // declared length 2, text of one char
        assert_eq!(
            Update::decode(&[1, 1, 0, 1, TAG_TEXT, 2, 1, b'd', 0, 1, b'a']),
            Err(DecodeError::LengthMismatch { declared: 2, actual: 1 })
        );
    }

    #[test]
    fn huge_counts_do_not_allocate() {
        // Claims u32::MAX runs but carries none.
        let bytes = [0xff, 0xff, 0xff, 0xff, 0x0f];
        assert!(matches!(Update::decode(&bytes), Err(DecodeError::UnexpectedEnd(_))));
    }
}
