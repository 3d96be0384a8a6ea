// model = "claude-opus-4-5"
// created = "2026-01-30"
// modified = "2026-10-19"
// driver = "Isaac Clayton"

//! The block store engine behind every shared type.
//!
//! - `primitives`: ids, state vectors, delete sets
//! - `block`: the storage unit and its content
//! - `store`: per-replica columns of blocks
//! - `branch`: root types and their entry points into the store
//! - `integrate`: YATA placement of new blocks
//! - `pending`: blocks waiting for their dependencies
//! - `gc`: tombstone collection

pub mod block;
pub mod branch;
pub mod gc;
pub(crate) mod integrate;
pub mod pending;
pub mod primitives;
pub mod store;
