// model = "claude-opus-4-5"
// created = "2026-01-30"
// modified = "2026-10-19"
// driver = "Isaac Clayton"

//! Tandem - a block-store CRDT for collaborative documents.
//!
//! A [`Doc`] holds named shared types (text, arrays, maps). Replicas edit
//! independently and exchange updates; any two replicas that have integrated
//! the same updates hold the same content, whatever the delivery order.
//!
//! # Quick Start
//!
//! ```
//! use tandem::Doc;
//! use tandem::ReadTxn;
//! use tandem::StateVector;
//!
//! let mut alice = Doc::with_replica_id(1);
//! let mut bob = Doc::with_replica_id(2);
//!
//! let text = alice.get_or_insert_text("notes").unwrap();
//! {
//!     let mut txn = alice.transact();
//!     text.insert(&mut txn, 0, "Hello, World!").unwrap();
//!     txn.commit();
//! }
//!
//! // Bob tells Alice what he has, Alice sends back what he is missing.
//! let bob_state = StateVector::decode(&bob.encode_state_vector()).unwrap();
//! let update = alice.encode_diff(&bob_state);
//! bob.apply_update(&update).unwrap();
//!
//! let text = bob.get_or_insert_text("notes").unwrap();
//! assert_eq!(text.get_string(&bob), "Hello, World!");
//! ```

pub mod codec;
pub mod crdt;
pub mod doc;
pub mod error;
pub mod options;
pub mod transaction;
pub mod types;
pub mod update;

pub use crdt::block::Value;
pub use crdt::gc::GcPolicy;
pub use crdt::gc::GcStats;
pub use crdt::primitives::ClockRange;
pub use crdt::primitives::DeleteSet;
pub use crdt::primitives::Id;
pub use crdt::primitives::ReplicaId;
pub use crdt::primitives::StateVector;
pub use doc::Doc;
pub use error::DecodeError;
pub use error::Error;
pub use error::Result;
pub use options::Options;
pub use transaction::ReadTxn;
pub use transaction::Transaction;
pub use types::ArrayRef;
pub use types::MapRef;
pub use types::TextRef;
pub use types::TypeKind;
pub use update::Update;
