// model = "claude-opus-4-5"
// created = 2026-10-19
// modified = 2026-10-19
// driver = "Isaac Clayton"

//! Shared primitives for the block store.
//!
//! # Primitives
//!
//! ## IDs
//! - `ReplicaId`: replica identifier, supplied at document creation
//! - `Id`: one clock unit from one replica (replica, clock)
//! - `ClockRange`: a half-open run of clocks
//!
//! ## Clocks
//! - `StateVector`: per-replica upper bound of integrated history
//!
//! ## Deletions
//! - `DeleteSet`: per-replica coalesced deleted ranges

pub mod clock;
pub mod delete_set;
pub mod id;

pub use clock::StateVector;
pub use delete_set::DeleteSet;
pub use id::ClockRange;
pub use id::Id;
pub use id::ReplicaId;
