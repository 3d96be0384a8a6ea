// model = "claude-opus-4-5"
// created = 2026-10-19
// modified = 2026-10-19
// driver = "Isaac Clayton"

//! Document configuration.

use rand_core::OsRng;
use rand_core::RngCore;

use crate::crdt::primitives::ReplicaId;

/// Options for creating a [`Doc`](crate::Doc).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Options {
    /// Identifies this replica. Two live replicas must never share an id,
    /// otherwise their clocks collide.
    pub replica_id: ReplicaId,
}

impl Options {
    /// Options with a freshly drawn random replica id.
    pub fn new() -> Options {
        return Options::default();
    }

    pub fn with_replica_id(mut self, replica_id: impl Into<ReplicaId>) -> Options {
        self.replica_id = replica_id.into();
        return self;
    }
}

impl Default for Options {
    fn default() -> Options {
        return Options {
            replica_id: ReplicaId(OsRng.next_u64()),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_replica() {
        let options = Options::new().with_replica_id(42u64);
        assert_eq!(options.replica_id, ReplicaId(42));
    }

    #[test]
    fn default_ids_differ() {
        // 64 random bits; a collision here means the generator is broken.
        assert_ne!(Options::default().replica_id, Options::default().replica_id);
    }
}
