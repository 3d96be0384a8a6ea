// model = "claude-opus-4-5"
// created = 2026-10-19
// modified = 2026-10-19
// driver = "Isaac Clayton"

//! State vectors: the per-replica summary of integrated history.
//!
//! A state vector maps each replica to the exclusive upper bound of the
//! contiguous clock range a document has integrated from it. Comparing two
//! state vectors tells a replica exactly which blocks its peer is missing.
//!
//! Complexity:
//! - get: O(log n) where n is the number of replicas
//! - merge: O(n)
//! - encode/decode: O(n)
//!
//! Entries are kept in a `BTreeMap` so that iteration, and therefore the
//! encoding, is in ascending replica order. Zero entries are never stored, so
//! an empty document has an empty state vector.

use std::collections::BTreeMap;

use crate::codec::Decoder;
use crate::codec::Encoder;
use crate::error::DecodeError;

use super::id::Id;
use super::id::ReplicaId;

/// Maps each replica to the next clock not yet integrated from it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StateVector {
    entries: BTreeMap<ReplicaId, u32>,
}

impl StateVector {
    /// Create an empty state vector.
    pub fn new() -> StateVector {
        return StateVector {
            entries: BTreeMap::new(),
        };
    }

    /// Get the clock for a replica, 0 if unknown.
    #[inline]
    pub fn get(&self, replica: ReplicaId) -> u32 {
        return self.entries.get(&replica).copied().unwrap_or(0);
    }

    /// Set the clock for a replica. Setting 0 removes the entry.
    pub fn set(&mut self, replica: ReplicaId, clock: u32) {
        if clock == 0 {
            self.entries.remove(&replica);
        } else {
            self.entries.insert(replica, clock);
        }
    }

    /// Raise the clock for a replica to at least `clock`.
    pub fn set_max(&mut self, replica: ReplicaId, clock: u32) {
        if clock > self.get(replica) {
            self.entries.insert(replica, clock);
        }
    }

    /// Whether the given id has been integrated.
    #[inline]
    pub fn contains(&self, id: &Id) -> bool {
        return id.clock < self.get(id.replica);
    }

    /// Take the pointwise maximum with another state vector.
    pub fn merge(&mut self, other: &StateVector) {
        for (&replica, &clock) in &other.entries {
            self.set_max(replica, clock);
        }
    }

    /// Whether every entry in `other` is covered by this state vector.
    pub fn dominates(&self, other: &StateVector) -> bool {
        return other.entries.iter().all(|(&replica, &clock)| self.get(replica) >= clock);
    }

    /// Iterate over (replica, clock) in ascending replica order.
    pub fn iter(&self) -> impl Iterator<Item = (ReplicaId, u32)> + '_ {
        return self.entries.iter().map(|(&replica, &clock)| (replica, clock));
    }

    #[inline]
    pub fn len(&self) -> usize {
        return self.entries.len();
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        return self.entries.is_empty();
    }

    /// Encode as `count, [(replica, clock)]`.
    pub fn encode(&self) -> Vec<u8> {
        let mut enc = Encoder::new();
        self.encode_into(&mut enc);
        return enc.into_bytes();
    }

    pub(crate) fn encode_into(&self, enc: &mut Encoder) {
        enc.write_var_u64(self.entries.len() as u64);
        for (replica, clock) in self.iter() {
            enc.write_var_u64(replica.0);
            enc.write_var_u32(clock);
        }
    }

    /// Decode a state vector, rejecting trailing bytes.
    pub fn decode(bytes: &[u8]) -> Result<StateVector, DecodeError> {
        let mut dec = Decoder::new(bytes);
        let sv = StateVector::decode_from(&mut dec)?;
        dec.finish()?;
        return Ok(sv);
    }

    pub(crate) fn decode_from(dec: &mut Decoder<'_>) -> Result<StateVector, DecodeError> {
        let count = dec.read_var_u64()?;
        let mut sv = StateVector::new();
        for _ in 0..count {
            let replica = ReplicaId(dec.read_var_u64()?);
            let clock = dec.read_var_u32()?;
            if sv.entries.contains_key(&replica) {
                return Err(DecodeError::Malformed("duplicate replica in state vector"));
            }
            sv.set(replica, clock);
        }
        return Ok(sv);
    }
}

impl FromIterator<(ReplicaId, u32)> for StateVector {
    fn from_iter<I: IntoIterator<Item = (ReplicaId, u32)>>(iter: I) -> StateVector {
        let mut sv = StateVector::new();
        for (replica, clock) in iter {
            sv.set_max(replica, clock);
        }
        return sv;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(n: u64) -> ReplicaId {
        return ReplicaId(n);
    }

    #[test]
    fn empty_state_vector() {
        let sv = StateVector::new();
        assert!(sv.is_empty());
        assert_eq!(sv.get(r(1)), 0);
        assert_eq!(sv.encode(), vec![0]);
    }

    #[test]
    fn zero_entries_are_not_stored() {
        let mut sv = StateVector::new();
        sv.set(r(1), 0);
        assert!(sv.is_empty());

        sv.set(r(1), 5);
        sv.set(r(1), 0);
        assert!(sv.is_empty());
    }

    #[test]
    fn merge_takes_pointwise_max() {
        let mut a: StateVector = [(r(1), 2), (r(2), 7)].into_iter().collect();
        let b: StateVector = [(r(1), 5), (r(3), 1)].into_iter().collect();

        a.merge(&b);

        assert_eq!(a.get(r(1)), 5);
        assert_eq!(a.get(r(2)), 7);
        assert_eq!(a.get(r(3)), 1);
    }

    #[test]
    fn contains_is_exclusive() {
        let sv: StateVector = [(r(1), 3)].into_iter().collect();
        assert!(sv.contains(&Id::new(r(1), 2)));
        assert!(!sv.contains(&Id::new(r(1), 3)));
        assert!(!sv.contains(&Id::new(r(2), 0)));
    }

    #[test]
    fn dominates() {
        let big: StateVector = [(r(1), 3), (r(2), 3)].into_iter().collect();
        let small: StateVector = [(r(1), 2)].into_iter().collect();
        assert!(big.dominates(&small));
        assert!(!small.dominates(&big));
        assert!(big.dominates(&StateVector::new()));
    }

    #[test]
    fn encoding_is_sorted_by_replica() {
        let mut a = StateVector::new();
        a.set(r(9), 1);
        a.set(r(2), 4);
        let mut b = StateVector::new();
        b.set(r(2), 4);
        b.set(r(9), 1);
        assert_eq!(a.encode(), b.encode());
        assert_eq!(a.encode(), vec![2, 2, 4, 9, 1]);
    }

    #[test]
    fn decode_rejects_duplicates_and_garbage() {
        assert!(StateVector::decode(&[2, 1, 1, 1, 2]).is_err());
        assert!(StateVector::decode(&[1, 1]).is_err());
        assert!(StateVector::decode(&[]).is_err());
        assert!(StateVector::decode(&[0, 0]).is_err());
    }

    #[test]
    fn decode_roundtrip() {
        let sv: StateVector = [(r(1), 300), (r(u64::MAX), 1)].into_iter().collect();
        assert_eq!(StateVector::decode(&sv.encode()).unwrap(), sv);
    }
}
