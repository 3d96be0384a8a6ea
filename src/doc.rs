// model = "claude-opus-4-5"
// created = 2026-10-19
// modified = 2026-10-19
// driver = "Isaac Clayton"

//! Documents: a replica of a set of named shared types.

use std::sync::Arc;

use crate::crdt::branch::Branch;
use crate::crdt::branch::Roots;
use crate::crdt::pending::Pending;
use crate::crdt::primitives::DeleteSet;
use crate::crdt::primitives::ReplicaId;
use crate::crdt::store::BlockStore;
use crate::error::Error;
use crate::error::Result;
use crate::options::Options;
use crate::transaction::ReadTxn;
use crate::transaction::Transaction;
use crate::types::ArrayRef;
use crate::types::MapRef;
use crate::types::TextRef;
use crate::types::TypeKind;

/// One replica of a collaborative document.
///
/// All mutation goes through a [`Transaction`]. Reads can go through the
/// document directly, since it implements [`ReadTxn`].
///
/// ```
/// use tandem::Doc;
/// use tandem::ReadTxn;
///
/// let mut doc = Doc::with_replica_id(1);
/// let text = doc.get_or_insert_text("article").unwrap();
///
/// let mut txn = doc.transact();
/// text.insert(&mut txn, 0, "hello").unwrap();
/// txn.commit();
/// drop(txn);
///
/// assert_eq!(text.get_string(&doc), "hello");
/// ```
#[derive(Debug)]
pub struct Doc {
    pub(crate) options: Options,
    pub(crate) store: BlockStore,
    pub(crate) roots: Roots,
    pub(crate) pending: Pending,
    pub(crate) delete_set: DeleteSet,
}

impl Doc {
    /// A document with a random replica id.
    pub fn new() -> Doc {
        return Doc::with_options(Options::default());
    }

    pub fn with_replica_id(replica_id: u64) -> Doc {
        return Doc::with_options(Options::default().with_replica_id(replica_id));
    }

    pub fn with_options(options: Options) -> Doc {
        return Doc {
            options,
            store: BlockStore::new(),
            roots: Roots::default(),
            pending: Pending::new(),
            delete_set: DeleteSet::new(),
        };
    }

    #[inline]
    pub fn replica_id(&self) -> ReplicaId {
        return self.options.replica_id;
    }

    /// Start a transaction.
    pub fn transact(&mut self) -> Transaction<'_> {
        return Transaction::new(self, None);
    }

    /// Start a transaction tagged with an origin, which is kept on the
    /// transaction for observers and never sent to peers.
    pub fn transact_with(&mut self, origin: impl Into<Vec<u8>>) -> Transaction<'_> {
        return Transaction::new(self, Some(origin.into()));
    }

    pub fn get_or_insert_text(&mut self, name: &str) -> Result<TextRef> {
        let name = self.bind_root(name, TypeKind::Text)?;
        return Ok(TextRef::new(name));
    }

    pub fn get_or_insert_array(&mut self, name: &str) -> Result<ArrayRef> {
        let name = self.bind_root(name, TypeKind::Array)?;
        return Ok(ArrayRef::new(name));
    }

    pub fn get_or_insert_map(&mut self, name: &str) -> Result<MapRef> {
        let name = self.bind_root(name, TypeKind::Map)?;
        return Ok(MapRef::new(name));
    }

    /// Decode and apply an update in its own transaction.
    ///
    /// Nothing is applied if decoding fails.
    pub fn apply_update(&mut self, bytes: &[u8]) -> Result<()> {
        let mut txn = self.transact();
        txn.apply_update_v1(bytes)?;
        txn.commit();
        return Ok(());
    }

    /// Every deletion committed so far.
    pub fn delete_set(&self) -> &DeleteSet {
        return &self.delete_set;
    }

    /// Number of received blocks still waiting for their dependencies.
    pub fn pending_len(&self) -> usize {
        return self.pending.len();
    }

    /// Names of the roots this document knows about, sorted.
    pub fn root_names(&self) -> Vec<Arc<str>> {
        let mut names: Vec<Arc<str>> = self.roots.keys().cloned().collect();
        names.sort();
        return names;
    }

    /// Bind `name` to `kind`, creating the root if needed.
    ///
    /// A root created by a remote block has no kind until a local accessor
    /// claims it.
    pub(crate) fn bind_root(&mut self, name: &str, kind: TypeKind) -> Result<Arc<str>> {
        if let Some(branch) = self.roots.get_mut(name) {
            match branch.kind {
                Some(found) if found != kind => {
                    return Err(Error::TypeMismatch {
                        name: branch.name.clone(),
                        expected: kind,
                        found,
                    });
                }
                _ => {
                    branch.kind = Some(kind);
                    return Ok(branch.name.clone());
                }
            }
        }
        let name: Arc<str> = Arc::from(name);
        let mut branch = Branch::new(name.clone());
        branch.kind = Some(kind);
        self.roots.insert(name.clone(), branch);
        return Ok(name);
    }
}

impl Default for Doc {
    fn default() -> Doc {
        return Doc::new();
    }
}

impl ReadTxn for Doc {
    fn doc(&self) -> &Doc {
        return self;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replica_id_from_options() {
        let doc = Doc::with_options(Options::new().with_replica_id(7u64));
        assert_eq!(doc.replica_id(), ReplicaId(7));
    }

    #[test]
    fn roots_are_idempotent_by_name() {
        let mut doc = Doc::with_replica_id(1);
        let a = doc.get_or_insert_text("t").unwrap();
        let b = doc.get_or_insert_text("t").unwrap();
        assert_eq!(a, b);
        assert_eq!(doc.root_names().len(), 1);
    }

    #[test]
    fn root_kind_mismatch() {
        let mut doc = Doc::with_replica_id(1);
        doc.get_or_insert_map("m").unwrap();
        let err = doc.get_or_insert_text("m").unwrap_err();
        assert!(matches!(
            err,
            Error::TypeMismatch { expected: TypeKind::Text, found: TypeKind::Map, .. }
        ));
    }

    #[test]
    fn empty_update_is_rejected() {
        let mut doc = Doc::with_replica_id(1);
        assert!(matches!(doc.apply_update(&[]), Err(Error::Decode(_))));
    }
}
