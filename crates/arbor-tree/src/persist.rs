//! Writing trees into an object store and reading them back.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use arbor_store::{Blob, ObjectStore, StoreError};
use arbor_types::{NodeId, ObjectId};

use crate::error::TreeResult;
use crate::node::Node;
use crate::tree::Tree;

/// Counters from one [`Tree::persist`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PersistStats {
    /// Tree objects newly written.
    pub written: usize,
    /// Subtrees skipped because the store already held them.
    pub reused: usize,
}

impl Tree {
    /// Store every blob and tree object of this document, returning the
    /// root tree id.
    ///
    /// A subtree whose tree object is already present is skipped whole:
    /// objects are only ever written after everything they reference, so
    /// presence of a tree implies presence of its descendants.
    pub fn persist(&self, store: &dyn ObjectStore) -> TreeResult<(ObjectId, PersistStats)> {
        let mut stats = PersistStats::default();
        let id = persist_node(self.root(), store, &mut stats)?;
        debug!(root = %id.short_hex(), written = stats.written, reused = stats.reused, "persisted tree");
        Ok((id, stats))
    }

    /// Rehydrate the document whose root tree object is `tree_id`.
    ///
    /// Every referenced object must be present. Digests read from the store
    /// are recorded on the rebuilt nodes, so committing the loaded tree
    /// unchanged hashes nothing.
    pub fn load(store: &dyn ObjectStore, tree_id: &ObjectId) -> TreeResult<Tree> {
        let mut seen = HashSet::new();
        let root = load_node(store, NodeId::root(), tree_id, &mut seen)?;
        Tree::from_node(Arc::new(root))
    }
}

fn persist_node(node: &Node, store: &dyn ObjectStore, stats: &mut PersistStats) -> TreeResult<ObjectId> {
    let digest = node.digest()?;
    if store.exists(&digest)? {
        stats.reused += 1;
        return Ok(digest);
    }
    store.write(&Blob::new(node.content()).to_stored_object())?;
    for child in node.children() {
        persist_node(child, store, stats)?;
    }
    let written = store.write(&node.tree_object()?.to_stored_object()?)?;
    stats.written += 1;
    Ok(written)
}

fn load_node(
    store: &dyn ObjectStore,
    id: NodeId,
    tree_id: &ObjectId,
    seen: &mut HashSet<NodeId>,
) -> TreeResult<Node> {
    if !seen.insert(id.clone()) {
        return Err(StoreError::CorruptObject {
            id: *tree_id,
            reason: format!("node id {id} appears twice"),
        }
        .into());
    }
    let object = store.load_tree(tree_id)?;
    let content = store.load_blob(&object.content)?.content;
    let children = object
        .children
        .into_iter()
        .map(|entry| load_node(store, entry.id, &entry.tree, seen).map(Arc::new))
        .collect::<TreeResult<Vec<_>>>()?;
    let node = Node::with_children(id, content, children);
    node.prime_digest(*tree_id);
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_store::{InMemoryObjectStore, TreeEntry, TreeObject};

    use crate::error::TreeError;

    fn nid(s: &str) -> NodeId {
        NodeId::new(s).unwrap()
    }

    fn sample() -> Tree {
        Tree::new()
            .insert(Node::new(nid("1"), "A"), &NodeId::root(), 0)
            .unwrap()
            .insert(Node::new(nid("2"), "B"), &nid("1"), 0)
            .unwrap()
            .insert(Node::new(nid("3"), "C"), &NodeId::root(), 1)
            .unwrap()
    }

    #[test]
    fn persist_then_load_roundtrip() {
        let store = InMemoryObjectStore::new();
        let tree = sample();
        let (root, stats) = tree.persist(&store).unwrap();
        assert_eq!(root, tree.digest().unwrap());
        assert_eq!(stats.written, 4);

        let loaded = Tree::load(&store, &root).unwrap();
        assert_eq!(loaded, tree);
        assert!(loaded.root().has_cached_digest());
    }

    #[test]
    fn second_persist_reuses_everything() {
        let store = InMemoryObjectStore::new();
        let tree = sample();
        tree.persist(&store).unwrap();
        let before = store.len();
        let (_, stats) = tree.persist(&store).unwrap();
        assert_eq!(stats, PersistStats { written: 0, reused: 1 });
        assert_eq!(store.len(), before);
    }

    #[test]
    fn update_writes_only_the_changed_path() {
        let store = InMemoryObjectStore::new();
        let tree = sample();
        tree.persist(&store).unwrap();
        let edited = tree.update(&nid("2"), "B2").unwrap();
        let (_, stats) = edited.persist(&store).unwrap();
        // "2", "1", and the root are rewritten; "3" is reused.
        assert_eq!(stats.written, 3);
        assert_eq!(stats.reused, 1);
    }

    #[test]
    fn load_missing_object_fails() {
        let store = InMemoryObjectStore::new();
        let err = Tree::load(&store, &ObjectId::from_bytes(b"nothing")).unwrap_err();
        assert!(matches!(err, TreeError::Store(StoreError::NotFound(_))));
    }

    #[test]
    fn load_rejects_duplicate_ids() {
        let store = InMemoryObjectStore::new();
        let blob = store.write(&Blob::new("").to_stored_object()).unwrap();
        let leaf = store
            .write(&TreeObject::new(blob, vec![]).to_stored_object().unwrap())
            .unwrap();
        let root = TreeObject::new(
            blob,
            vec![TreeEntry::new(nid("1"), leaf), TreeEntry::new(nid("1"), leaf)],
        );
        let root_id = store.write(&root.to_stored_object().unwrap()).unwrap();
        let err = Tree::load(&store, &root_id).unwrap_err();
        assert!(matches!(err, TreeError::Store(StoreError::CorruptObject { .. })));
    }
}
