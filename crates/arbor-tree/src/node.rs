//! Immutable document nodes.
//!
//! A [`Node`] is never mutated after construction. Edits build new nodes
//! along the path from the edited node to the root and share every other
//! subtree through `Arc`. Each node lazily caches the id of the tree object
//! it serializes to, so a subtree reused across versions is hashed once.

use std::sync::{Arc, OnceLock};

use arbor_store::{Blob, TreeEntry, TreeObject};
use arbor_types::{NodeId, ObjectId};

use crate::error::TreeResult;

/// A node of the document hierarchy: id, text content, ordered children.
pub struct Node {
    id: NodeId,
    content: String,
    children: Vec<Arc<Node>>,
    digest: OnceLock<ObjectId>,
}

impl Node {
    /// A fresh childless node.
    pub fn new(id: NodeId, content: impl Into<String>) -> Self {
        Self::with_children(id, content, Vec::new())
    }

    pub fn with_children(id: NodeId, content: impl Into<String>, children: Vec<Arc<Node>>) -> Self {
        Self {
            id,
            content: content.into(),
            children,
            digest: OnceLock::new(),
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn children(&self) -> &[Arc<Node>] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of nodes in this subtree, including itself.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(|c| c.subtree_len()).sum::<usize>()
    }

    /// Find a node in this subtree by id.
    pub fn find(&self, id: &str) -> Option<&Node> {
        if self.id.as_str() == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    /// Child-index path from this node to `id`, if present.
    pub(crate) fn path_to(&self, id: &str) -> Option<Vec<usize>> {
        if self.id.as_str() == id {
            return Some(Vec::new());
        }
        for (index, child) in self.children.iter().enumerate() {
            if let Some(mut rest) = child.path_to(id) {
                rest.insert(0, index);
                return Some(rest);
            }
        }
        None
    }

    /// Every id in this subtree, pre-order.
    pub fn ids(&self) -> Vec<&NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(&node.id);
            stack.extend(node.children.iter().rev().map(|c| c.as_ref()));
        }
        out
    }

    /// The tree object this node serializes to (children by digest).
    pub fn tree_object(&self) -> TreeResult<TreeObject> {
        let children = self
            .children
            .iter()
            .map(|c| -> TreeResult<TreeEntry> { Ok(TreeEntry::new(c.id.clone(), c.digest()?)) })
            .collect::<TreeResult<Vec<_>>>()?;
        Ok(TreeObject::new(Blob::new(self.content.as_str()).id(), children))
    }

    /// Id of this subtree's tree object. Computed once, then cached.
    pub fn digest(&self) -> TreeResult<ObjectId> {
        if let Some(digest) = self.digest.get() {
            return Ok(*digest);
        }
        let digest = self.tree_object()?.id()?;
        Ok(*self.digest.get_or_init(|| digest))
    }

    /// Whether the digest has already been computed.
    pub fn has_cached_digest(&self) -> bool {
        self.digest.get().is_some()
    }

    /// Record a digest known from the store (used when rehydrating).
    pub(crate) fn prime_digest(&self, digest: ObjectId) {
        let _ = self.digest.set(digest);
    }

    // Copy constructors used by the edit algebra. The copies start with an
    // empty digest cache; children stay shared.

    pub(crate) fn replace_content(&self, content: String) -> Node {
        Node::with_children(self.id.clone(), content, self.children.clone())
    }

    pub(crate) fn replace_children(&self, children: Vec<Arc<Node>>) -> Node {
        Node::with_children(self.id.clone(), self.content.clone(), children)
    }
}

impl Clone for Node {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            content: self.content.clone(),
            children: self.children.clone(),
            digest: self.digest.clone(),
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        if self.id != other.id {
            return false;
        }
        // Digests cover content and the whole child structure.
        if let (Some(a), Some(b)) = (self.digest.get(), other.digest.get()) {
            return a == b;
        }
        self.content == other.content
            && self.children.len() == other.children.len()
            && self
                .children
                .iter()
                .zip(&other.children)
                .all(|(a, b)| Arc::ptr_eq(a, b) || a == b)
    }
}

impl Eq for Node {}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("content", &self.content)
            .field("children", &self.children)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nid(s: &str) -> NodeId {
        NodeId::new(s).unwrap()
    }

    fn sample() -> Node {
        let leaf = Arc::new(Node::new(nid("2"), "leaf"));
        let mid = Arc::new(Node::with_children(nid("1"), "mid", vec![leaf]));
        let side = Arc::new(Node::new(nid("3"), "side"));
        Node::with_children(nid("0"), "", vec![mid, side])
    }

    #[test]
    fn find_and_path() {
        let root = sample();
        assert_eq!(root.find("2").map(Node::content), Some("leaf"));
        assert_eq!(root.path_to("2"), Some(vec![0, 0]));
        assert_eq!(root.path_to("3"), Some(vec![1]));
        assert_eq!(root.path_to("0"), Some(vec![]));
        assert_eq!(root.path_to("9"), None);
        assert_eq!(root.subtree_len(), 4);
    }

    #[test]
    fn ids_are_preorder() {
        let root = sample();
        let ids: Vec<&str> = root.ids().into_iter().map(NodeId::as_str).collect();
        assert_eq!(ids, vec!["0", "1", "2", "3"]);
    }

    #[test]
    fn digest_is_cached_and_structural() {
        let a = sample();
        let b = sample();
        assert!(!a.has_cached_digest());
        assert_eq!(a.digest().unwrap(), b.digest().unwrap());
        assert!(a.has_cached_digest());
        assert_eq!(a, b);
    }

    #[test]
    fn content_change_changes_digest() {
        let a = sample();
        let b = a.replace_content("title".into());
        assert_ne!(a.digest().unwrap(), b.digest().unwrap());
        assert_ne!(a, b);
    }

    #[test]
    fn sibling_order_matters() {
        let x = Arc::new(Node::new(nid("x"), "x"));
        let y = Arc::new(Node::new(nid("y"), "y"));
        let xy = Node::with_children(nid("0"), "", vec![x.clone(), y.clone()]);
        let yx = Node::with_children(nid("0"), "", vec![y, x]);
        assert_ne!(xy, yx);
        assert_ne!(xy.digest().unwrap(), yx.digest().unwrap());
    }

    #[test]
    fn child_ids_are_part_of_digest() {
        let a = Node::with_children(nid("0"), "", vec![Arc::new(Node::new(nid("1"), "t"))]);
        let b = Node::with_children(nid("0"), "", vec![Arc::new(Node::new(nid("2"), "t"))]);
        assert_ne!(a.digest().unwrap(), b.digest().unwrap());
    }
}
