//! The persistent document tree and its edit algebra.
//!
//! Every edit returns a new [`Tree`] and leaves `self` untouched. Only the
//! nodes on the path from the edited position to the root are rebuilt;
//! every other subtree is shared with the previous version. Locating a node
//! is a depth-first search, so the rebuild is proportional to depth plus
//! the sibling lists touched while the search itself is linear in the
//! worst case. Callers that need repeated lookups should build a
//! [`Navigator`](crate::Navigator).

use std::collections::HashSet;
use std::sync::Arc;

use tracing::trace;

use arbor_types::{NodeId, ObjectId};

use crate::error::{TreeError, TreeResult};
use crate::node::Node;
use crate::spec::NodeSpec;

/// A document: a node hierarchy rooted at id `"0"`.
///
/// Equality is structural (ids, contents, shape), never pointer identity.
#[derive(Clone, PartialEq, Eq)]
pub struct Tree {
    root: Arc<Node>,
}

impl Tree {
    /// A document containing only an empty root.
    pub fn new() -> Self {
        Self {
            root: Arc::new(Node::new(NodeId::root(), "")),
        }
    }

    /// Wrap an existing hierarchy, checking the root id and id uniqueness.
    pub fn from_node(root: Arc<Node>) -> TreeResult<Self> {
        if !root.id().is_root() {
            return Err(TreeError::invalid(format!(
                "tree root must have id {:?}, got {:?}",
                NodeId::ROOT,
                root.id().as_str()
            )));
        }
        let mut seen = HashSet::new();
        for id in root.ids() {
            if !seen.insert(id) {
                return Err(TreeError::invalid(format!("duplicate node id {id}")));
            }
        }
        Ok(Self { root })
    }

    /// Build from an owned description, e.g. an imported JSON document.
    pub fn from_spec(spec: &NodeSpec) -> TreeResult<Self> {
        Self::from_node(Arc::new(spec.to_node()))
    }

    /// Owned description of the whole document.
    pub fn to_spec(&self) -> NodeSpec {
        NodeSpec::from_node(&self.root)
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Shared handle to the root, for callers assembling new trees out of
    /// existing subtrees.
    pub fn root_arc(&self) -> &Arc<Node> {
        &self.root
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.root.find(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.root.subtree_len()
    }

    /// Always `false`: a tree has at least its root.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Id of the root tree object, computed without touching any store.
    pub fn digest(&self) -> TreeResult<ObjectId> {
        self.root.digest()
    }

    // ---------------------------------------------------------------
    // Edit algebra
    // ---------------------------------------------------------------

    /// Attach a fresh, childless node under `parent_id` at `position`
    /// (clamped to the current child count).
    pub fn insert(&self, node: Node, parent_id: &NodeId, position: usize) -> TreeResult<Tree> {
        if !node.is_leaf() {
            return Err(TreeError::invalid(format!(
                "inserted node {} must be childless",
                node.id()
            )));
        }
        self.insert_subtree(node, parent_id, position)
    }

    /// Attach a whole subtree under `parent_id` at `position`. Every id in
    /// the subtree must be new to this tree.
    pub fn insert_subtree(&self, node: Node, parent_id: &NodeId, position: usize) -> TreeResult<Tree> {
        let path = self.locate(parent_id)?;
        let mut seen = HashSet::new();
        for id in node.ids() {
            if self.contains(id.as_str()) || !seen.insert(id) {
                return Err(TreeError::invalid(format!("node id {id} already exists")));
            }
        }
        let child = Arc::new(node);
        let root = rebuild(&self.root, &path, |parent| {
            let mut children = parent.children().to_vec();
            let at = position.min(children.len());
            children.insert(at, child);
            parent.replace_children(children)
        });
        trace!(parent = %parent_id, position, "inserted node");
        Ok(Tree { root })
    }

    /// Remove the subtree rooted at `id`, descendants included.
    pub fn delete(&self, id: &NodeId) -> TreeResult<Tree> {
        if id.is_root() {
            return Err(TreeError::invalid("cannot delete the root node"));
        }
        let path = self.locate(id)?;
        let (index, parent_path) = split_last(&path)?;
        let root = rebuild(&self.root, parent_path, |parent| {
            let mut children = parent.children().to_vec();
            children.remove(index);
            parent.replace_children(children)
        });
        trace!(node = %id, "deleted subtree");
        Ok(Tree { root })
    }

    /// Replace the content of one node. Siblings and descendants keep their
    /// exact substructure.
    pub fn update(&self, id: &NodeId, content: impl Into<String>) -> TreeResult<Tree> {
        let path = self.locate(id)?;
        let content = content.into();
        let root = rebuild(&self.root, &path, |node| node.replace_content(content));
        trace!(node = %id, "updated content");
        Ok(Tree { root })
    }

    /// Detach the subtree rooted at `id` and reattach it under `new_parent`
    /// at `position`.
    ///
    /// `position` is interpreted against the new parent's child list after
    /// the subtree has been detached, and is clamped to its length.
    pub fn move_node(&self, id: &NodeId, new_parent: &NodeId, position: usize) -> TreeResult<Tree> {
        if id.is_root() {
            return Err(TreeError::invalid("cannot move the root node"));
        }
        if id == new_parent {
            return Err(TreeError::invalid(format!("cannot move {id} under itself")));
        }
        let source = self.locate(id)?;
        let target = self.locate(new_parent)?;
        if target.starts_with(&source) {
            return Err(TreeError::invalid(format!(
                "cannot move {id} under its own descendant {new_parent}"
            )));
        }

        let (index, source_parent) = split_last(&source)?;
        let mut detached = None;
        let without = rebuild(&self.root, source_parent, |parent| {
            let mut children = parent.children().to_vec();
            detached = Some(children.remove(index));
            parent.replace_children(children)
        });
        let subtree = detached.ok_or_else(|| TreeError::NotFound(id.clone()))?;

        let target = without
            .path_to(new_parent.as_str())
            .ok_or_else(|| TreeError::NotFound(new_parent.clone()))?;
        let root = rebuild(&without, &target, |parent| {
            let mut children = parent.children().to_vec();
            let at = position.min(children.len());
            children.insert(at, subtree);
            parent.replace_children(children)
        });
        trace!(node = %id, parent = %new_parent, position, "moved subtree");
        Ok(Tree { root })
    }

    fn locate(&self, id: &NodeId) -> TreeResult<Vec<usize>> {
        self.root
            .path_to(id.as_str())
            .ok_or_else(|| TreeError::NotFound(id.clone()))
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Tree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Tree").field(&self.root).finish()
    }
}

fn split_last(path: &[usize]) -> TreeResult<(usize, &[usize])> {
    path.split_last()
        .map(|(last, rest)| (*last, rest))
        .ok_or_else(|| TreeError::invalid("the root has no parent"))
}

/// Path-copy from `node` down `path`, replacing the node at the end with
/// `edit(node)`. Everything off the path is shared.
fn rebuild(node: &Arc<Node>, path: &[usize], edit: impl FnOnce(&Node) -> Node) -> Arc<Node> {
    match path.split_first() {
        None => Arc::new(edit(node)),
        Some((&index, rest)) => {
            let mut children = node.children().to_vec();
            children[index] = rebuild(&node.children()[index], rest, edit);
            Arc::new(node.replace_children(children))
        }
    }
}
