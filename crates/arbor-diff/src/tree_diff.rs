//! Tree-level diff: compare two document versions node by node.
//!
//! Nodes are matched by id, never by position, so a moved card shows up as
//! a move rather than a delete plus an insert. Reordering within a parent is
//! reported only for the nodes that actually left the longest run of
//! siblings whose relative order is unchanged.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;
use similar::{capture_diff_slices, Algorithm, DiffOp};

use arbor_store::ObjectStore;
use arbor_tree::{Navigator, Node, Tree};
use arbor_types::{NodeId, ObjectId};

use crate::error::DiffResult;

/// The result of comparing two trees.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TreeDiff {
    /// Changes in pre-order of the tree they refer to: removals and content
    /// changes follow the old tree, additions and moves follow the new one.
    pub changes: Vec<TreeChange>,
}

impl TreeDiff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Ids of every node the diff touches, in change order, deduplicated.
    pub fn touched(&self) -> Vec<&NodeId> {
        let mut seen = HashSet::new();
        self.changes
            .iter()
            .map(TreeChange::id)
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

/// A single change between two trees.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeChange {
    /// A node present only in the new tree.
    Added {
        id: NodeId,
        parent: NodeId,
        index: usize,
        content: String,
    },
    /// A node present only in the old tree.
    Deleted {
        id: NodeId,
        parent: NodeId,
        content: String,
    },
    ContentChanged {
        id: NodeId,
        old: String,
        new: String,
    },
    /// A node that changed parent, or was reordered among its siblings.
    Moved {
        id: NodeId,
        from_parent: NodeId,
        to_parent: NodeId,
        from_index: usize,
        to_index: usize,
    },
}

impl TreeChange {
    pub fn id(&self) -> &NodeId {
        match self {
            Self::Added { id, .. }
            | Self::Deleted { id, .. }
            | Self::ContentChanged { id, .. }
            | Self::Moved { id, .. } => id,
        }
    }
}

impl fmt::Display for TreeChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added { id, parent, index, .. } => write!(f, "A {id} (under {parent} at {index})"),
            Self::Deleted { id, parent, .. } => write!(f, "D {id} (was under {parent})"),
            Self::ContentChanged { id, .. } => write!(f, "M {id}"),
            Self::Moved {
                id,
                from_parent,
                to_parent,
                from_index,
                to_index,
            } => write!(f, "R {id} ({from_parent}[{from_index}] -> {to_parent}[{to_index}])"),
        }
    }
}

/// Compare two trees held in memory.
pub fn diff_trees(old: &Tree, new: &Tree) -> TreeDiff {
    if old == new {
        return TreeDiff::new();
    }
    let before = Navigator::new(old);
    let after = Navigator::new(new);
    let reordered = reordered_nodes(&before, &after);
    let mut changes = Vec::new();

    for node in before.preorder() {
        let id = node.id();
        match after.get(id.as_str()) {
            None => {
                if let Some(parent) = before.parent(id.as_str()) {
                    changes.push(TreeChange::Deleted {
                        id: id.clone(),
                        parent: parent.id().clone(),
                        content: node.content().to_string(),
                    });
                }
            }
            Some(other) if other.content() != node.content() => {
                changes.push(TreeChange::ContentChanged {
                    id: id.clone(),
                    old: node.content().to_string(),
                    new: other.content().to_string(),
                });
            }
            Some(_) => {}
        }
    }

    for node in after.preorder() {
        let key = node.id().as_str();
        let Some(parent) = after.parent(key) else { continue };
        let index = after.index(key).unwrap_or_default();
        match before.parent(key) {
            None if !before.contains(key) => changes.push(TreeChange::Added {
                id: node.id().clone(),
                parent: parent.id().clone(),
                index,
                content: node.content().to_string(),
            }),
            Some(old_parent) if old_parent.id() != parent.id() || reordered.contains(key) => {
                changes.push(TreeChange::Moved {
                    id: node.id().clone(),
                    from_parent: old_parent.id().clone(),
                    to_parent: parent.id().clone(),
                    from_index: before.index(key).unwrap_or_default(),
                    to_index: index,
                })
            }
            _ => {}
        }
    }

    TreeDiff { changes }
}

/// Load two root tree objects from `store` and compare them.
///
/// Identical ids short-circuit without reading anything.
pub fn diff_stored_trees(store: &dyn ObjectStore, old: &ObjectId, new: &ObjectId) -> DiffResult<TreeDiff> {
    if old == new {
        return Ok(TreeDiff::new());
    }
    let old = Tree::load(store, old)?;
    let new = Tree::load(store, new)?;
    Ok(diff_trees(&old, &new))
}

/// Nodes that kept their parent but left the longest common subsequence
/// of that parent's surviving children.
fn reordered_nodes<'a>(before: &Navigator<'a>, after: &Navigator<'_>) -> HashSet<&'a str> {
    let mut moved = HashSet::new();
    for &parent in before.preorder() {
        let Some(new_parent) = after.get(parent.id().as_str()) else { continue };
        let old_order: Vec<&'a str> = parent
            .children()
            .iter()
            .filter(|c| stays_under(c, parent.id(), after))
            .map(|c| c.id().as_str())
            .collect();
        let new_order: Vec<&str> = new_parent
            .children()
            .iter()
            .filter(|c| stays_under(c, parent.id(), before))
            .map(|c| c.id().as_str())
            .collect();
        if old_order == new_order {
            continue;
        }
        let mut stable = HashSet::new();
        for op in capture_diff_slices(Algorithm::Myers, &old_order, &new_order) {
            if let DiffOp::Equal { old_index, len, .. } = op {
                stable.extend(old_order[old_index..old_index + len].iter().copied());
            }
        }
        moved.extend(old_order.iter().copied().filter(|id| !stable.contains(id)));
    }
    moved
}

fn stays_under(child: &Node, parent: &NodeId, other: &Navigator<'_>) -> bool {
    other.parent(child.id().as_str()).map(Node::id) == Some(parent)
}
