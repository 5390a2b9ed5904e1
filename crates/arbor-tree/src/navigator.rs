//! Read-only queries over one tree snapshot.
//!
//! Nodes carry no parent pointers, so a [`Navigator`] walks the tree once
//! and indexes every node by id. All queries after that are hash lookups
//! plus slicing.

use std::collections::HashMap;

use arbor_types::NodeId;

use crate::node::Node;
use crate::tree::Tree;

struct Slot<'a> {
    node: &'a Node,
    parent: Option<&'a Node>,
    index: usize,
    depth: usize,
    /// Position in pre-order.
    order: usize,
    /// Position within `columns[depth]`.
    lane: usize,
}

/// Id-indexed view of a [`Tree`].
pub struct Navigator<'a> {
    slots: HashMap<&'a str, Slot<'a>>,
    preorder: Vec<&'a Node>,
    columns: Vec<Vec<&'a Node>>,
}

impl<'a> Navigator<'a> {
    pub fn new(tree: &'a Tree) -> Self {
        let mut nav = Self {
            slots: HashMap::with_capacity(tree.len()),
            preorder: Vec::with_capacity(tree.len()),
            columns: Vec::new(),
        };
        let mut stack: Vec<(&'a Node, Option<&'a Node>, usize, usize)> =
            vec![(tree.root(), None, 0, 0)];
        while let Some((node, parent, index, depth)) = stack.pop() {
            if nav.columns.len() <= depth {
                nav.columns.push(Vec::new());
            }
            let lane = nav.columns[depth].len();
            nav.columns[depth].push(node);
            nav.slots.insert(
                node.id().as_str(),
                Slot {
                    node,
                    parent,
                    index,
                    depth,
                    order: nav.preorder.len(),
                    lane,
                },
            );
            nav.preorder.push(node);
            for (i, child) in node.children().iter().enumerate().rev() {
                stack.push((child.as_ref(), Some(node), i, depth + 1));
            }
        }
        nav
    }

    pub fn contains(&self, id: &str) -> bool {
        self.slots.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&'a Node> {
        self.slots.get(id).map(|s| s.node)
    }

    /// `None` for the root and for unknown ids.
    pub fn parent(&self, id: &str) -> Option<&'a Node> {
        self.slots.get(id).and_then(|s| s.parent)
    }

    pub fn children(&self, id: &str) -> Option<&'a [std::sync::Arc<Node>]> {
        self.get(id).map(Node::children)
    }

    /// Position among siblings. The root is at index 0.
    pub fn index(&self, id: &str) -> Option<usize> {
        self.slots.get(id).map(|s| s.index)
    }

    /// Distance from the root (the root is at depth 0).
    pub fn depth(&self, id: &str) -> Option<usize> {
        self.slots.get(id).map(|s| s.depth)
    }

    /// Path from the root down to the node's parent, root first.
    /// Empty for the root.
    pub fn ancestors(&self, id: &str) -> Option<Vec<&'a Node>> {
        let mut out = Vec::new();
        let mut cursor = self.slots.get(id)?.parent;
        while let Some(node) = cursor {
            out.push(node);
            cursor = self.slots.get(node.id().as_str()).and_then(|s| s.parent);
        }
        out.reverse();
        Some(out)
    }

    /// Every node below `id` in pre-order, excluding `id` itself.
    pub fn descendants(&self, id: &str) -> Option<Vec<&'a Node>> {
        let slot = self.slots.get(id)?;
        let end = slot.order + slot.node.subtree_len();
        Some(self.preorder[slot.order + 1..end].to_vec())
    }

    pub fn next_sibling(&self, id: &str) -> Option<&'a Node> {
        let slot = self.slots.get(id)?;
        slot.parent?.children().get(slot.index + 1).map(|c| c.as_ref())
    }

    pub fn prev_sibling(&self, id: &str) -> Option<&'a Node> {
        let slot = self.slots.get(id)?;
        let index = slot.index.checked_sub(1)?;
        slot.parent?.children().get(index).map(|c| c.as_ref())
    }

    /// Every node at `depth`, in document order. Cousins follow one another
    /// across parent boundaries.
    pub fn column(&self, depth: usize) -> &[&'a Node] {
        self.columns.get(depth).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The node after `id` in its depth column.
    pub fn next_in_column(&self, id: &str) -> Option<&'a Node> {
        let slot = self.slots.get(id)?;
        self.columns[slot.depth].get(slot.lane + 1).copied()
    }

    /// The node before `id` in its depth column.
    pub fn prev_in_column(&self, id: &str) -> Option<&'a Node> {
        let slot = self.slots.get(id)?;
        let lane = slot.lane.checked_sub(1)?;
        self.columns[slot.depth].get(lane).copied()
    }

    /// Every node, root first, in document order.
    pub fn preorder(&self) -> &[&'a Node] {
        &self.preorder
    }

    /// Number of depth columns (height of the tree plus one).
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Whether `ancestor` lies strictly above `id`.
    pub fn is_descendant(&self, id: &str, ancestor: &str) -> bool {
        let mut cursor = self.parent(id);
        while let Some(node) = cursor {
            if node.id().as_str() == ancestor {
                return true;
            }
            cursor = self.parent(node.id().as_str());
        }
        false
    }

    pub fn parent_id(&self, id: &str) -> Option<&'a NodeId> {
        self.parent(id).map(Node::id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::NodeSpec;

    fn ids(nodes: &[&Node]) -> Vec<String> {
        nodes.iter().map(|n| n.id().to_string()).collect()
    }

    fn nid(s: &str) -> NodeId {
        NodeId::new(s).unwrap()
    }

    /// 0
    /// ├── a
    /// │   ├── a1
    /// │   └── a2
    /// │       └── x
    /// └── b
    ///     └── b1
    fn sample() -> Tree {
        let spec = NodeSpec::new(NodeId::root(), "")
            .with_child(
                NodeSpec::new(nid("a"), "A")
                    .with_child(NodeSpec::new(nid("a1"), ""))
                    .with_child(NodeSpec::new(nid("a2"), "").with_child(NodeSpec::new(nid("x"), ""))),
            )
            .with_child(NodeSpec::new(nid("b"), "B").with_child(NodeSpec::new(nid("b1"), "")));
        Tree::from_spec(&spec).unwrap()
    }

    #[test]
    fn parent_children_index() {
        let tree = sample();
        let nav = Navigator::new(&tree);
        assert_eq!(nav.parent("a2").unwrap().id().as_str(), "a");
        assert!(nav.parent("0").is_none());
        assert!(nav.parent("zz").is_none());
        assert_eq!(nav.children("a").unwrap().len(), 2);
        assert_eq!(nav.index("a2"), Some(1));
        assert_eq!(nav.index("b"), Some(1));
        assert_eq!(nav.depth("x"), Some(3));
        assert_eq!(nav.parent_id("b1").map(NodeId::as_str), Some("b"));
    }

    #[test]
    fn ancestors_are_root_first() {
        let tree = sample();
        let nav = Navigator::new(&tree);
        assert_eq!(ids(&nav.ancestors("x").unwrap()), vec!["0", "a", "a2"]);
        assert!(nav.ancestors("0").unwrap().is_empty());
        assert!(nav.ancestors("missing").is_none());
    }

    #[test]
    fn descendants_are_preorder() {
        let tree = sample();
        let nav = Navigator::new(&tree);
        assert_eq!(ids(&nav.descendants("a").unwrap()), vec!["a1", "a2", "x"]);
        assert_eq!(
            ids(&nav.descendants("0").unwrap()),
            vec!["a", "a1", "a2", "x", "b", "b1"]
        );
        assert!(nav.descendants("x").unwrap().is_empty());
        assert!(nav.is_descendant("x", "a"));
        assert!(!nav.is_descendant("a", "a"));
    }

    #[test]
    fn siblings() {
        let tree = sample();
        let nav = Navigator::new(&tree);
        assert_eq!(nav.next_sibling("a1").unwrap().id().as_str(), "a2");
        assert!(nav.next_sibling("a2").is_none());
        assert_eq!(nav.prev_sibling("b").unwrap().id().as_str(), "a");
        assert!(nav.prev_sibling("a").is_none());
        assert!(nav.next_sibling("0").is_none());
    }

    #[test]
    fn columns_cross_parent_boundaries() {
        let tree = sample();
        let nav = Navigator::new(&tree);
        assert_eq!(ids(nav.column(2)), vec!["a1", "a2", "b1"]);
        assert_eq!(nav.next_in_column("a2").unwrap().id().as_str(), "b1");
        assert_eq!(nav.prev_in_column("b1").unwrap().id().as_str(), "a2");
        assert!(nav.prev_in_column("a1").is_none());
        assert!(nav.next_in_column("x").is_none());
        assert!(nav.column(9).is_empty());
        assert_eq!(nav.column_count(), 4);
    }

    #[test]
    fn preorder_covers_tree() {
        let tree = sample();
        let nav = Navigator::new(&tree);
        assert_eq!(nav.preorder().len(), tree.len());
        assert_eq!(nav.preorder()[0].id().as_str(), "0");
        assert!(nav.contains("b1"));
    }
}
