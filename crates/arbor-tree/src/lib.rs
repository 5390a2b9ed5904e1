//! Persistent document trees for Arbor.
//!
//! A document is a rooted hierarchy of [`Node`]s. Trees are immutable
//! values: [`Tree::insert`], [`Tree::delete`], [`Tree::update`] and
//! [`Tree::move_node`] each return a new tree that shares every untouched
//! subtree with the old one. Failed edits return an error and leave the
//! input as it was.
//!
//! - [`Navigator`] answers parent/sibling/ancestor/column queries over one
//!   snapshot.
//! - [`Tree::persist`] and [`Tree::load`] move trees in and out of an
//!   [`arbor_store::ObjectStore`].
//! - [`NodeSpec`] is the JSON shape used for import and export.

pub mod error;
pub mod navigator;
pub mod node;
pub mod persist;
pub mod spec;
pub mod tree;

pub use error::{TreeError, TreeResult};
pub use navigator::Navigator;
pub use node::Node;
pub use persist::PersistStats;
pub use spec::NodeSpec;
pub use tree::Tree;

#[cfg(test)]
mod properties {
    use proptest::prelude::*;

    use arbor_store::InMemoryObjectStore;
    use arbor_types::NodeId;

    use super::*;

    /// Trees of up to 24 nodes with ids "1".."n" under root "0". Each op
    /// picks a parent among the nodes inserted so far.
    fn tree_strategy() -> impl Strategy<Value = Tree> {
        prop::collection::vec((any::<prop::sample::Index>(), 0usize..4, "[a-c]{0,3}"), 0..24)
            .prop_map(|ops| {
                let mut tree = Tree::new();
                let mut ids = vec![NodeId::root()];
                for (n, (parent, position, content)) in ops.into_iter().enumerate() {
                    let id = NodeId::new((n + 1).to_string()).unwrap();
                    let parent = parent.get(&ids).clone();
                    tree = tree.insert(Node::new(id.clone(), content), &parent, position).unwrap();
                    ids.push(id);
                }
                tree
            })
    }

    fn pick(tree: &Tree, index: prop::sample::Index) -> NodeId {
        let nav = Navigator::new(tree);
        index.get(nav.preorder()).id().clone()
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

        #[test]
        fn persist_load_roundtrip(tree in tree_strategy()) {
            let store = InMemoryObjectStore::new();
            let (root, _) = tree.persist(&store).unwrap();
            let loaded = Tree::load(&store, &root).unwrap();
            prop_assert_eq!(&loaded, &tree);
            prop_assert_eq!(loaded.digest().unwrap(), root);
        }

        #[test]
        fn update_only_rehashes_the_ancestor_path(
            tree in tree_strategy(),
            target in any::<prop::sample::Index>(),
        ) {
            let id = pick(&tree, target);
            let edited = tree.update(&id, "edited!").unwrap();

            let before = Navigator::new(&tree);
            let after = Navigator::new(&edited);
            let mut path: Vec<&str> = before
                .ancestors(id.as_str())
                .unwrap()
                .iter()
                .map(|n| n.id().as_str())
                .collect();
            path.push(id.as_str());

            for node in before.preorder() {
                let key = node.id().as_str();
                let new = after.get(key).unwrap();
                if path.contains(&key) {
                    continue;
                }
                prop_assert_eq!(node.digest().unwrap(), new.digest().unwrap());
            }
        }

        #[test]
        fn delete_removes_every_descendant(
            tree in tree_strategy(),
            target in any::<prop::sample::Index>(),
        ) {
            let id = pick(&tree, target);
            prop_assume!(!id.is_root());
            let nav = Navigator::new(&tree);
            let parent = nav.parent_id(id.as_str()).unwrap().clone();
            let doomed = nav.descendants(id.as_str()).unwrap();

            let pruned = tree.delete(&id).unwrap();
            prop_assert!(!pruned.contains(id.as_str()));
            for node in &doomed {
                prop_assert!(!pruned.contains(node.id().as_str()));
            }
            prop_assert_eq!(pruned.len(), tree.len() - doomed.len() - 1);
            let siblings = pruned.get(parent.as_str()).unwrap().children();
            prop_assert!(siblings.iter().all(|c| c.id() != &id));
        }

        #[test]
        fn move_into_own_subtree_is_rejected(
            tree in tree_strategy(),
            source in any::<prop::sample::Index>(),
            target in any::<prop::sample::Index>(),
            position in 0usize..4,
        ) {
            let s = pick(&tree, source);
            let nav = Navigator::new(&tree);
            let subtree = nav.descendants(s.as_str()).unwrap();
            let t = if subtree.is_empty() {
                s.clone()
            } else {
                target.get(&subtree).id().clone()
            };
            let result = tree.move_node(&s, &t, position);
            prop_assert!(matches!(result, Err(TreeError::InvalidOperation(_))));
        }

        #[test]
        fn valid_moves_preserve_node_set(
            tree in tree_strategy(),
            source in any::<prop::sample::Index>(),
            target in any::<prop::sample::Index>(),
            position in 0usize..4,
        ) {
            let s = pick(&tree, source);
            let t = pick(&tree, target);
            let nav = Navigator::new(&tree);
            prop_assume!(!s.is_root() && s != t && !nav.is_descendant(t.as_str(), s.as_str()));

            let moved = tree.move_node(&s, &t, position).unwrap();
            prop_assert_eq!(moved.len(), tree.len());
            let after = Navigator::new(&moved);
            prop_assert_eq!(after.parent_id(s.as_str()), Some(&t));
            prop_assert_eq!(moved.get(s.as_str()).unwrap(), tree.get(s.as_str()).unwrap());
        }
    }
}
