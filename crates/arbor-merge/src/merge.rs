//! Three-way structural merge.
//!
//! The merge runs in four passes:
//!
//! 1. Every id seen on any side gets a content verdict (keep, drop, or keep
//!    provisionally with a conflict).
//! 2. Every kept node gets a placement: the parent from the side that moved
//!    it, or ours when both or neither did.
//! 3. Placements are settled: parents that were dropped but are still
//!    needed are brought back (as conflicts), and cycles created by
//!    combining moves from both sides fall back to ours.
//! 4. Siblings are ordered per parent and the tree is assembled bottom-up,
//!    reusing any input subtree that came through unchanged.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use arbor_tree::{Navigator, Node, Tree};
use arbor_types::NodeId;

use crate::conflict::{Conflict, ConflictKind};
use crate::error::MergeResult;

/// Result of [`merge_trees`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeOutcome {
    /// The merged document. Conflicting nodes carry provisional content.
    pub tree: Tree,
    /// Unresolved nodes in pre-order of `tree`.
    pub conflicts: Vec<Conflict>,
}

impl MergeOutcome {
    fn clean(tree: &Tree) -> Self {
        Self {
            tree: tree.clone(),
            conflicts: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn conflict_ids(&self) -> Vec<NodeId> {
        self.conflicts.iter().map(|c| c.id.clone()).collect()
    }
}

/// Merge `ours` and `theirs`, both descended from `base`.
pub fn merge_trees(base: &Tree, ours: &Tree, theirs: &Tree) -> MergeResult<MergeOutcome> {
    if ours == theirs || base == theirs {
        return Ok(MergeOutcome::clean(ours));
    }
    if base == ours {
        return Ok(MergeOutcome::clean(theirs));
    }

    let mut merger = Merger::new(base, ours, theirs);
    merger.collect();
    merger.settle();
    let kids = merger.children_by_parent();
    let root = merger.build(NodeId::ROOT, &kids);
    let tree = Tree::from_node(root)?;

    let mut pending = merger.conflicts;
    let conflicts: Vec<Conflict> = Navigator::new(&tree)
        .preorder()
        .iter()
        .filter_map(|node| pending.remove(node.id().as_str()))
        .collect();
    debug!(
        nodes = tree.len(),
        conflicts = conflicts.len(),
        "merged trees"
    );
    Ok(MergeOutcome { tree, conflicts })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    Ours,
    Theirs,
}

enum Verdict<'a> {
    Drop,
    Keep(&'a str),
    Conflict(ConflictKind, &'a str),
}

/// Content verdict from the three versions of one node.
fn decide<'a>(base: Option<&'a str>, ours: Option<&'a str>, theirs: Option<&'a str>) -> Verdict<'a> {
    match (base, ours, theirs) {
        (_, None, None) => Verdict::Drop,
        (Some(b), Some(o), Some(t)) => {
            if o == t || t == b {
                Verdict::Keep(o)
            } else if o == b {
                Verdict::Keep(t)
            } else {
                Verdict::Conflict(ConflictKind::Content, o)
            }
        }
        (Some(b), Some(o), None) if o == b => Verdict::Drop,
        (Some(_), Some(o), None) => Verdict::Conflict(ConflictKind::DeleteModify, o),
        (Some(b), None, Some(t)) if t == b => Verdict::Drop,
        (Some(_), None, Some(t)) => Verdict::Conflict(ConflictKind::DeleteModify, t),
        (None, Some(o), Some(t)) if o == t => Verdict::Keep(o),
        (None, Some(o), Some(_)) => Verdict::Conflict(ConflictKind::AddAdd, o),
        (None, Some(o), None) => Verdict::Keep(o),
        (None, None, Some(t)) => Verdict::Keep(t),
    }
}

struct Kept<'a> {
    id: &'a NodeId,
    content: &'a str,
    /// Parent in the merged tree and the side it came from. `None` only
    /// for the root.
    placement: Option<(Side, &'a NodeId)>,
}

struct Merger<'a> {
    base: Navigator<'a>,
    ours: Navigator<'a>,
    theirs: Navigator<'a>,
    ours_root: &'a Arc<Node>,
    theirs_root: &'a Arc<Node>,
    kept: HashMap<&'a str, Kept<'a>>,
    /// Kept ids in discovery order, so every pass is deterministic.
    order: Vec<&'a str>,
    conflicts: HashMap<&'a str, Conflict>,
}

impl<'a> Merger<'a> {
    fn new(base: &'a Tree, ours: &'a Tree, theirs: &'a Tree) -> Self {
        Self {
            base: Navigator::new(base),
            ours: Navigator::new(ours),
            theirs: Navigator::new(theirs),
            ours_root: ours.root_arc(),
            theirs_root: theirs.root_arc(),
            kept: HashMap::new(),
            order: Vec::new(),
            conflicts: HashMap::new(),
        }
    }

    fn contents(&self, id: &str) -> (Option<&'a str>, Option<&'a str>, Option<&'a str>) {
        (
            self.base.get(id).map(Node::content),
            self.ours.get(id).map(Node::content),
            self.theirs.get(id).map(Node::content),
        )
    }

    fn lookup(&self, id: &str) -> Option<&'a Node> {
        self.ours
            .get(id)
            .or_else(|| self.theirs.get(id))
            .or_else(|| self.base.get(id))
    }

    fn collect(&mut self) {
        let candidates: Vec<&'a Node> = self
            .ours
            .preorder()
            .iter()
            .chain(self.theirs.preorder())
            .chain(self.base.preorder())
            .copied()
            .collect();
        let mut seen = HashSet::new();
        for node in candidates {
            let id = node.id().as_str();
            if !seen.insert(id) {
                continue;
            }
            let (b, o, t) = self.contents(id);
            match decide(b, o, t) {
                Verdict::Drop => {}
                Verdict::Keep(content) => self.keep(node.id(), content),
                Verdict::Conflict(kind, content) => {
                    self.record_conflict(node.id(), kind);
                    self.keep(node.id(), content);
                }
            }
        }
    }

    fn keep(&mut self, id: &'a NodeId, content: &'a str) {
        let placement = self.placement(id.as_str());
        self.kept.insert(
            id.as_str(),
            Kept {
                id,
                content,
                placement,
            },
        );
        self.order.push(id.as_str());
    }

    fn record_conflict(&mut self, id: &'a NodeId, kind: ConflictKind) {
        let (base, ours, theirs) = self.contents(id.as_str());
        self.conflicts.insert(
            id.as_str(),
            Conflict {
                id: id.clone(),
                kind,
                base: base.map(str::to_string),
                ours: ours.map(str::to_string),
                theirs: theirs.map(str::to_string),
            },
        );
    }

    /// A node moved on exactly one side follows that side; otherwise ours.
    fn placement(&self, id: &str) -> Option<(Side, &'a NodeId)> {
        let base = self.base.parent_id(id);
        match (self.ours.parent_id(id), self.theirs.parent_id(id)) {
            (Some(o), Some(t)) if base == Some(o) && base != Some(t) => Some((Side::Theirs, t)),
            (Some(o), _) => Some((Side::Ours, o)),
            (None, Some(t)) => Some((Side::Theirs, t)),
            (None, None) => None,
        }
    }

    fn settle(&mut self) {
        loop {
            if self.resurrect_missing_parents() {
                continue;
            }
            if let Some(cycle) = self.find_cycle() {
                self.fall_back_to_ours(&cycle);
                continue;
            }
            break;
        }
    }

    /// Bring back every dropped node that a kept node still hangs under.
    fn resurrect_missing_parents(&mut self) -> bool {
        let missing: Vec<&'a str> = self
            .order
            .iter()
            .filter_map(|id| self.kept[id].placement)
            .map(|(_, parent)| parent.as_str())
            .filter(|parent| !self.kept.contains_key(parent))
            .collect();
        let mut revived = false;
        for id in missing {
            if self.kept.contains_key(id) {
                continue;
            }
            let Some(node) = self.lookup(id) else { continue };
            let (_, ours, theirs) = self.contents(id);
            self.record_conflict(node.id(), ConflictKind::DeleteModify);
            self.keep(node.id(), ours.or(theirs).unwrap_or(node.content()));
            debug!(node = %node.id(), "resurrected deleted parent");
            revived = true;
        }
        revived
    }

    fn find_cycle(&self) -> Option<Vec<&'a str>> {
        for &start in &self.order {
            let mut path = Vec::new();
            let mut on_path = HashSet::new();
            let mut cursor = start;
            loop {
                if !on_path.insert(cursor) {
                    let from = path.iter().position(|p| *p == cursor).unwrap_or(0);
                    return Some(path[from..].to_vec());
                }
                path.push(cursor);
                match self.kept.get(cursor).and_then(|k| k.placement) {
                    Some((_, parent)) => cursor = parent.as_str(),
                    None => break,
                }
            }
        }
        None
    }

    fn fall_back_to_ours(&mut self, cycle: &[&'a str]) {
        warn!(nodes = ?cycle, "combined moves form a cycle; keeping our placement");
        let mut changed = false;
        for id in cycle {
            let Some(kept) = self.kept.get_mut(id) else { continue };
            if let (Some((Side::Theirs, _)), Some(parent)) = (kept.placement, self.ours.parent_id(id)) {
                kept.placement = Some((Side::Ours, parent));
                changed = true;
            }
        }
        // Only reachable with nodes absent from ours; hang one off the root.
        if !changed {
            if let Some(kept) = cycle.first().and_then(|id| self.kept.get_mut(id)) {
                kept.placement = Some((Side::Ours, self.ours_root.id()));
            }
        }
    }

    fn children_by_parent(&self) -> HashMap<&'a str, Vec<&'a str>> {
        let mut members: HashMap<&'a str, Vec<&'a str>> = HashMap::new();
        for &id in &self.order {
            if let Some((_, parent)) = self.kept[id].placement {
                members.entry(parent.as_str()).or_default().push(id);
            }
        }
        members
            .into_iter()
            .map(|(parent, ids)| (parent, self.order_children(parent, &ids)))
            .collect()
    }

    /// Sibling order under one parent.
    ///
    /// Ours is the primary order unless only theirs reordered the siblings
    /// both share with base. Nodes missing from the primary order are placed
    /// right after their nearest preceding sibling on the other side.
    fn order_children(&self, parent: &str, members: &[&'a str]) -> Vec<&'a str> {
        let wanted: HashSet<&str> = members.iter().copied().collect();
        let listed = |nav: &Navigator<'a>| -> Vec<&'a str> {
            nav.children(parent)
                .unwrap_or_default()
                .iter()
                .map(|c| c.id().as_str())
                .filter(|id| wanted.contains(id))
                .collect()
        };
        let base = listed(&self.base);
        let ours = listed(&self.ours);
        let theirs = listed(&self.theirs);

        let (mut result, secondary) = if !reordered(&base, &ours) && reordered(&base, &theirs) {
            (theirs, ours)
        } else {
            (ours, theirs)
        };
        for (i, id) in secondary.iter().enumerate() {
            if result.contains(id) {
                continue;
            }
            let at = secondary[..i]
                .iter()
                .rev()
                .find_map(|prev| result.iter().position(|r| r == prev))
                .map_or(0, |p| p + 1);
            result.insert(at, *id);
        }
        for id in members {
            if !result.contains(id) {
                result.push(*id);
            }
        }
        result
    }

    fn input_subtree(&self, id: &str) -> impl Iterator<Item = &'a Arc<Node>> {
        let shared = |nav: &Navigator<'a>, root: &'a Arc<Node>| -> Option<&'a Arc<Node>> {
            if id == NodeId::ROOT {
                return Some(root);
            }
            let index = nav.index(id)?;
            nav.parent(id)?.children().get(index)
        };
        shared(&self.ours, self.ours_root)
            .into_iter()
            .chain(shared(&self.theirs, self.theirs_root))
    }

    fn build(&self, id: &str, kids: &HashMap<&'a str, Vec<&'a str>>) -> Arc<Node> {
        let kept = &self.kept[id];
        let children: Vec<Arc<Node>> = kids
            .get(id)
            .map(|ids| ids.iter().map(|k| self.build(k, kids)).collect())
            .unwrap_or_default();

        let unchanged = |existing: &Arc<Node>| {
            existing.content() == kept.content
                && existing.children().len() == children.len()
                && existing
                    .children()
                    .iter()
                    .zip(&children)
                    .all(|(a, b)| Arc::ptr_eq(a, b))
        };
        if let Some(existing) = self.input_subtree(id).find(|e| unchanged(e)) {
            return Arc::clone(existing);
        }
        Arc::new(Node::with_children(kept.id.clone(), kept.content, children))
    }
}

/// Whether `side` changed the relative order of the nodes it shares with
/// `base`.
fn reordered(base: &[&str], side: &[&str]) -> bool {
    let from_base = base.iter().filter(|id| side.contains(id));
    let from_side = side.iter().filter(|id| base.contains(id));
    !from_base.eq(from_side)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_tree::NodeSpec;

    fn nid(s: &str) -> NodeId {
        NodeId::new(s).unwrap()
    }

    fn leaf(id: &str, content: &str) -> NodeSpec {
        NodeSpec::new(nid(id), content)
    }

    /// 0 ─┬─ 1 "A" ─┬─ 11 "a"
    ///    │          └─ 12 "b"
    ///    ├─ 2 "B"
    ///    └─ 3 "C"
    fn base() -> Tree {
        let spec = NodeSpec::new(NodeId::root(), "")
            .with_child(leaf("1", "A").with_child(leaf("11", "a")).with_child(leaf("12", "b")))
            .with_child(leaf("2", "B"))
            .with_child(leaf("3", "C"));
        Tree::from_spec(&spec).unwrap()
    }

    fn child_ids(tree: &Tree, id: &str) -> Vec<String> {
        tree.get(id)
            .unwrap()
            .children()
            .iter()
            .map(|c| c.id().to_string())
            .collect()
    }

    #[test]
    fn disjoint_edits_merge_cleanly() {
        let ours = base().update(&nid("2"), "B'").unwrap();
        let theirs = base().update(&nid("3"), "C'").unwrap();
        let outcome = merge_trees(&base(), &ours, &theirs).unwrap();
        assert!(outcome.is_clean());
        assert_eq!(outcome.tree.get("2").unwrap().content(), "B'");
        assert_eq!(outcome.tree.get("3").unwrap().content(), "C'");
    }

    #[test]
    fn divergent_content_conflicts_with_ours_provisional() {
        let ours = base().update(&nid("1"), "A1").unwrap();
        let theirs = base().update(&nid("1"), "A2").unwrap();
        let outcome = merge_trees(&base(), &ours, &theirs).unwrap();
        assert_eq!(outcome.conflict_ids(), vec![nid("1")]);
        assert_eq!(
            outcome.conflicts[0],
            Conflict {
                id: nid("1"),
                kind: ConflictKind::Content,
                base: Some("A".into()),
                ours: Some("A1".into()),
                theirs: Some("A2".into()),
            }
        );
        assert_eq!(outcome.tree.get("1").unwrap().content(), "A1");
    }

    #[test]
    fn same_edit_on_both_sides_is_clean() {
        let ours = base().update(&nid("1"), "same").unwrap();
        let theirs = base().update(&nid("1"), "same").unwrap().update(&nid("2"), "x").unwrap();
        let outcome = merge_trees(&base(), &ours, &theirs).unwrap();
        assert!(outcome.is_clean());
        assert_eq!(outcome.tree.get("1").unwrap().content(), "same");
    }

    #[test]
    fn delete_against_unchanged_deletes() {
        let ours = base().delete(&nid("1")).unwrap();
        let theirs = base().update(&nid("3"), "C'").unwrap();
        let outcome = merge_trees(&base(), &ours, &theirs).unwrap();
        assert!(outcome.is_clean());
        assert!(!outcome.tree.contains("1"));
        assert!(!outcome.tree.contains("11"));
        assert_eq!(child_ids(&outcome.tree, "0"), vec!["2", "3"]);
    }

    #[test]
    fn delete_against_modify_keeps_modified() {
        let ours = base().update(&nid("3"), "C'").unwrap();
        let theirs = base().delete(&nid("3")).unwrap();
        let outcome = merge_trees(&base(), &ours, &theirs).unwrap();
        assert_eq!(outcome.conflict_ids(), vec![nid("3")]);
        assert_eq!(outcome.conflicts[0].kind, ConflictKind::DeleteModify);
        assert_eq!(outcome.conflicts[0].theirs, None);
        assert_eq!(outcome.tree.get("3").unwrap().content(), "C'");
    }

    #[test]
    fn deleted_parent_of_modified_child_is_resurrected() {
        let ours = base().delete(&nid("1")).unwrap();
        let theirs = base().update(&nid("12"), "b'").unwrap();
        let outcome = merge_trees(&base(), &ours, &theirs).unwrap();
        assert_eq!(outcome.conflict_ids(), vec![nid("1"), nid("12")]);
        assert_eq!(outcome.tree.get("1").unwrap().content(), "A");
        // "11" was unchanged on the keeping side, so the delete wins for it.
        assert_eq!(child_ids(&outcome.tree, "1"), vec!["12"]);
        assert_eq!(outcome.tree.get("12").unwrap().content(), "b'");
    }

    #[test]
    fn inserts_on_both_sides_are_kept_in_place() {
        let ours = base().insert(Node::new(nid("o"), "ours"), &NodeId::root(), 1).unwrap();
        let theirs = base().insert(Node::new(nid("t"), "theirs"), &NodeId::root(), 3).unwrap();
        let outcome = merge_trees(&base(), &ours, &theirs).unwrap();
        assert!(outcome.is_clean());
        assert_eq!(child_ids(&outcome.tree, "0"), vec!["1", "o", "2", "3", "t"]);
    }

    #[test]
    fn same_id_added_twice_conflicts() {
        let ours = base().insert(Node::new(nid("n"), "x"), &nid("2"), 0).unwrap();
        let theirs = base().insert(Node::new(nid("n"), "y"), &nid("2"), 0).unwrap();
        let outcome = merge_trees(&base(), &ours, &theirs).unwrap();
        assert_eq!(outcome.conflicts.len(), 1);
        assert_eq!(outcome.conflicts[0].kind, ConflictKind::AddAdd);
        assert_eq!(outcome.conflicts[0].base, None);
        assert_eq!(outcome.tree.get("n").unwrap().content(), "x");
    }

    #[test]
    fn move_on_one_side_and_edit_on_other() {
        let ours = base().update(&nid("11"), "a'").unwrap();
        let theirs = base().move_node(&nid("11"), &nid("3"), 0).unwrap();
        let outcome = merge_trees(&base(), &ours, &theirs).unwrap();
        assert!(outcome.is_clean());
        assert_eq!(child_ids(&outcome.tree, "3"), vec!["11"]);
        assert_eq!(child_ids(&outcome.tree, "1"), vec!["12"]);
        assert_eq!(outcome.tree.get("11").unwrap().content(), "a'");
    }

    #[test]
    fn both_sides_move_same_node_keeps_our_placement() {
        let ours = base().move_node(&nid("11"), &nid("2"), 0).unwrap();
        let theirs = base()
            .move_node(&nid("11"), &nid("3"), 0)
            .unwrap()
            .update(&nid("11"), "a'")
            .unwrap();
        let outcome = merge_trees(&base(), &ours, &theirs).unwrap();
        assert!(outcome.is_clean());
        assert_eq!(child_ids(&outcome.tree, "2"), vec!["11"]);
        assert!(child_ids(&outcome.tree, "3").is_empty());
        assert_eq!(child_ids(&outcome.tree, "1"), vec!["12"]);
        assert_eq!(outcome.tree.get("11").unwrap().content(), "a'");
    }

    #[test]
    fn crossing_moves_fall_back_to_ours() {
        let ours = base().move_node(&nid("2"), &nid("3"), 0).unwrap();
        let theirs = base().move_node(&nid("3"), &nid("2"), 0).unwrap();
        let outcome = merge_trees(&base(), &ours, &theirs).unwrap();
        assert!(outcome.is_clean());
        assert_eq!(child_ids(&outcome.tree, "3"), vec!["2"]);
        assert_eq!(child_ids(&outcome.tree, "0"), vec!["1", "3"]);
    }

    #[test]
    fn reorder_on_their_side_only_wins() {
        let ours = base().update(&nid("2"), "B'").unwrap();
        let theirs = base().move_node(&nid("3"), &NodeId::root(), 0).unwrap();
        let outcome = merge_trees(&base(), &ours, &theirs).unwrap();
        assert_eq!(child_ids(&outcome.tree, "0"), vec!["3", "1", "2"]);
        assert_eq!(outcome.tree.get("2").unwrap().content(), "B'");
    }

    #[test]
    fn untouched_subtrees_are_shared() {
        let ours = base().update(&nid("2"), "B'").unwrap();
        let theirs = base().update(&nid("3"), "C'").unwrap();
        let outcome = merge_trees(&base(), &ours, &theirs).unwrap();
        let merged = &outcome.tree.root().children()[0];
        assert!(Arc::ptr_eq(merged, &ours.root().children()[0]));
    }

    #[test]
    fn merge_is_deterministic() {
        let ours = base()
            .update(&nid("1"), "A1")
            .unwrap()
            .insert(Node::new(nid("x"), ""), &nid("1"), 1)
            .unwrap();
        let theirs = base()
            .update(&nid("1"), "A2")
            .unwrap()
            .move_node(&nid("12"), &nid("2"), 0)
            .unwrap();
        let first = merge_trees(&base(), &ours, &theirs).unwrap();
        let second = merge_trees(&base(), &ours, &theirs).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.tree.digest().unwrap(), second.tree.digest().unwrap());
    }

    #[test]
    fn one_sided_change_fast_paths() {
        let edited = base().update(&nid("1"), "A!").unwrap();
        assert_eq!(merge_trees(&base(), &base(), &edited).unwrap().tree, edited);
        assert_eq!(merge_trees(&base(), &edited, &base()).unwrap().tree, edited);
    }

    proptest::proptest! {
        #![proptest_config(proptest::prelude::ProptestConfig { cases: 64, .. Default::default() })]

        #[test]
        fn single_node_edits_conflict_only_when_they_collide(
            ours_target in 0usize..6,
            theirs_target in 0usize..6,
            ours_text in "[xy]{1,2}",
            theirs_text in "[xy]{1,2}",
        ) {
            let ids = ["0", "1", "11", "12", "2", "3"];
            let (o, t) = (nid(ids[ours_target]), nid(ids[theirs_target]));
            let ours = base().update(&o, ours_text.clone()).unwrap();
            let theirs = base().update(&t, theirs_text.clone()).unwrap();
            let outcome = merge_trees(&base(), &ours, &theirs).unwrap();

            let collide = o == t && ours_text != theirs_text;
            proptest::prop_assert_eq!(outcome.conflict_ids(), if collide { vec![o.clone()] } else { vec![] });
            proptest::prop_assert_eq!(outcome.tree.get(o.as_str()).unwrap().content(), ours_text.as_str());
            if o != t {
                proptest::prop_assert_eq!(outcome.tree.get(t.as_str()).unwrap().content(), theirs_text.as_str());
            }
        }
    }
}
