//! The commit graph and its traversal algorithms.
//!
//! [`CommitGraph`] stores commits in a [`HashMap`] and keeps a forward-edge
//! index (`children`) next to the parent edges carried by each commit.
//!
//! # Invariants
//!
//! - The graph is acyclic: a commit's id covers its parents' ids, so a
//!   commit can only name parents that existed before it.
//! - Every parent reference resolves to a commit in the graph.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use tracing::debug;

use arbor_store::ObjectStore;
use arbor_types::{ObjectId, Timestamp};

use crate::error::{DagError, DagResult};
use crate::node::CommitNode;

/// In-memory view of commit history.
#[derive(Clone, Debug, Default)]
pub struct CommitGraph {
    nodes: HashMap<ObjectId, CommitNode>,
    children: HashMap<ObjectId, Vec<ObjectId>>,
    roots: Vec<ObjectId>,
}

impl CommitGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every commit reachable from `heads`.
    pub fn load(store: &dyn ObjectStore, heads: &[ObjectId]) -> DagResult<Self> {
        let mut graph = Self::new();
        for head in heads {
            graph.extend_from_store(store, *head)?;
        }
        Ok(graph)
    }

    /// Add every commit reachable from `head` that the graph lacks.
    ///
    /// Returns how many commits were added. Stops descending at commits
    /// already present, so extending with a new head after a fetch only
    /// reads the new part of history.
    pub fn extend_from_store(&mut self, store: &dyn ObjectStore, head: ObjectId) -> DagResult<usize> {
        let mut pending = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([head]);
        while let Some(id) = queue.pop_front() {
            if self.nodes.contains_key(&id) || !seen.insert(id) {
                continue;
            }
            let node = CommitNode::from_commit(id, store.load_commit(&id)?);
            queue.extend(node.parents.iter().copied());
            pending.push(node);
        }

        // BFS from the head discovers children before parents; add in the
        // opposite order, deferring any commit whose parents are still queued.
        let added = pending.len();
        let mut waiting: VecDeque<CommitNode> = pending.into_iter().rev().collect();
        let mut stalled = 0;
        while let Some(node) = waiting.pop_front() {
            if node.parents.iter().all(|p| self.nodes.contains_key(p)) {
                self.add_node(node)?;
                stalled = 0;
            } else {
                stalled += 1;
                if stalled > waiting.len() {
                    let parent = node
                        .parents
                        .iter()
                        .find(|p| !self.nodes.contains_key(p))
                        .copied()
                        .unwrap_or(node.id);
                    return Err(DagError::DanglingParent {
                        commit: node.id,
                        parent,
                    });
                }
                waiting.push_back(node);
            }
        }
        if added > 0 {
            debug!(head = %head.short_hex(), added, total = self.len(), "extended commit graph");
        }
        Ok(added)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.nodes.contains_key(id)
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    /// Add a commit. All of its parents must already be present.
    pub fn add_node(&mut self, node: CommitNode) -> DagResult<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(DagError::DuplicateCommit(node.id));
        }
        for parent in &node.parents {
            if !self.nodes.contains_key(parent) {
                return Err(DagError::DanglingParent {
                    commit: node.id,
                    parent: *parent,
                });
            }
        }
        for parent in &node.parents {
            self.children.entry(*parent).or_default().push(node.id);
        }
        if node.is_root() {
            self.roots.push(node.id);
        }
        self.nodes.insert(node.id, node);
        Ok(())
    }

    pub fn get(&self, id: &ObjectId) -> DagResult<&CommitNode> {
        self.nodes.get(id).ok_or(DagError::CommitNotFound(*id))
    }

    /// Commits without parents.
    pub fn roots(&self) -> Vec<&CommitNode> {
        self.roots.iter().filter_map(|id| self.nodes.get(id)).collect()
    }

    /// Direct children of `id`, i.e. commits naming it as a parent.
    pub fn children(&self, id: &ObjectId) -> Vec<&CommitNode> {
        self.children
            .get(id)
            .map(|ids| ids.iter().filter_map(|c| self.nodes.get(c)).collect())
            .unwrap_or_default()
    }

    // ---------------------------------------------------------------
    // Ancestry
    // ---------------------------------------------------------------

    /// `id` and everything reachable through parent edges.
    pub fn ancestors(&self, id: &ObjectId) -> DagResult<HashSet<ObjectId>> {
        self.get(id)?;
        let mut visited = HashSet::from([*id]);
        let mut queue = VecDeque::from([*id]);
        while let Some(current) = queue.pop_front() {
            if let Some(node) = self.nodes.get(&current) {
                for parent in &node.parents {
                    if visited.insert(*parent) {
                        queue.push_back(*parent);
                    }
                }
            }
        }
        Ok(visited)
    }

    /// Whether `ancestor` is reachable from `descendant` through parent
    /// edges. A commit counts as its own ancestor.
    pub fn is_ancestor(&self, ancestor: &ObjectId, descendant: &ObjectId) -> DagResult<bool> {
        self.get(ancestor)?;
        let start = self.get(descendant)?;
        let mut visited = HashSet::from([start.id]);
        let mut queue = VecDeque::from([start.id]);
        while let Some(current) = queue.pop_front() {
            if current == *ancestor {
                return Ok(true);
            }
            for parent in &self.nodes[&current].parents {
                if self.nodes.contains_key(parent) && visited.insert(*parent) {
                    queue.push_back(*parent);
                }
            }
        }
        Ok(false)
    }

    /// Best common ancestor of two commits.
    ///
    /// Among all common ancestors, those that are themselves ancestors of
    /// another common ancestor are discarded. If several remain (criss-cross
    /// history) the most recent one wins, ties broken by the larger id so
    /// the answer never depends on argument order. `None` when the
    /// histories share no commit.
    pub fn merge_base(&self, a: &ObjectId, b: &ObjectId) -> DagResult<Option<ObjectId>> {
        let ancestors_a = self.ancestors(a)?;
        let ancestors_b = self.ancestors(b)?;
        let common: HashSet<ObjectId> = ancestors_a.intersection(&ancestors_b).copied().collect();

        let mut dominated = HashSet::new();
        for id in &common {
            for parent in &self.nodes[id].parents {
                if !dominated.contains(parent) {
                    dominated.extend(self.ancestors(parent)?);
                }
            }
        }
        let base = common
            .into_iter()
            .filter(|id| !dominated.contains(id))
            .max_by_key(|id| (self.nodes[id].timestamp, *id));
        debug!(
            a = %a.short_hex(),
            b = %b.short_hex(),
            base = ?base.map(|id| id.short_hex()),
            "computed merge base"
        );
        Ok(base)
    }

    // ---------------------------------------------------------------
    // History
    // ---------------------------------------------------------------

    /// Commits reachable from `head`, newest first, at most `limit` of them.
    ///
    /// Walks all parents (not just the first), ordering by timestamp with
    /// ties broken by id, so a child is always listed before its parents
    /// as long as its timestamp is not older.
    pub fn history(&self, head: &ObjectId, limit: usize) -> DagResult<Vec<&CommitNode>> {
        let start = self.get(head)?;
        let mut out = Vec::new();
        let mut seen = HashSet::from([start.id]);
        let mut frontier: BinaryHeap<(Timestamp, ObjectId)> = BinaryHeap::from([(start.timestamp, start.id)]);
        while let Some((_, id)) = frontier.pop() {
            if out.len() >= limit {
                break;
            }
            let node = &self.nodes[&id];
            out.push(node);
            for parent in &node.parents {
                if let Some(p) = self.nodes.get(parent) {
                    if seen.insert(p.id) {
                        frontier.push((p.timestamp, p.id));
                    }
                }
            }
        }
        Ok(out)
    }

    /// Every commit with parents before children. Roots are taken oldest
    /// first; children in timestamp order.
    pub fn topological_order(&self) -> Vec<&CommitNode> {
        let mut in_degree: HashMap<ObjectId, usize> = self
            .nodes
            .values()
            .map(|n| (n.id, n.parents.len()))
            .collect();
        let mut ready: BinaryHeap<Reverse<(Timestamp, ObjectId)>> = self
            .roots
            .iter()
            .map(|id| Reverse((self.nodes[id].timestamp, *id)))
            .collect();

        let mut result = Vec::with_capacity(self.nodes.len());
        while let Some(Reverse((_, id))) = ready.pop() {
            result.push(&self.nodes[&id]);
            for child in self.children.get(&id).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(child) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(Reverse((self.nodes[child].timestamp, *child)));
                    }
                }
            }
        }
        result
    }
}
