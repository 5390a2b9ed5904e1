use std::collections::HashSet;

use tracing::{debug, info, warn};

use arbor_dag::{CommitGraph, CommitNode};
use arbor_diff::{diff_stored_trees, diff_trees, TreeDiff};
use arbor_merge::{merge_trees, Conflict};
use arbor_store::{verify_reachable, CommitObject, ObjectBundle, ObjectStore, StoreError};
use arbor_tree::{Node, Tree};
use arbor_types::{NodeId, ObjectId, Timestamp};

use crate::config::RepositoryConfig;
use crate::error::{SdkError, SdkResult};
use crate::status::Status;

/// What a call to [`Repository::merge`] did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MergeReport {
    /// The incoming head was already part of our history.
    UpToDate,
    /// Our head was an ancestor of the incoming one; its tree was adopted.
    FastForward { head: ObjectId },
    /// Divergent histories merged without conflicts into a new merge commit.
    Merged { head: ObjectId },
    /// Divergent histories with conflicts; the repository is now in
    /// [`Status::MergeConflict`].
    Conflicted { conflicts: Vec<Conflict> },
}

/// The version controller: one working tree, one status, and the history
/// behind them.
///
/// Every operation either succeeds completely or leaves the working tree
/// and status as they were. The object store may still have grown, which
/// is harmless since it never loses anything.
pub struct Repository<S> {
    store: S,
    config: RepositoryConfig,
    graph: CommitGraph,
    status: Status,
    working: Tree,
    resolved: HashSet<NodeId>,
}

impl<S: ObjectStore> Repository<S> {
    /// A repository with no commits and a root-only working tree.
    pub fn init(store: S, config: RepositoryConfig) -> Self {
        Self {
            store,
            config,
            graph: CommitGraph::new(),
            status: Status::Bare,
            working: Tree::new(),
            resolved: HashSet::new(),
        }
    }

    /// Reopen a repository whose status was saved earlier.
    ///
    /// The working tree starts as the tree of the status head. During a
    /// merge, callers restore the merged tree with
    /// [`set_working_tree`](Self::set_working_tree).
    pub fn open(store: S, config: RepositoryConfig, status: Status) -> SdkResult<Self> {
        let graph = CommitGraph::load(&store, &status.parents())?;
        let working = match status.head() {
            Some(head) => Tree::load(&store, &graph.get(&head)?.tree)?,
            None => Tree::new(),
        };
        debug!(%status, commits = graph.len(), "opened repository");
        Ok(Self {
            store,
            config,
            graph,
            status,
            working,
            resolved: HashSet::new(),
        })
    }

    // ---- Accessors ----

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn head(&self) -> Option<ObjectId> {
        self.status.head()
    }

    pub fn graph(&self) -> &CommitGraph {
        &self.graph
    }

    pub fn working_tree(&self) -> &Tree {
        &self.working
    }

    /// Replace the working tree wholesale, e.g. with a document edited
    /// outside the repository.
    pub fn set_working_tree(&mut self, tree: Tree) {
        self.working = tree;
    }

    // ---- Edits on the working tree ----

    pub fn insert(&mut self, node: Node, parent: &NodeId, position: usize) -> SdkResult<()> {
        self.working = self.working.insert(node, parent, position)?;
        Ok(())
    }

    pub fn delete(&mut self, id: &NodeId) -> SdkResult<()> {
        self.working = self.working.delete(id)?;
        Ok(())
    }

    pub fn update(&mut self, id: &NodeId, content: impl Into<String>) -> SdkResult<()> {
        self.working = self.working.update(id, content)?;
        Ok(())
    }

    pub fn move_node(&mut self, id: &NodeId, new_parent: &NodeId, position: usize) -> SdkResult<()> {
        self.working = self.working.move_node(id, new_parent, position)?;
        Ok(())
    }

    // ---- Commit ----

    /// Store the working tree and record it as a new commit.
    ///
    /// Parents come from the status: none when bare, the head when clean,
    /// and both heads while a merge is pending. With
    /// [`RepositoryConfig::require_resolution`] set, a pending merge only
    /// commits once every conflict is resolved.
    pub fn commit(&mut self, author: &str) -> SdkResult<ObjectId> {
        if self.config.require_resolution {
            let pending: Vec<String> = self.unresolved().iter().map(|c| c.id.to_string()).collect();
            if !pending.is_empty() {
                return Err(SdkError::InvalidOperation(format!(
                    "unresolved conflicts on nodes {}",
                    pending.join(", ")
                )));
            }
        }
        let tree = self.working.clone();
        let parents = self.status.parents();
        let id = self.record_commit(&tree, parents, author)?;
        self.status = Status::Clean { head: id };
        self.resolved.clear();
        Ok(id)
    }

    fn record_commit(&mut self, tree: &Tree, parents: Vec<ObjectId>, author: &str) -> SdkResult<ObjectId> {
        let (tree_id, stats) = tree.persist(&self.store)?;
        let commit = CommitObject::new(tree_id, parents, author, Timestamp::now());
        let id = self.store.write(&commit.to_stored_object()?)?;
        let merge = commit.is_merge();
        if !self.graph.contains(&id) {
            self.graph.add_node(CommitNode::from_commit(id, commit))?;
        }
        info!(
            head = %id.short_hex(),
            tree = %tree_id.short_hex(),
            written = stats.written,
            reused = stats.reused,
            merge,
            "committed"
        );
        Ok(id)
    }

    /// Conflicts of the pending merge that still carry their provisional
    /// content. A conflict counts as resolved once its node was edited,
    /// deleted, or passed to [`resolve`](Self::resolve).
    pub fn unresolved(&self) -> Vec<&Conflict> {
        self.status
            .conflicts()
            .iter()
            .filter(|c| {
                !self.resolved.contains(&c.id)
                    && self
                        .working
                        .get(c.id.as_str())
                        .is_some_and(|node| Some(node.content()) == c.provisional())
            })
            .collect()
    }

    /// Accept the current content of a conflicting node as is.
    pub fn resolve(&mut self, id: &NodeId) -> SdkResult<()> {
        if !self.status.conflict_ids().contains(&id) {
            return Err(SdkError::InvalidOperation(format!("node {id} has no pending conflict")));
        }
        self.resolved.insert(id.clone());
        Ok(())
    }

    // ---- Checkout ----

    /// Make the tree of commit `sha` the working tree.
    pub fn checkout(&mut self, sha: &ObjectId) -> SdkResult<()> {
        let commit = self.store.load_commit(sha)?;
        let tree = Tree::load(&self.store, &commit.tree)?;
        self.graph.extend_from_store(&self.store, *sha)?;
        if self.is_dirty()? {
            warn!(target_head = %sha.short_hex(), "checkout discards uncommitted edits");
        }
        self.working = tree;
        self.status = Status::Clean { head: *sha };
        self.resolved.clear();
        info!(head = %sha.short_hex(), "checked out");
        Ok(())
    }

    // ---- Merge ----

    /// Reconcile the working tree with the history ending at `incoming`,
    /// whose objects must already be in the store.
    ///
    /// A divergent merge that produces no conflicts is committed right
    /// away, with our head and `incoming` as parents and the configured
    /// author. Histories that share no commit merge against an empty tree.
    pub fn merge(&mut self, incoming: &ObjectId) -> SdkResult<MergeReport> {
        if self.check_no_pending_merge(incoming)? {
            return Ok(MergeReport::UpToDate);
        }
        self.graph.extend_from_store(&self.store, *incoming)?;
        let Some(head) = self.head() else {
            return self.fast_forward(incoming);
        };
        if self.graph.is_ancestor(incoming, &head)? {
            debug!(head = %head.short_hex(), incoming = %incoming.short_hex(), "already up to date");
            return Ok(MergeReport::UpToDate);
        }
        if self.graph.is_ancestor(&head, incoming)? {
            return self.fast_forward(incoming);
        }

        let base = match self.graph.merge_base(&head, incoming)? {
            Some(base) => self.tree_at(&base)?,
            None => {
                warn!(head = %head.short_hex(), incoming = %incoming.short_hex(), "no common history");
                Tree::new()
            }
        };
        let theirs = self.tree_at(incoming)?;
        let outcome = merge_trees(&base, &self.working, &theirs)?;

        if outcome.is_clean() {
            let author = self.config.author.clone();
            let id = self.record_commit(&outcome.tree, vec![head, *incoming], &author)?;
            self.working = outcome.tree;
            self.status = Status::Clean { head: id };
            return Ok(MergeReport::Merged { head: id });
        }

        warn!(
            ours = %head.short_hex(),
            theirs = %incoming.short_hex(),
            conflicts = outcome.conflicts.len(),
            "merge stopped with conflicts"
        );
        self.working = outcome.tree;
        self.status = Status::MergeConflict {
            ours: head,
            theirs: *incoming,
            conflicts: outcome.conflicts.clone(),
        };
        self.resolved.clear();
        Ok(MergeReport::Conflicted {
            conflicts: outcome.conflicts,
        })
    }

    /// While a merge is pending, only its own two heads may be merged again,
    /// and doing so changes nothing. Returns whether `incoming` is one of them.
    fn check_no_pending_merge(&self, incoming: &ObjectId) -> SdkResult<bool> {
        match &self.status {
            Status::MergeConflict { ours, theirs, .. } if incoming == ours || incoming == theirs => {
                debug!(incoming = %incoming.short_hex(), "already part of the pending merge");
                Ok(true)
            }
            Status::MergeConflict { .. } => Err(SdkError::InvalidOperation(
                "a merge is already in progress; commit or check out first".into(),
            )),
            _ => Ok(false),
        }
    }

    fn fast_forward(&mut self, target: &ObjectId) -> SdkResult<MergeReport> {
        let tree = self.tree_at(target)?;
        if self.is_dirty()? {
            warn!(target_head = %target.short_hex(), "fast-forward discards uncommitted edits");
        }
        self.working = tree;
        self.status = Status::Clean { head: *target };
        info!(head = %target.short_hex(), "fast-forwarded");
        Ok(MergeReport::FastForward { head: *target })
    }

    /// Decode a bundle received from a peer, store its objects, and merge
    /// its head.
    pub fn merge_bundle(&mut self, bytes: &[u8]) -> SdkResult<MergeReport> {
        let bundle =
            ObjectBundle::decode(bytes).map_err(|e| SdkError::MalformedInput(e.to_string()))?;
        if self.check_no_pending_merge(&bundle.head)? {
            return Ok(MergeReport::UpToDate);
        }
        let added = bundle.import(&self.store)?;
        let reachable = verify_reachable(&self.store, bundle.head).map_err(|e| match e {
            StoreError::NotFound(_) | StoreError::CorruptObject { .. } => {
                SdkError::MalformedInput(format!("bundle is incomplete: {e}"))
            }
            e => SdkError::Store(e),
        })?;
        debug!(head = %bundle.head.short_hex(), added, reachable, "imported bundle objects");
        self.graph.extend_from_store(&self.store, bundle.head)?;
        self.merge(&bundle.head)
    }

    /// The objects a peer holding `haves` needs to reach our head.
    pub fn bundle_for(&self, haves: &[ObjectId]) -> SdkResult<ObjectBundle> {
        let head = self
            .head()
            .ok_or_else(|| SdkError::InvalidOperation("nothing committed yet".into()))?;
        Ok(ObjectBundle::build(&self.store, head, haves)?)
    }

    // ---- History and inspection ----

    /// Commits reachable from the head, newest first.
    pub fn log(&self, limit: usize) -> SdkResult<Vec<&CommitNode>> {
        match self.head() {
            Some(head) => Ok(self.graph.history(&head, limit)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn read_commit(&self, sha: &ObjectId) -> SdkResult<CommitObject> {
        Ok(self.store.load_commit(sha)?)
    }

    /// The document as recorded by commit `sha`.
    pub fn tree_at(&self, sha: &ObjectId) -> SdkResult<Tree> {
        Ok(Tree::load(&self.store, &self.tree_id_of(sha)?)?)
    }

    fn tree_id_of(&self, sha: &ObjectId) -> SdkResult<ObjectId> {
        match self.graph.get(sha) {
            Ok(node) => Ok(node.tree),
            Err(_) => Ok(self.store.load_commit(sha)?.tree),
        }
    }

    /// Whether the working tree differs from the head's tree (or from an
    /// empty document before the first commit).
    pub fn is_dirty(&self) -> SdkResult<bool> {
        let base = match self.head() {
            Some(head) => self.tree_id_of(&head)?,
            None => Tree::new().digest()?,
        };
        Ok(self.working.digest()? != base)
    }

    /// Changes in the working tree since the head.
    pub fn diff_working(&self) -> SdkResult<TreeDiff> {
        let base = match self.head() {
            Some(head) => self.tree_at(&head)?,
            None => Tree::new(),
        };
        Ok(diff_trees(&base, &self.working))
    }

    /// Changes between the trees of two commits.
    pub fn diff_commits(&self, old: &ObjectId, new: &ObjectId) -> SdkResult<TreeDiff> {
        let old = self.tree_id_of(old)?;
        let new = self.tree_id_of(new)?;
        Ok(diff_stored_trees(&self.store, &old, &new)?)
    }
}
