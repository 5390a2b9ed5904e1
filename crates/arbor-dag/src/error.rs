//! Error types for the commit graph.

use arbor_types::ObjectId;

/// Errors that can occur while building or querying a [`CommitGraph`].
///
/// [`CommitGraph`]: crate::CommitGraph
#[derive(Debug, thiserror::Error)]
pub enum DagError {
    /// A referenced commit is not in the graph.
    #[error("commit not found: {0}")]
    CommitNotFound(ObjectId),

    /// A commit names a parent the graph has not seen.
    #[error("dangling parent reference: commit {commit} references missing parent {parent}")]
    DanglingParent {
        /// The commit containing the bad reference.
        commit: ObjectId,
        /// The missing parent.
        parent: ObjectId,
    },

    /// Attempted to add a commit that is already present.
    #[error("duplicate commit: {0}")]
    DuplicateCommit(ObjectId),

    /// Loading commits from the object store failed.
    #[error("store error: {0}")]
    Store(#[from] arbor_store::StoreError),
}

/// Convenience alias for DAG results.
pub type DagResult<T> = Result<T, DagError>;
