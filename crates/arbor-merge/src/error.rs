//! Error types for the merge engine.

/// Errors from [`merge_trees`](crate::merge_trees).
///
/// Conflicts are not errors; they are reported in the
/// [`MergeOutcome`](crate::MergeOutcome).
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// The merged hierarchy could not be assembled into a valid tree.
    #[error("merged tree is invalid: {0}")]
    Tree(#[from] arbor_tree::TreeError),
}

/// Convenience alias for merge results.
pub type MergeResult<T> = Result<T, MergeError>;
