//! Error types for tree edits and persistence.

use arbor_types::NodeId;

/// Errors from tree operations. A failed edit never changes the tree it was
/// applied to.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// The referenced node does not exist in the tree.
    #[error("node not found: {0}")]
    NotFound(NodeId),

    /// The edit would break a structural invariant (root removal, cycles,
    /// duplicate ids).
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Reading or writing tree objects failed.
    #[error("store error: {0}")]
    Store(#[from] arbor_store::StoreError),
}

impl TreeError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidOperation(reason.into())
    }
}

/// Convenience alias for tree results.
pub type TreeResult<T> = Result<T, TreeError>;
