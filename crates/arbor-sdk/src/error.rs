use thiserror::Error;

use arbor_dag::DagError;
use arbor_diff::DiffError;
use arbor_merge::MergeError;
use arbor_store::StoreError;
use arbor_tree::TreeError;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("history error: {0}")]
    Dag(#[from] DagError),

    #[error("diff error: {0}")]
    Diff(#[from] DiffError),

    #[error("merge error: {0}")]
    Merge(#[from] MergeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of an [`SdkError`], independent of which layer
/// raised it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A node id, object or commit is absent.
    NotFound,
    /// An illegal edit or a call that does not fit the current status.
    InvalidOperation,
    /// A bundle or config file could not be parsed.
    MalformedInput,
    /// The storage medium failed.
    Storage,
}

impl SdkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidOperation(_) => ErrorKind::InvalidOperation,
            Self::MalformedInput(_) | Self::Config(_) => ErrorKind::MalformedInput,
            Self::Store(e) => store_kind(e),
            Self::Tree(e) | Self::Merge(MergeError::Tree(e)) | Self::Diff(DiffError::Tree(e)) => {
                tree_kind(e)
            }
            Self::Diff(DiffError::Store(e)) => store_kind(e),
            Self::Dag(DagError::CommitNotFound(_) | DagError::DanglingParent { .. }) => {
                ErrorKind::NotFound
            }
            Self::Dag(DagError::DuplicateCommit(_)) => ErrorKind::InvalidOperation,
            Self::Dag(DagError::Store(e)) => store_kind(e),
            Self::Io(_) => ErrorKind::Storage,
        }
    }
}

fn store_kind(err: &StoreError) -> ErrorKind {
    match err {
        StoreError::NotFound(_) => ErrorKind::NotFound,
        StoreError::MalformedBundle(_) => ErrorKind::MalformedInput,
        _ => ErrorKind::Storage,
    }
}

fn tree_kind(err: &TreeError) -> ErrorKind {
    match err {
        TreeError::NotFound(_) => ErrorKind::NotFound,
        TreeError::InvalidOperation(_) => ErrorKind::InvalidOperation,
        TreeError::Store(e) => store_kind(e),
    }
}

pub type SdkResult<T> = Result<T, SdkError>;

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_types::{NodeId, ObjectId};

    #[test]
    fn kinds_follow_the_cause() {
        let missing = ObjectId::from_bytes(b"missing");
        assert_eq!(SdkError::from(StoreError::NotFound(missing)).kind(), ErrorKind::NotFound);
        assert_eq!(
            SdkError::from(TreeError::Store(StoreError::NotFound(missing))).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            SdkError::from(TreeError::NotFound(NodeId::root())).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            SdkError::from(TreeError::InvalidOperation("root".into())).kind(),
            ErrorKind::InvalidOperation
        );
        assert_eq!(
            SdkError::from(StoreError::MalformedBundle("bad magic".into())).kind(),
            ErrorKind::MalformedInput
        );
        assert_eq!(
            SdkError::from(StoreError::Compression("zstd".into())).kind(),
            ErrorKind::Storage
        );
        assert_eq!(SdkError::from(DagError::CommitNotFound(missing)).kind(), ErrorKind::NotFound);
    }
}
