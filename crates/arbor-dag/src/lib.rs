//! Commit history graph for Arbor.
//!
//! Commits reference their parents by hash, so the history of any head can
//! be reconstructed from the object store alone. [`CommitGraph`] loads that
//! history into memory with a reverse index and answers the ancestry
//! questions the repository needs: is one commit an ancestor of another,
//! which commit is the merge base of two heads, and what the log looks like.

pub mod dag;
pub mod error;
pub mod node;

pub use dag::CommitGraph;
pub use error::{DagError, DagResult};
pub use node::CommitNode;
