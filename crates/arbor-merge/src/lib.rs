//! Merge engine for Arbor.
//!
//! [`merge_trees`] reconciles two divergent versions of a document against
//! their common ancestor. It is a pure function of its three input trees:
//! the same inputs always yield the same merged tree and the same conflict
//! list, so a caller can retry or discard a merge freely.
//!
//! Nodes are matched by id. Content is merged per node; structure (parent
//! and sibling order) is merged per parent. Divergent content never fails
//! the merge: the node keeps a provisional value and a [`Conflict`] is
//! reported for the caller to resolve.

pub mod conflict;
pub mod error;
pub mod merge;

pub use conflict::{Conflict, ConflictKind};
pub use error::{MergeError, MergeResult};
pub use merge::{merge_trees, MergeOutcome};
