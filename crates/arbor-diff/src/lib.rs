//! Diff engine for Arbor documents.
//!
//! # Key Types
//!
//! - [`TreeDiff`] / [`TreeChange`] -- node-level diff keyed by node id
//!   (added, deleted, content changed, moved)
//! - [`ContentDiff`] / [`DiffHunk`] / [`DiffLine`] -- line-level diff of one
//!   node's content, used to show conflicts

pub mod content_diff;
pub mod error;
pub mod tree_diff;

pub use content_diff::{diff_content, ContentDiff, DiffHunk, DiffLine};
pub use error::{DiffError, DiffResult};
pub use tree_diff::{diff_stored_trees, diff_trees, TreeChange, TreeDiff};
