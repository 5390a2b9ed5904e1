//! High-level SDK for Arbor.
//!
//! [`Repository`] is the version controller: it owns the working tree, the
//! repository [`Status`], and the commit graph, and drives commit, checkout
//! and merge against any [`ObjectStore`]. This is the main entry point for
//! applications embedding Arbor.

pub mod config;
pub mod error;
pub mod repository;
pub mod status;

pub use config::RepositoryConfig;
pub use error::{ErrorKind, SdkError, SdkResult};
pub use repository::{MergeReport, Repository};
pub use status::Status;

// Re-export key types
pub use arbor_dag::CommitNode;
pub use arbor_diff::{ContentDiff, TreeChange, TreeDiff};
pub use arbor_merge::{Conflict, ConflictKind};
pub use arbor_store::{CommitObject, FileObjectStore, InMemoryObjectStore, ObjectBundle, ObjectStore};
pub use arbor_tree::{Navigator, Node, NodeSpec, Tree};
pub use arbor_types::{NodeId, ObjectId, Timestamp};
