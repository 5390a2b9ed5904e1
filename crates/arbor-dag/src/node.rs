//! Commit nodes as seen by the graph.

use serde::{Deserialize, Serialize};

use arbor_store::CommitObject;
use arbor_types::{ObjectId, Timestamp};

/// A commit in the history graph.
///
/// Holds just enough of the [`CommitObject`] for ancestry queries and log
/// output; the tree itself stays in the object store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitNode {
    pub id: ObjectId,
    pub tree: ObjectId,
    /// Zero (root), one, or two (merge) parents.
    pub parents: Vec<ObjectId>,
    pub author: String,
    pub timestamp: Timestamp,
}

impl CommitNode {
    pub fn from_commit(id: ObjectId, commit: CommitObject) -> Self {
        Self {
            id,
            tree: commit.tree,
            parents: commit.parents,
            author: commit.author,
            timestamp: commit.timestamp,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// One-line summary for log output.
    pub fn summary(&self) -> String {
        let kind = match self.parents.len() {
            0 => "root",
            1 => "commit",
            _ => "merge",
        };
        format!("{} {} by {} at {}", self.id.short_hex(), kind, self.author, self.timestamp)
    }
}
