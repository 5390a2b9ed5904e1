use std::fmt;

use serde::{Deserialize, Serialize};

use arbor_types::NodeId;

/// Why a node could not be merged automatically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Both sides changed the content, differently.
    Content,
    /// One side deleted the node, the other changed or still needs it.
    DeleteModify,
    /// Both sides created the same id with different content.
    AddAdd,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Content => write!(f, "content"),
            Self::DeleteModify => write!(f, "delete/modify"),
            Self::AddAdd => write!(f, "add/add"),
        }
    }
}

/// One unresolved node. `None` means the node is absent on that side.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub id: NodeId,
    pub kind: ConflictKind,
    pub base: Option<String>,
    pub ours: Option<String>,
    pub theirs: Option<String>,
}

impl Conflict {
    /// The content the merged tree carries until the conflict is resolved:
    /// ours when we have the node, theirs otherwise.
    pub fn provisional(&self) -> Option<&str> {
        self.ours.as_deref().or(self.theirs.as_deref())
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} conflict on node {}", self.kind, self.id)
    }
}
