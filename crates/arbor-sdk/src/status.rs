//! The repository state machine's states.

use std::fmt;

use serde::{Deserialize, Serialize};

use arbor_merge::Conflict;
use arbor_types::{NodeId, ObjectId};

/// Where the working tree stands relative to history.
///
/// `Bare` is the initial state. Commit and checkout always lead to `Clean`;
/// only a divergent merge with conflicts leads to `MergeConflict`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Status {
    /// No commit yet.
    #[default]
    Bare,
    /// The working tree descends from `head`.
    Clean { head: ObjectId },
    /// A merge of `theirs` into `ours` awaits resolution. The next commit
    /// records both as parents.
    MergeConflict {
        ours: ObjectId,
        theirs: ObjectId,
        /// Unresolved nodes in document order.
        conflicts: Vec<Conflict>,
    },
}

impl Status {
    /// The commit the working tree is based on; `ours` during a merge.
    pub fn head(&self) -> Option<ObjectId> {
        match self {
            Self::Bare => None,
            Self::Clean { head } => Some(*head),
            Self::MergeConflict { ours, .. } => Some(*ours),
        }
    }

    /// Parents of the next commit.
    pub fn parents(&self) -> Vec<ObjectId> {
        match self {
            Self::Bare => Vec::new(),
            Self::Clean { head } => vec![*head],
            Self::MergeConflict { ours, theirs, .. } => vec![*ours, *theirs],
        }
    }

    pub fn is_bare(&self) -> bool {
        matches!(self, Self::Bare)
    }

    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean { .. })
    }

    pub fn is_conflicted(&self) -> bool {
        matches!(self, Self::MergeConflict { .. })
    }

    pub fn conflicts(&self) -> &[Conflict] {
        match self {
            Self::MergeConflict { conflicts, .. } => conflicts,
            _ => &[],
        }
    }

    pub fn conflict_ids(&self) -> Vec<&NodeId> {
        self.conflicts().iter().map(|c| &c.id).collect()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bare => write!(f, "bare"),
            Self::Clean { head } => write!(f, "clean at {}", head.short_hex()),
            Self::MergeConflict {
                ours,
                theirs,
                conflicts,
            } => write!(
                f,
                "merging {} into {} ({} conflicts)",
                theirs.short_hex(),
                ours.short_hex(),
                conflicts.len()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_merge::ConflictKind;

    fn conflicted() -> Status {
        Status::MergeConflict {
            ours: ObjectId::from_bytes(b"ours"),
            theirs: ObjectId::from_bytes(b"theirs"),
            conflicts: vec![Conflict {
                id: NodeId::new("1").unwrap(),
                kind: ConflictKind::Content,
                base: Some("A".into()),
                ours: Some("A1".into()),
                theirs: Some("A2".into()),
            }],
        }
    }

    #[test]
    fn parents_follow_state() {
        let h = ObjectId::from_bytes(b"h");
        assert!(Status::Bare.parents().is_empty());
        assert_eq!(Status::Clean { head: h }.parents(), vec![h]);
        let merging = conflicted();
        assert_eq!(merging.parents().len(), 2);
        assert_eq!(merging.head(), Some(ObjectId::from_bytes(b"ours")));
    }

    #[test]
    fn conflict_ids_only_while_merging() {
        assert!(Status::default().conflict_ids().is_empty());
        assert_eq!(conflicted().conflict_ids(), vec![&NodeId::new("1").unwrap()]);
    }

    #[test]
    fn json_roundtrip() {
        let status = conflicted();
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"state\":\"merge_conflict\""));
        let back: Status = serde_json::from_str(&json).unwrap();
        assert_eq!(back, status);

        let bare = serde_json::to_string(&Status::Bare).unwrap();
        assert_eq!(bare, r#"{"state":"bare"}"#);
    }

    #[test]
    fn display() {
        assert_eq!(Status::Bare.to_string(), "bare");
        assert!(conflicted().to_string().ends_with("(1 conflicts)"));
    }
}
