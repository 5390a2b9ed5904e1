use serde::{Deserialize, Serialize};

use arbor_crypto::ContentHasher;
use arbor_types::{NodeId, ObjectId, Timestamp};

use crate::error::{StoreError, StoreResult};

/// The kind of object stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Text content of a single node.
    Blob,
    /// Snapshot of one node: content id plus ordered child entries.
    Tree,
    /// Root tree reference plus parent commits and metadata.
    Commit,
}

impl ObjectKind {
    /// One-byte tag used by on-disk encodings.
    pub fn type_byte(&self) -> u8 {
        match self {
            Self::Blob => 1,
            Self::Tree => 2,
            Self::Commit => 3,
        }
    }

    pub fn from_type_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Blob),
            2 => Some(Self::Tree),
            3 => Some(Self::Commit),
            _ => None,
        }
    }

    fn hasher(&self) -> &'static ContentHasher {
        match self {
            Self::Blob => &ContentHasher::BLOB,
            Self::Tree => &ContentHasher::TREE,
            Self::Commit => &ContentHasher::COMMIT,
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blob => write!(f, "blob"),
            Self::Tree => write!(f, "tree"),
            Self::Commit => write!(f, "commit"),
        }
    }
}

/// A stored object: kind tag plus serialized bytes.
///
/// `StoredObject` is the unit of storage. The store never interprets the
/// bytes; it only keys them by their domain-separated hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub kind: ObjectKind,
    pub data: Vec<u8>,
}

impl StoredObject {
    pub fn new(kind: ObjectKind, data: Vec<u8>) -> Self {
        Self { kind, data }
    }

    /// Compute the content-addressed id for this object.
    pub fn compute_id(&self) -> ObjectId {
        self.kind.hasher().hash(&self.data)
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn expect_kind(&self, kind: ObjectKind) -> StoreResult<()> {
        if self.kind != kind {
            return Err(StoreError::CorruptObject {
                id: self.compute_id(),
                reason: format!("expected {kind}, got {}", self.kind),
            });
        }
        Ok(())
    }

    fn decode_json<T: for<'de> Deserialize<'de>>(&self) -> StoreResult<T> {
        serde_json::from_slice(&self.data).map_err(|e| StoreError::CorruptObject {
            id: self.compute_id(),
            reason: e.to_string(),
        })
    }
}

fn encode_json<T: Serialize>(kind: ObjectKind, value: &T) -> StoreResult<StoredObject> {
    let data = serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(StoredObject::new(kind, data))
}

// ---------------------------------------------------------------------------
// Blob
// ---------------------------------------------------------------------------

/// Text content of one node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Blob {
    pub content: String,
}

impl Blob {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    /// Id this blob has once stored, without storing it.
    pub fn id(&self) -> ObjectId {
        ContentHasher::BLOB.hash(self.content.as_bytes())
    }

    pub fn to_stored_object(&self) -> StoredObject {
        StoredObject::new(ObjectKind::Blob, self.content.as_bytes().to_vec())
    }

    pub fn from_stored_object(obj: &StoredObject) -> StoreResult<Self> {
        obj.expect_kind(ObjectKind::Blob)?;
        let content =
            String::from_utf8(obj.data.clone()).map_err(|e| StoreError::CorruptObject {
                id: obj.compute_id(),
                reason: format!("blob is not UTF-8: {e}"),
            })?;
        Ok(Self { content })
    }
}

// ---------------------------------------------------------------------------
// TreeObject
// ---------------------------------------------------------------------------

/// One child reference inside a [`TreeObject`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    /// Node id of the child.
    pub id: NodeId,
    /// Tree object of the child's subtree.
    pub tree: ObjectId,
}

impl TreeEntry {
    pub fn new(id: NodeId, tree: ObjectId) -> Self {
        Self { id, tree }
    }
}

/// Snapshot of a single node: its content blob and its children in
/// sibling order.
///
/// Unlike a directory listing, entries are *not* sorted: sibling order is
/// part of the document and therefore part of the hash. The node's own id
/// lives in its parent's entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeObject {
    pub content: ObjectId,
    pub children: Vec<TreeEntry>,
}

impl TreeObject {
    pub fn new(content: ObjectId, children: Vec<TreeEntry>) -> Self {
        Self { content, children }
    }

    pub fn to_stored_object(&self) -> StoreResult<StoredObject> {
        encode_json(ObjectKind::Tree, self)
    }

    pub fn from_stored_object(obj: &StoredObject) -> StoreResult<Self> {
        obj.expect_kind(ObjectKind::Tree)?;
        obj.decode_json()
    }

    /// Id this tree object has once stored.
    pub fn id(&self) -> StoreResult<ObjectId> {
        Ok(self.to_stored_object()?.compute_id())
    }

    pub fn get(&self, id: &str) -> Option<&TreeEntry> {
        self.children.iter().find(|e| e.id.as_str() == id)
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

// ---------------------------------------------------------------------------
// CommitObject
// ---------------------------------------------------------------------------

/// A point in history: the root tree plus zero, one, or two parents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitObject {
    pub tree: ObjectId,
    pub parents: Vec<ObjectId>,
    pub author: String,
    pub timestamp: Timestamp,
}

impl CommitObject {
    /// Most parents a commit may carry (a merge commit).
    pub const MAX_PARENTS: usize = 2;

    pub fn new(
        tree: ObjectId,
        parents: Vec<ObjectId>,
        author: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            tree,
            parents,
            author: author.into(),
            timestamp,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() == 2
    }

    pub fn to_stored_object(&self) -> StoreResult<StoredObject> {
        encode_json(ObjectKind::Commit, self)
    }

    pub fn from_stored_object(obj: &StoredObject) -> StoreResult<Self> {
        obj.expect_kind(ObjectKind::Commit)?;
        let commit: Self = obj.decode_json()?;
        if commit.parents.len() > Self::MAX_PARENTS {
            return Err(StoreError::CorruptObject {
                id: obj.compute_id(),
                reason: format!("commit has {} parents", commit.parents.len()),
            });
        }
        Ok(commit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nid(s: &str) -> NodeId {
        NodeId::new(s).unwrap()
    }

    #[test]
    fn blob_decodes_text() {
        let blob = Blob::new("hello card");
        let stored = blob.to_stored_object();
        assert_eq!(stored.compute_id(), blob.id());
        assert_eq!(Blob::from_stored_object(&stored).unwrap(), blob);
    }

    #[test]
    fn blob_rejects_invalid_utf8() {
        let stored = StoredObject::new(ObjectKind::Blob, vec![0xff, 0xfe]);
        assert!(matches!(
            Blob::from_stored_object(&stored),
            Err(StoreError::CorruptObject { .. })
        ));
    }

    #[test]
    fn kind_mismatch_is_corrupt() {
        let stored = Blob::new("text").to_stored_object();
        let err = TreeObject::from_stored_object(&stored).unwrap_err();
        assert!(matches!(err, StoreError::CorruptObject { .. }));
    }

    #[test]
    fn tree_keeps_sibling_order() {
        let a = ObjectId::from_bytes(b"a");
        let b = ObjectId::from_bytes(b"b");
        let forward = TreeObject::new(
            Blob::new("").id(),
            vec![TreeEntry::new(nid("2"), a), TreeEntry::new(nid("1"), b)],
        );
        let reversed = TreeObject::new(
            Blob::new("").id(),
            vec![TreeEntry::new(nid("1"), b), TreeEntry::new(nid("2"), a)],
        );
        assert_eq!(forward.children[0].id.as_str(), "2");
        assert_ne!(forward.id().unwrap(), reversed.id().unwrap());

        let stored = forward.to_stored_object().unwrap();
        assert_eq!(TreeObject::from_stored_object(&stored).unwrap(), forward);
        assert!(forward.get("1").is_some());
        assert!(forward.get("3").is_none());
    }

    #[test]
    fn commit_parent_counts() {
        let tree = ObjectId::from_bytes(b"tree");
        let root = CommitObject::new(tree, vec![], "ann", Timestamp::from_millis(1));
        assert!(root.is_root());
        let merge = CommitObject::new(
            tree,
            vec![ObjectId::from_bytes(b"p1"), ObjectId::from_bytes(b"p2")],
            "ann",
            Timestamp::from_millis(2),
        );
        assert!(merge.is_merge());
        let stored = merge.to_stored_object().unwrap();
        assert_eq!(CommitObject::from_stored_object(&stored).unwrap(), merge);
    }

    #[test]
    fn commit_with_three_parents_is_corrupt() {
        let commit = CommitObject::new(
            ObjectId::from_bytes(b"tree"),
            vec![
                ObjectId::from_bytes(b"1"),
                ObjectId::from_bytes(b"2"),
                ObjectId::from_bytes(b"3"),
            ],
            "ann",
            Timestamp::zero(),
        );
        let stored = commit.to_stored_object().unwrap();
        assert!(matches!(
            CommitObject::from_stored_object(&stored),
            Err(StoreError::CorruptObject { .. })
        ));
    }

    #[test]
    fn same_bytes_different_kinds_differ() {
        let data = b"{}".to_vec();
        let tree = StoredObject::new(ObjectKind::Tree, data.clone());
        let commit = StoredObject::new(ObjectKind::Commit, data);
        assert_ne!(tree.compute_id(), commit.compute_id());
    }

    #[test]
    fn type_bytes_roundtrip() {
        for kind in [ObjectKind::Blob, ObjectKind::Tree, ObjectKind::Commit] {
            assert_eq!(ObjectKind::from_type_byte(kind.type_byte()), Some(kind));
        }
        assert_eq!(ObjectKind::from_type_byte(0), None);
    }
}
