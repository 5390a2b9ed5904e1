//! Object bundles: the payload exchanged between replicas.
//!
//! A bundle carries the objects a peer is missing plus the head commit the
//! sender wants merged. The wire format is a 4-byte magic, a big-endian
//! version, then a bincode body. Ids are never transmitted for entries; the
//! receiver recomputes them from the bytes.

use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::debug;

use arbor_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::object::{Blob, CommitObject, ObjectKind, StoredObject, TreeObject};
use crate::traits::ObjectStore;

const MAGIC: &[u8; 4] = b"ARBB";
const VERSION: u32 = 1;
const HEADER_LEN: usize = 8;

/// A batch of objects plus the head commit they lead to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectBundle {
    pub head: ObjectId,
    pub objects: Vec<StoredObject>,
}

impl ObjectBundle {
    pub fn new(head: ObjectId, objects: Vec<StoredObject>) -> Self {
        Self { head, objects }
    }

    /// Bundle everything a peer holding `haves` lacks to reach `head`.
    ///
    /// See [`collect_missing`].
    pub fn build(store: &dyn ObjectStore, head: ObjectId, haves: &[ObjectId]) -> StoreResult<Self> {
        let objects = collect_missing(store, head, haves)?;
        debug!(head = %head.short_hex(), objects = objects.len(), haves = haves.len(), "built bundle");
        Ok(Self { head, objects })
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Encode to the wire format.
    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        let body = bincode::serialize(self).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let mut bytes = Vec::with_capacity(HEADER_LEN + body.len());
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&VERSION.to_be_bytes());
        bytes.extend_from_slice(&body);
        Ok(bytes)
    }

    /// Decode and validate a bundle.
    ///
    /// Every entry must parse as the kind it claims to be. Any failure is
    /// reported as [`StoreError::MalformedBundle`].
    pub fn decode(bytes: &[u8]) -> StoreResult<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(StoreError::MalformedBundle(format!(
                "truncated header: {} bytes",
                bytes.len()
            )));
        }
        let (header, body) = bytes.split_at(HEADER_LEN);
        if &header[..4] != MAGIC {
            return Err(StoreError::MalformedBundle(format!(
                "bad magic {:?}",
                hex::encode(&header[..4])
            )));
        }
        let version = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
        if version != VERSION {
            return Err(StoreError::MalformedBundle(format!(
                "unsupported version {version}"
            )));
        }
        let bundle: Self =
            bincode::deserialize(body).map_err(|e| StoreError::MalformedBundle(e.to_string()))?;
        if bundle.head.is_null() {
            return Err(StoreError::MalformedBundle("null head".into()));
        }
        for object in &bundle.objects {
            let parsed = match object.kind {
                ObjectKind::Blob => Blob::from_stored_object(object).map(|_| ()),
                ObjectKind::Tree => TreeObject::from_stored_object(object).map(|_| ()),
                ObjectKind::Commit => CommitObject::from_stored_object(object).map(|_| ()),
            };
            parsed.map_err(|e| StoreError::MalformedBundle(e.to_string()))?;
        }
        Ok(bundle)
    }

    /// Write every object into `store`, returning how many were new.
    pub fn import(&self, store: &dyn ObjectStore) -> StoreResult<usize> {
        let mut added = 0;
        for object in &self.objects {
            let id = object.compute_id();
            if !store.exists(&id)? {
                store.write(object)?;
                added += 1;
            }
        }
        debug!(head = %self.head.short_hex(), added, total = self.objects.len(), "imported bundle");
        Ok(added)
    }
}

/// Every object reachable from `head` that is not reachable from any commit
/// in `haves`, in breadth-first order from `head`.
///
/// Commits named in `haves` that this store does not hold are ignored; the
/// receiver will simply get a larger bundle.
pub fn collect_missing(
    store: &dyn ObjectStore,
    head: ObjectId,
    haves: &[ObjectId],
) -> StoreResult<Vec<StoredObject>> {
    let mut known = HashSet::new();
    for have in haves {
        if store.exists(have)? {
            walk_reachable(store, *have, &mut known, &mut |_, _| Ok(()))?;
        }
    }

    let mut objects = Vec::new();
    walk_reachable(store, head, &mut known, &mut |_, obj| {
        objects.push(obj);
        Ok(())
    })?;
    Ok(objects)
}

/// Check that `head` names a commit and that everything it reaches,
/// parents included, is held by `store`. Returns the number of objects
/// visited.
pub fn verify_reachable(store: &dyn ObjectStore, head: ObjectId) -> StoreResult<usize> {
    let object = store.get(&head)?;
    if object.kind != ObjectKind::Commit {
        return Err(StoreError::CorruptObject {
            id: head,
            reason: format!("expected commit, got {}", object.kind),
        });
    }
    let mut visited = 0;
    walk_reachable(store, head, &mut HashSet::new(), &mut |_, _| {
        visited += 1;
        Ok(())
    })?;
    Ok(visited)
}

/// Breadth-first walk over commits, trees and blobs reachable from `start`,
/// skipping ids already in `seen`. Missing objects are a `NotFound` error.
fn walk_reachable(
    store: &dyn ObjectStore,
    start: ObjectId,
    seen: &mut HashSet<ObjectId>,
    visit: &mut dyn FnMut(ObjectId, StoredObject) -> StoreResult<()>,
) -> StoreResult<()> {
    let mut queue = VecDeque::new();
    if seen.insert(start) {
        queue.push_back(start);
    }
    while let Some(id) = queue.pop_front() {
        let object = store.get(&id)?;
        match object.kind {
            ObjectKind::Commit => {
                let commit = CommitObject::from_stored_object(&object)?;
                for next in std::iter::once(commit.tree).chain(commit.parents) {
                    if seen.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
            ObjectKind::Tree => {
                let tree = TreeObject::from_stored_object(&object)?;
                for next in std::iter::once(tree.content).chain(tree.children.iter().map(|e| e.tree)) {
                    if seen.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
            ObjectKind::Blob => {}
        }
        visit(id, object)?;
    }
    Ok(())
}
