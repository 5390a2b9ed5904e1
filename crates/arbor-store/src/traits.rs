use arbor_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::object::{Blob, CommitObject, StoredObject, TreeObject};

/// Content-addressed, append-only object store.
///
/// All implementations must satisfy these invariants:
/// - Objects are immutable once written; the same bytes always produce the
///   same id.
/// - Writing an object that is already present is a no-op that returns the
///   existing id.
/// - The store never interprets object contents.
/// - All I/O errors are propagated, never silently ignored.
///
/// The storage medium (memory, local files, a database) is injected by
/// choosing an implementation; the version controller only computes and
/// looks up ids.
pub trait ObjectStore: Send + Sync {
    /// Read an object by id. `Ok(None)` if absent.
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>>;

    /// Write an object and return its id. Idempotent.
    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId>;

    fn exists(&self, id: &ObjectId) -> StoreResult<bool>;

    /// Delete an object. Returns `true` if it existed.
    ///
    /// Reserved for garbage collection tooling; the version controller never
    /// deletes.
    fn delete(&self, id: &ObjectId) -> StoreResult<bool>;

    /// Read an object, failing with [`StoreError::NotFound`] if absent.
    fn get(&self, id: &ObjectId) -> StoreResult<StoredObject> {
        self.read(id)?.ok_or(StoreError::NotFound(*id))
    }

    fn read_batch(&self, ids: &[ObjectId]) -> StoreResult<Vec<Option<StoredObject>>> {
        ids.iter().map(|id| self.read(id)).collect()
    }

    fn write_batch(&self, objects: &[StoredObject]) -> StoreResult<Vec<ObjectId>> {
        objects.iter().map(|obj| self.write(obj)).collect()
    }

    fn load_blob(&self, id: &ObjectId) -> StoreResult<Blob> {
        Blob::from_stored_object(&self.get(id)?)
    }

    fn load_tree(&self, id: &ObjectId) -> StoreResult<TreeObject> {
        TreeObject::from_stored_object(&self.get(id)?)
    }

    fn load_commit(&self, id: &ObjectId) -> StoreResult<CommitObject> {
        CommitObject::from_stored_object(&self.get(id)?)
    }
}

impl<S: ObjectStore + ?Sized> ObjectStore for std::sync::Arc<S> {
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
        (**self).read(id)
    }

    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId> {
        (**self).write(object)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        (**self).exists(id)
    }

    fn delete(&self, id: &ObjectId) -> StoreResult<bool> {
        (**self).delete(id)
    }
}
