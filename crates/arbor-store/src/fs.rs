use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use arbor_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::object::{ObjectKind, StoredObject};
use crate::traits::ObjectStore;

/// Default zstd level for loose objects.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Loose-object store on the local filesystem.
///
/// Layout follows git: `<root>/<first 2 hex>/<remaining 62 hex>`. Each file
/// holds a one-byte kind tag followed by the zstd-compressed object bytes.
/// Writes go through a temp file in the same directory and are renamed into
/// place, so a crashed write never leaves a truncated object behind.
#[derive(Debug)]
pub struct FileObjectStore {
    root: PathBuf,
    compression_level: i32,
}

impl FileObjectStore {
    /// Open (creating if needed) an object directory.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with_level(root, DEFAULT_COMPRESSION_LEVEL)
    }

    pub fn open_with_level(root: impl AsRef<Path>, compression_level: i32) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        debug!(root = %root.display(), compression_level, "opened object directory");
        Ok(Self {
            root,
            compression_level,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, id: &ObjectId) -> PathBuf {
        let hex = id.to_hex();
        self.root.join(&hex[..2]).join(&hex[2..])
    }

    /// Every id present on disk, sorted.
    pub fn all_ids(&self) -> StoreResult<Vec<ObjectId>> {
        let mut ids = Vec::new();
        for shard in fs::read_dir(&self.root)? {
            let shard = shard?;
            if !shard.file_type()?.is_dir() {
                continue;
            }
            let prefix = shard.file_name().to_string_lossy().into_owned();
            for entry in fs::read_dir(shard.path())? {
                let entry = entry?;
                let rest = entry.file_name().to_string_lossy().into_owned();
                // Skips in-flight temp files.
                if let Ok(id) = ObjectId::from_hex(&format!("{prefix}{rest}")) {
                    ids.push(id);
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.all_ids()?.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    fn encode(&self, object: &StoredObject) -> StoreResult<Vec<u8>> {
        let compressed = zstd::encode_all(object.data.as_slice(), self.compression_level)
            .map_err(|e| StoreError::Compression(e.to_string()))?;
        let mut bytes = Vec::with_capacity(compressed.len() + 1);
        bytes.push(object.kind.type_byte());
        bytes.extend_from_slice(&compressed);
        Ok(bytes)
    }

    fn decode(id: &ObjectId, bytes: &[u8]) -> StoreResult<StoredObject> {
        let (&tag, compressed) = bytes.split_first().ok_or_else(|| StoreError::CorruptObject {
            id: *id,
            reason: "empty object file".into(),
        })?;
        let kind = ObjectKind::from_type_byte(tag).ok_or_else(|| StoreError::CorruptObject {
            id: *id,
            reason: format!("unknown kind tag {tag}"),
        })?;
        let data =
            zstd::decode_all(compressed).map_err(|e| StoreError::Compression(e.to_string()))?;
        let object = StoredObject::new(kind, data);
        let computed = object.compute_id();
        if computed != *id {
            return Err(StoreError::HashMismatch { id: *id, computed });
        }
        Ok(object)
    }
}

impl ObjectStore for FileObjectStore {
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
        let path = self.object_path(id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Self::decode(id, &bytes).map(Some)
    }

    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId> {
        let id = object.compute_id();
        if id.is_null() {
            return Err(StoreError::NullObjectId);
        }
        let path = self.object_path(&id);
        if path.exists() {
            return Ok(id);
        }
        let shard = path
            .parent()
            .ok_or_else(|| StoreError::Io(std::io::Error::other("object path has no parent")))?;
        fs::create_dir_all(shard)?;

        let bytes = self.encode(object)?;
        let mut tmp = tempfile::NamedTempFile::new_in(shard)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;
        trace!(id = %id.short_hex(), kind = %object.kind, bytes = bytes.len(), "wrote loose object");
        Ok(id)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.object_path(id).is_file())
    }

    fn delete(&self, id: &ObjectId) -> StoreResult<bool> {
        match fs::remove_file(self.object_path(id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
