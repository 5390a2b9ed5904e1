use arbor_types::ObjectId;

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested object was not found.
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    /// Content hash mismatch on read (data corruption).
    #[error("hash mismatch for {id}: computed {computed}")]
    HashMismatch { id: ObjectId, computed: ObjectId },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage medium.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The object data is malformed or of the wrong kind.
    #[error("corrupt object {id}: {reason}")]
    CorruptObject { id: ObjectId, reason: String },

    /// Attempted to write an object whose id is null.
    #[error("cannot store object with null ID")]
    NullObjectId,

    /// Compression or decompression of an on-disk object failed.
    #[error("compression error: {0}")]
    Compression(String),

    /// An inbound object bundle could not be decoded.
    #[error("malformed bundle: {0}")]
    MalformedBundle(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
