//! Content-addressed object storage for Arbor.
//!
//! Every version of a document is persisted as immutable objects identified
//! by their BLAKE3 hash (domain-separated by object kind), in the manner of
//! git's object database.
//!
//! # Object Types
//!
//! - [`Blob`] -- text content of one node
//! - [`TreeObject`] -- one node's content id plus its ordered child entries
//! - [`CommitObject`] -- root tree, parent commits, author, timestamp
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding
//! - [`FileObjectStore`] -- zstd-compressed loose objects on disk
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written; the store only grows.
//! 2. Write-then-link: children are written before the trees and commits
//!    that reference them.
//! 3. Identical content always shares one stored object.
//! 4. The store never interprets object contents.

pub mod bundle;
pub mod error;
pub mod fs;
pub mod memory;
pub mod object;
pub mod traits;

pub use bundle::{collect_missing, verify_reachable, ObjectBundle};
pub use error::{StoreError, StoreResult};
pub use fs::FileObjectStore;
pub use memory::InMemoryObjectStore;
pub use object::{Blob, CommitObject, ObjectKind, StoredObject, TreeEntry, TreeObject};
pub use traits::ObjectStore;
