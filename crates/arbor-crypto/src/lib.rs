//! Content hashing for Arbor.
//!
//! Every stored object is addressed by a BLAKE3 digest prefixed with a
//! per-kind domain tag. All crypto operations wrap `blake3`; nothing here
//! is custom cryptography.

pub mod hasher;

pub use hasher::{ContentHasher, HasherError};
