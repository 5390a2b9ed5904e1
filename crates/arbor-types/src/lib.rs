//! Foundation types for Arbor.
//!
//! This crate provides the identity and temporal types shared by every other
//! Arbor crate.
//!
//! # Key Types
//!
//! - [`ObjectId`] — Content-addressed identifier (BLAKE3 hash)
//! - [`NodeId`] — Stable identifier of a node in a document tree
//! - [`Timestamp`] — Wall-clock milliseconds recorded on commits

pub mod error;
pub mod node;
pub mod object;
pub mod temporal;

pub use error::TypeError;
pub use node::NodeId;
pub use object::ObjectId;
pub use temporal::Timestamp;
