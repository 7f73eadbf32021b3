//! Foundation types for revstore.
//!
//! Every key in a revstore file is a [`StorageId`]: either a hierarchical
//! [`StoragePath`] or the [`ContentHash`] of a [`Blob`]. These types are
//! validated at construction, so anything holding one can rely on its syntax.
//!
//! # Key Types
//!
//! - [`StoragePath`] -- `/`-delimited key, e.g. `/users/alice/0`
//! - [`ContentHash`] -- domain-separated BLAKE3 digest of blob bytes
//! - [`StorageId`] -- union of the two addressing schemes
//! - [`Blob`] -- immutable, content-addressed byte buffer

pub mod blob;
pub mod error;
pub mod hash;
pub mod id;
pub mod path;

pub use blob::Blob;
pub use error::TypeError;
pub use hash::ContentHash;
pub use id::StorageId;
pub use path::StoragePath;
