//! Operation/delta/snapshot algebra for revstore.
//!
//! A file's history is a sequence of [`FileDelta`]s. Each delta is an ordered
//! list of [`FileOp`]s; deltas compose with last-write-wins semantics keyed by
//! [`StorageId`](revstore_types::StorageId). A delta with no deletions and no
//! doubly-written ids is a *document* and denotes a complete state; wrapping a
//! document with a revision number gives a [`FileSnapshot`].
//!
//! # Key Types
//!
//! - [`FileOp`] -- a single mutation (write/delete by id, prefix, range, all)
//! - [`FileDelta`] -- ordered, composable list of ops
//! - [`FileSnapshot`] -- materialized state at one revision
//! - [`FileChange`] -- a delta tagged with the revision it produced
//! - [`PredicateOp`] / [`PredicateSpec`] -- boolean tests against a snapshot

pub mod change;
pub mod delta;
pub mod error;
pub mod file_op;
pub mod predicate;
pub mod snapshot;

pub use change::FileChange;
pub use delta::FileDelta;
pub use error::{DeltaError, DeltaResult};
pub use file_op::FileOp;
pub use predicate::{PredicateOp, PredicateSpec};
pub use snapshot::FileSnapshot;
