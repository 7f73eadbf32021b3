use revstore_types::{ContentHash, StorageId, StoragePath, TypeError};

use crate::predicate::PredicateOp;

/// Errors from delta, snapshot, and predicate operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeltaError {
    /// A value violated a structural rule (e.g. a non-document snapshot).
    #[error("bad value: {0}")]
    BadValue(String),

    /// No binding exists for the requested id.
    #[error("not found: {0}")]
    NotFound(StorageId),

    /// A `pathPresent`/`pathIs` prerequisite found no binding at the path.
    #[error("path not found: {0}")]
    PathNotFound(StoragePath),

    /// A `pathIs` prerequisite found the path bound to different content.
    #[error("path {path} does not hold blob {expected}")]
    PathHashMismatch {
        path: StoragePath,
        expected: ContentHash,
    },

    /// A `blobPresent` prerequisite found no blob with the hash.
    #[error("blob not found: {0}")]
    BlobNotFound(ContentHash),

    /// Any other prerequisite failed; carries the failing op.
    #[error("predicate failed: {0}")]
    PredicateFailed(PredicateOp),

    #[error(transparent)]
    Type(#[from] TypeError),
}

/// Result alias for delta operations.
pub type DeltaResult<T> = Result<T, DeltaError>;
