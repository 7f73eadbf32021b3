use std::io;

use revstore_delta::DeltaError;
use revstore_txn::TxnError;

/// Errors produced by the file engine.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    /// The file does not exist (never created, or deleted).
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// The transaction did not finish within its time budget.
    #[error("timed out after {0} msec")]
    TimedOut(u64),

    /// On-disk state is corrupt or in an incompatible format.
    #[error("bad data: {0}")]
    BadData(String),

    /// The file id is not usable as a directory name.
    #[error("invalid file id {0:?}")]
    InvalidFileId(String),

    /// The requested revision does not exist.
    #[error("revision {rev_num} not found (current revision is {current})")]
    RevisionNotFound { rev_num: u64, current: u64 },

    /// Encoding or config parsing failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the storage directory.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Txn(#[from] TxnError),

    #[error(transparent)]
    Delta(#[from] DeltaError),
}

/// Convenience alias used throughout the file crate.
pub type Result<T> = std::result::Result<T, FileError>;
