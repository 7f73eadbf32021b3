use std::fmt;

use revstore_delta::{FileOp, FileSnapshot, PredicateOp};
use revstore_types::{Blob, ContentHash, StorageId, StoragePath};

use crate::error::{TxnError, TxnResult};

/// The category of a transaction op.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OpCategory {
    Meta,
    Prerequisite,
    Read,
    List,
    Delete,
    Write,
    Wait,
}

impl fmt::Display for OpCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Meta => write!(f, "meta"),
            Self::Prerequisite => write!(f, "prerequisite"),
            Self::Read => write!(f, "read"),
            Self::List => write!(f, "list"),
            Self::Delete => write!(f, "delete"),
            Self::Write => write!(f, "write"),
            Self::Wait => write!(f, "wait"),
        }
    }
}

/// A read of blob contents into a pull result's `data`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReadOp {
    Blob { hash: ContentHash },
    Path { path: StoragePath },
    PathRange {
        prefix: StoragePath,
        start: u64,
        end: u64,
    },
}

/// A listing of bound paths into a pull result's `paths`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListOp {
    PathPrefix { prefix: StoragePath },
    PathRange {
        prefix: StoragePath,
        start: u64,
        end: u64,
    },
}

/// A condition a wait transaction blocks on, one per predicate kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WaitOp {
    BlobAbsent { hash: ContentHash },
    BlobPresent { hash: ContentHash },
    PathAbsent { path: StoragePath },
    PathPresent { path: StoragePath },
    PathIs { path: StoragePath, hash: ContentHash },
    PathIsNot { path: StoragePath, hash: ContentHash },
    /// Satisfied once the file reaches `rev_num` or any later revision.
    RevNumAtLeast { rev_num: u64 },
}

impl WaitOp {
    /// Evaluate the condition against `snapshot`.
    pub fn test(&self, snapshot: &FileSnapshot) -> bool {
        match self {
            Self::RevNumAtLeast { rev_num } => snapshot.rev_num() >= *rev_num,
            _ => self
                .as_predicate()
                .is_some_and(|predicate| predicate.test(snapshot)),
        }
    }

    /// The id reported back when the wait is satisfied.
    pub fn target(&self) -> Option<StorageId> {
        match self {
            Self::BlobAbsent { hash } | Self::BlobPresent { hash } => Some(StorageId::Hash(*hash)),
            Self::PathAbsent { path }
            | Self::PathPresent { path }
            | Self::PathIs { path, .. }
            | Self::PathIsNot { path, .. } => Some(StorageId::Path(path.clone())),
            Self::RevNumAtLeast { .. } => None,
        }
    }

    fn as_predicate(&self) -> Option<PredicateOp> {
        Some(match self {
            Self::BlobAbsent { hash } => PredicateOp::blob_absent(*hash),
            Self::BlobPresent { hash } => PredicateOp::blob_present(*hash),
            Self::PathAbsent { path } => PredicateOp::path_absent(path.clone()),
            Self::PathPresent { path } => PredicateOp::path_present(path.clone()),
            Self::PathIs { path, hash } => PredicateOp::path_is(path.clone(), *hash),
            Self::PathIsNot { path, hash } => PredicateOp::path_is_not(path.clone(), *hash),
            Self::RevNumAtLeast { .. } => return None,
        })
    }
}

/// Caller-facing operation used to build a
/// [`TransactionSpec`](crate::TransactionSpec).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransactionOp {
    Prerequisite(PredicateOp),
    Read(ReadOp),
    List(ListOp),
    /// A write or delete; the category follows the wrapped op.
    Mutate(FileOp),
    Wait(WaitOp),
    /// Overall time budget for the transaction, in milliseconds.
    Timeout { msec: u64 },
}

fn check_range(start: u64, end: u64) -> TxnResult<()> {
    if start > end {
        return Err(TxnError::BadUse(format!(
            "range start {start} is past end {end}"
        )));
    }
    Ok(())
}

impl TransactionOp {
    pub fn category(&self) -> OpCategory {
        match self {
            Self::Prerequisite(_) => OpCategory::Prerequisite,
            Self::Read(_) => OpCategory::Read,
            Self::List(_) => OpCategory::List,
            Self::Mutate(op) if op.is_write() => OpCategory::Write,
            Self::Mutate(_) => OpCategory::Delete,
            Self::Wait(_) => OpCategory::Wait,
            Self::Timeout { .. } => OpCategory::Meta,
        }
    }

    // -----------------------------------------------------------------------
    // Prerequisites
    // -----------------------------------------------------------------------

    pub fn check_blob_absent(hash: impl Into<ContentHash>) -> Self {
        Self::Prerequisite(PredicateOp::blob_absent(hash))
    }

    pub fn check_blob_present(hash: impl Into<ContentHash>) -> Self {
        Self::Prerequisite(PredicateOp::blob_present(hash))
    }

    pub fn check_path_absent(path: StoragePath) -> Self {
        Self::Prerequisite(PredicateOp::path_absent(path))
    }

    pub fn check_path_present(path: StoragePath) -> Self {
        Self::Prerequisite(PredicateOp::path_present(path))
    }

    pub fn check_path_is(path: StoragePath, hash: impl Into<ContentHash>) -> Self {
        Self::Prerequisite(PredicateOp::path_is(path, hash))
    }

    pub fn check_path_is_not(path: StoragePath, hash: impl Into<ContentHash>) -> Self {
        Self::Prerequisite(PredicateOp::path_is_not(path, hash))
    }

    pub fn rev_num_is(rev_num: u64) -> Self {
        Self::Prerequisite(PredicateOp::rev_num_is(rev_num))
    }

    // -----------------------------------------------------------------------
    // Reads and listings
    // -----------------------------------------------------------------------

    pub fn read_blob(hash: impl Into<ContentHash>) -> Self {
        Self::Read(ReadOp::Blob { hash: hash.into() })
    }

    pub fn read_path(path: StoragePath) -> Self {
        Self::Read(ReadOp::Path { path })
    }

    pub fn read_path_range(prefix: StoragePath, start: u64, end: u64) -> TxnResult<Self> {
        check_range(start, end)?;
        Ok(Self::Read(ReadOp::PathRange { prefix, start, end }))
    }

    pub fn list_path_prefix(prefix: StoragePath) -> Self {
        Self::List(ListOp::PathPrefix { prefix })
    }

    pub fn list_path_range(prefix: StoragePath, start: u64, end: u64) -> TxnResult<Self> {
        check_range(start, end)?;
        Ok(Self::List(ListOp::PathRange { prefix, start, end }))
    }

    // -----------------------------------------------------------------------
    // Writes and deletes
    // -----------------------------------------------------------------------

    pub fn delete_all() -> Self {
        Self::Mutate(FileOp::delete_all())
    }

    pub fn delete_blob(hash: impl Into<ContentHash>) -> Self {
        Self::Mutate(FileOp::delete_blob(hash))
    }

    pub fn delete_path(path: StoragePath) -> Self {
        Self::Mutate(FileOp::delete_path(path))
    }

    pub fn delete_path_prefix(prefix: StoragePath) -> Self {
        Self::Mutate(FileOp::delete_path_prefix(prefix))
    }

    pub fn delete_path_range(prefix: StoragePath, start: u64, end: u64) -> TxnResult<Self> {
        check_range(start, end)?;
        FileOp::delete_path_range(prefix, start, end)
            .map(Self::Mutate)
            .map_err(TxnError::from)
    }

    pub fn write_blob(blob: Blob) -> Self {
        Self::Mutate(FileOp::write_blob(blob))
    }

    pub fn write_path(path: StoragePath, blob: Blob) -> Self {
        Self::Mutate(FileOp::write_path(path, blob))
    }

    // -----------------------------------------------------------------------
    // Waits
    // -----------------------------------------------------------------------

    pub fn when_blob_absent(hash: impl Into<ContentHash>) -> Self {
        Self::Wait(WaitOp::BlobAbsent { hash: hash.into() })
    }

    pub fn when_blob_present(hash: impl Into<ContentHash>) -> Self {
        Self::Wait(WaitOp::BlobPresent { hash: hash.into() })
    }

    pub fn when_path_absent(path: StoragePath) -> Self {
        Self::Wait(WaitOp::PathAbsent { path })
    }

    pub fn when_path_present(path: StoragePath) -> Self {
        Self::Wait(WaitOp::PathPresent { path })
    }

    pub fn when_path_is(path: StoragePath, hash: impl Into<ContentHash>) -> Self {
        Self::Wait(WaitOp::PathIs {
            path,
            hash: hash.into(),
        })
    }

    pub fn when_path_is_not(path: StoragePath, hash: impl Into<ContentHash>) -> Self {
        Self::Wait(WaitOp::PathIsNot {
            path,
            hash: hash.into(),
        })
    }

    pub fn when_rev_num_at_least(rev_num: u64) -> Self {
        Self::Wait(WaitOp::RevNumAtLeast { rev_num })
    }

    // -----------------------------------------------------------------------
    // Meta
    // -----------------------------------------------------------------------

    pub fn timeout(msec: u64) -> Self {
        Self::Timeout { msec }
    }
}
