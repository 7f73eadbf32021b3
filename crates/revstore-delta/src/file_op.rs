use std::fmt;

use serde::{Deserialize, Serialize};

use revstore_types::{Blob, ContentHash, StorageId, StoragePath};

use crate::error::{DeltaError, DeltaResult};

/// A single mutation of a file's contents.
///
/// Ops are immutable values. Path and hash syntax is already enforced by the
/// argument types; the only constructor that can fail is
/// [`FileOp::delete_path_range`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileOp {
    /// Remove every binding.
    DeleteAll,
    /// Remove the blob stored under `hash`.
    DeleteBlob { hash: ContentHash },
    /// Remove the binding at `path`.
    DeletePath { path: StoragePath },
    /// Remove `prefix` and every path beneath it.
    DeletePathPrefix { prefix: StoragePath },
    /// Remove every `<prefix>/<n>` with `start <= n < end`.
    DeletePathRange {
        prefix: StoragePath,
        start: u64,
        end: u64,
    },
    /// Store `blob` under its own hash.
    WriteBlob { blob: Blob },
    /// Bind `path` to `blob`.
    WritePath { path: StoragePath, blob: Blob },
}

impl FileOp {
    pub fn delete_all() -> Self {
        Self::DeleteAll
    }

    /// Accepts either a hash or a blob (via `From<&Blob> for ContentHash`).
    pub fn delete_blob(hash: impl Into<ContentHash>) -> Self {
        Self::DeleteBlob { hash: hash.into() }
    }

    pub fn delete_path(path: StoragePath) -> Self {
        Self::DeletePath { path }
    }

    pub fn delete_path_prefix(prefix: StoragePath) -> Self {
        Self::DeletePathPrefix { prefix }
    }

    /// Range deletion over the half-open interval `[start, end)`.
    pub fn delete_path_range(prefix: StoragePath, start: u64, end: u64) -> DeltaResult<Self> {
        if start > end {
            return Err(DeltaError::BadValue(format!(
                "range start {start} is past end {end}"
            )));
        }
        Ok(Self::DeletePathRange { prefix, start, end })
    }

    pub fn write_blob(blob: Blob) -> Self {
        Self::WriteBlob { blob }
    }

    pub fn write_path(path: StoragePath, blob: Blob) -> Self {
        Self::WritePath { path, blob }
    }

    /// Stable opcode name, used in logs and error messages.
    pub fn opcode(&self) -> &'static str {
        match self {
            Self::DeleteAll => "deleteAll",
            Self::DeleteBlob { .. } => "deleteBlob",
            Self::DeletePath { .. } => "deletePath",
            Self::DeletePathPrefix { .. } => "deletePathPrefix",
            Self::DeletePathRange { .. } => "deletePathRange",
            Self::WriteBlob { .. } => "writeBlob",
            Self::WritePath { .. } => "writePath",
        }
    }

    /// Returns `true` for the deletion category.
    pub fn is_delete(&self) -> bool {
        !self.is_write()
    }

    /// Returns `true` for the write category.
    pub fn is_write(&self) -> bool {
        matches!(self, Self::WriteBlob { .. } | Self::WritePath { .. })
    }

    /// The single id this op targets, for the ops that target exactly one.
    pub fn target_id(&self) -> Option<StorageId> {
        match self {
            Self::DeleteBlob { hash } => Some(StorageId::Hash(*hash)),
            Self::DeletePath { path } => Some(StorageId::Path(path.clone())),
            Self::WriteBlob { blob } => Some(StorageId::Hash(blob.hash())),
            Self::WritePath { path, .. } => Some(StorageId::Path(path.clone())),
            Self::DeleteAll | Self::DeletePathPrefix { .. } | Self::DeletePathRange { .. } => None,
        }
    }

    /// Returns `true` if this op removes the binding at `id`.
    ///
    /// Keyed deletes match only their own id; prefix and range deletes match
    /// paths by their respective rules; `deleteAll` matches everything.
    pub fn deletes(&self, id: &StorageId) -> bool {
        match self {
            Self::DeleteAll => true,
            Self::DeleteBlob { hash } => id.as_hash() == Some(hash),
            Self::DeletePath { path } => id.as_path() == Some(path),
            Self::DeletePathPrefix { prefix } => {
                id.as_path().is_some_and(|p| p.is_prefix_or_same(prefix))
            }
            Self::DeletePathRange { prefix, start, end } => id
                .as_path()
                .is_some_and(|p| p.in_numeric_range(prefix, *start, *end)),
            Self::WriteBlob { .. } | Self::WritePath { .. } => false,
        }
    }
}

impl fmt::Display for FileOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeleteAll => write!(f, "deleteAll()"),
            Self::DeleteBlob { hash } => write!(f, "deleteBlob({})", hash.short_hex()),
            Self::DeletePath { path } => write!(f, "deletePath({path})"),
            Self::DeletePathPrefix { prefix } => write!(f, "deletePathPrefix({prefix})"),
            Self::DeletePathRange { prefix, start, end } => {
                write!(f, "deletePathRange({prefix}, {start}, {end})")
            }
            Self::WriteBlob { blob } => write!(f, "writeBlob({})", blob.hash().short_hex()),
            Self::WritePath { path, blob } => {
                write!(f, "writePath({path}, {})", blob.hash().short_hex())
            }
        }
    }
}
