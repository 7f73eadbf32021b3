use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::hash::ContentHash;
use crate::path::StoragePath;

/// Key of a binding in a file snapshot.
///
/// Paths sort before hashes; within each scheme the natural order of the
/// underlying type applies.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StorageId {
    /// A hierarchical path binding.
    Path(StoragePath),
    /// A blob bound under its own content hash.
    Hash(ContentHash),
}

impl StorageId {
    /// Parse either form: strings starting with `/` are paths, anything else
    /// must be a hex content hash.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        if s.starts_with('/') {
            StoragePath::parse(s).map(Self::Path)
        } else {
            s.parse::<ContentHash>()
                .map(Self::Hash)
                .map_err(|_| TypeError::InvalidId(s.to_string()))
        }
    }

    /// The path, if this id addresses a path.
    pub fn as_path(&self) -> Option<&StoragePath> {
        match self {
            Self::Path(path) => Some(path),
            Self::Hash(_) => None,
        }
    }

    /// The hash, if this id addresses a blob by content.
    pub fn as_hash(&self) -> Option<&ContentHash> {
        match self {
            Self::Path(_) => None,
            Self::Hash(hash) => Some(hash),
        }
    }

    pub fn is_path(&self) -> bool {
        matches!(self, Self::Path(_))
    }
}

impl From<StoragePath> for StorageId {
    fn from(path: StoragePath) -> Self {
        Self::Path(path)
    }
}

impl From<ContentHash> for StorageId {
    fn from(hash: ContentHash) -> Self {
        Self::Hash(hash)
    }
}

impl FromStr for StorageId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for StorageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{path:?}"),
            Self::Hash(hash) => write!(f, "{hash:?}"),
        }
    }
}

impl fmt::Display for StorageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{path}"),
            Self::Hash(hash) => write!(f, "{hash}"),
        }
    }
}
