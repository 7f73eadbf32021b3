use std::fmt;

use serde::{Deserialize, Serialize};

use revstore_types::{ContentHash, StorageId, StoragePath};

use crate::error::{DeltaError, DeltaResult};
use crate::snapshot::FileSnapshot;

/// A pure boolean test against a snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredicateOp {
    BlobAbsent { hash: ContentHash },
    BlobPresent { hash: ContentHash },
    PathAbsent { path: StoragePath },
    PathPresent { path: StoragePath },
    /// The path is bound to the blob with `hash`.
    PathIs { path: StoragePath, hash: ContentHash },
    /// The path is unbound, or bound to a blob other than `hash`.
    PathIsNot { path: StoragePath, hash: ContentHash },
    RevNumIs { rev_num: u64 },
}

impl PredicateOp {
    pub fn blob_absent(hash: impl Into<ContentHash>) -> Self {
        Self::BlobAbsent { hash: hash.into() }
    }

    pub fn blob_present(hash: impl Into<ContentHash>) -> Self {
        Self::BlobPresent { hash: hash.into() }
    }

    pub fn path_absent(path: StoragePath) -> Self {
        Self::PathAbsent { path }
    }

    pub fn path_present(path: StoragePath) -> Self {
        Self::PathPresent { path }
    }

    pub fn path_is(path: StoragePath, hash: impl Into<ContentHash>) -> Self {
        Self::PathIs {
            path,
            hash: hash.into(),
        }
    }

    pub fn path_is_not(path: StoragePath, hash: impl Into<ContentHash>) -> Self {
        Self::PathIsNot {
            path,
            hash: hash.into(),
        }
    }

    pub fn rev_num_is(rev_num: u64) -> Self {
        Self::RevNumIs { rev_num }
    }

    pub fn opcode(&self) -> &'static str {
        match self {
            Self::BlobAbsent { .. } => "blobAbsent",
            Self::BlobPresent { .. } => "blobPresent",
            Self::PathAbsent { .. } => "pathAbsent",
            Self::PathPresent { .. } => "pathPresent",
            Self::PathIs { .. } => "pathIs",
            Self::PathIsNot { .. } => "pathIsNot",
            Self::RevNumIs { .. } => "revNumIs",
        }
    }

    /// Evaluate against `snapshot`.
    pub fn test(&self, snapshot: &FileSnapshot) -> bool {
        match self {
            Self::BlobAbsent { hash } => !snapshot.contains(&StorageId::Hash(*hash)),
            Self::BlobPresent { hash } => snapshot.contains(&StorageId::Hash(*hash)),
            Self::PathAbsent { path } => snapshot.get_path(path).is_none(),
            Self::PathPresent { path } => snapshot.get_path(path).is_some(),
            Self::PathIs { path, hash } => {
                snapshot.get_path(path).is_some_and(|b| b.hash() == *hash)
            }
            Self::PathIsNot { path, hash } => {
                snapshot.get_path(path).map_or(true, |b| b.hash() != *hash)
            }
            Self::RevNumIs { rev_num } => snapshot.rev_num() == *rev_num,
        }
    }

    /// Evaluate against `snapshot`, failing with an error that names what
    /// was missing or mismatched.
    pub fn check(&self, snapshot: &FileSnapshot) -> DeltaResult<()> {
        if self.test(snapshot) {
            return Ok(());
        }
        Err(match self {
            Self::BlobPresent { hash } => DeltaError::BlobNotFound(*hash),
            Self::PathPresent { path } => DeltaError::PathNotFound(path.clone()),
            Self::PathIs { path, hash } => {
                if snapshot.get_path(path).is_none() {
                    DeltaError::PathNotFound(path.clone())
                } else {
                    DeltaError::PathHashMismatch {
                        path: path.clone(),
                        expected: *hash,
                    }
                }
            }
            Self::BlobAbsent { .. }
            | Self::PathAbsent { .. }
            | Self::PathIsNot { .. }
            | Self::RevNumIs { .. } => DeltaError::PredicateFailed(self.clone()),
        })
    }
}

impl fmt::Display for PredicateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BlobAbsent { hash } | Self::BlobPresent { hash } => {
                write!(f, "{}({})", self.opcode(), hash.short_hex())
            }
            Self::PathAbsent { path } | Self::PathPresent { path } => {
                write!(f, "{}({path})", self.opcode())
            }
            Self::PathIs { path, hash } | Self::PathIsNot { path, hash } => {
                write!(f, "{}({path}, {})", self.opcode(), hash.short_hex())
            }
            Self::RevNumIs { rev_num } => write!(f, "revNumIs({rev_num})"),
        }
    }
}

/// A list of predicates evaluated together.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PredicateSpec {
    ops: Vec<PredicateOp>,
}

impl PredicateSpec {
    pub fn new(ops: Vec<PredicateOp>) -> Self {
        Self { ops }
    }

    pub fn ops(&self) -> &[PredicateOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// `true` if every predicate passes (vacuously true when empty).
    pub fn all_pass(&self, snapshot: &FileSnapshot) -> bool {
        self.ops.iter().all(|op| op.test(snapshot))
    }

    /// `true` if at least one predicate passes (false when empty).
    pub fn any_pass(&self, snapshot: &FileSnapshot) -> bool {
        self.ops.iter().any(|op| op.test(snapshot))
    }

    /// Fail on the first predicate (in declaration order) that does not pass.
    pub fn throw_if_not_all_pass(&self, snapshot: &FileSnapshot) -> DeltaResult<()> {
        self.ops.iter().try_for_each(|op| op.check(snapshot))
    }
}

impl FromIterator<PredicateOp> for PredicateSpec {
    fn from_iter<I: IntoIterator<Item = PredicateOp>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::FileDelta;
    use crate::file_op::FileOp;
    use revstore_types::Blob;

    fn p(s: &str) -> StoragePath {
        StoragePath::parse(s).unwrap()
    }

    fn snapshot() -> FileSnapshot {
        FileSnapshot::new(
            3,
            FileDelta::new(vec![
                FileOp::write_path(p("/a"), Blob::from("apple")),
                FileOp::write_blob(Blob::from("loose")),
            ]),
        )
        .unwrap()
    }

    #[test]
    fn each_predicate_evaluates() {
        let snap = snapshot();
        let apple = Blob::from("apple");
        let loose = Blob::from("loose");
        let other = Blob::from("other");

        assert!(PredicateOp::blob_present(&loose).test(&snap));
        assert!(!PredicateOp::blob_absent(&loose).test(&snap));
        assert!(PredicateOp::blob_absent(&other).test(&snap));
        // Path bindings are not blob bindings.
        assert!(!PredicateOp::blob_present(&apple).test(&snap));

        assert!(PredicateOp::path_present(p("/a")).test(&snap));
        assert!(PredicateOp::path_absent(p("/b")).test(&snap));
        assert!(PredicateOp::path_is(p("/a"), &apple).test(&snap));
        assert!(!PredicateOp::path_is(p("/a"), &other).test(&snap));
        assert!(PredicateOp::path_is_not(p("/a"), &other).test(&snap));
        assert!(PredicateOp::path_is_not(p("/b"), &apple).test(&snap));
        assert!(!PredicateOp::path_is_not(p("/a"), &apple).test(&snap));

        assert!(PredicateOp::rev_num_is(3).test(&snap));
        assert!(!PredicateOp::rev_num_is(2).test(&snap));
    }

    #[test]
    fn failures_are_tagged() {
        let snap = snapshot();
        let other = Blob::from("other");

        assert_eq!(
            PredicateOp::path_present(p("/b")).check(&snap),
            Err(DeltaError::PathNotFound(p("/b")))
        );
        assert_eq!(
            PredicateOp::path_is(p("/b"), &other).check(&snap),
            Err(DeltaError::PathNotFound(p("/b")))
        );
        assert_eq!(
            PredicateOp::path_is(p("/a"), &other).check(&snap),
            Err(DeltaError::PathHashMismatch {
                path: p("/a"),
                expected: other.hash()
            })
        );
        assert_eq!(
            PredicateOp::blob_present(&other).check(&snap),
            Err(DeltaError::BlobNotFound(other.hash()))
        );
        assert_eq!(
            PredicateOp::rev_num_is(9).check(&snap),
            Err(DeltaError::PredicateFailed(PredicateOp::rev_num_is(9)))
        );
    }

    #[test]
    fn spec_combinators() {
        let snap = snapshot();
        let spec = PredicateSpec::new(vec![
            PredicateOp::path_present(p("/a")),
            PredicateOp::path_present(p("/missing")),
            PredicateOp::rev_num_is(99),
        ]);
        assert!(!spec.all_pass(&snap));
        assert!(spec.any_pass(&snap));
        // First failure in declaration order is reported.
        assert_eq!(
            spec.throw_if_not_all_pass(&snap),
            Err(DeltaError::PathNotFound(p("/missing")))
        );

        let empty = PredicateSpec::default();
        assert!(empty.all_pass(&snap));
        assert!(!empty.any_pass(&snap));
        assert!(empty.throw_if_not_all_pass(&snap).is_ok());
    }
}
