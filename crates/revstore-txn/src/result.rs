use std::collections::{BTreeMap, BTreeSet};

use revstore_delta::FileSnapshot;
use revstore_types::{Blob, StorageId, StoragePath};

/// Reads and listings gathered by a pull.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PullResult {
    pub data: BTreeMap<StorageId, Blob>,
    pub paths: BTreeSet<StoragePath>,
}

/// Outcome of testing a wait condition once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    Unsatisfied,
    /// `id` is the wait's target; `None` for revision waits.
    Satisfied { id: Option<StorageId> },
}

impl WaitOutcome {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied { .. })
    }
}

/// What `transact()` hands back.
///
/// `new_rev_num` is set only for pushes; `data` and `paths` only for pulls
/// and satisfied waits. `None` means the concept does not apply, which is
/// distinct from an empty result.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransactionResult {
    pub rev_num: u64,
    pub new_rev_num: Option<u64>,
    pub data: Option<BTreeMap<StorageId, Blob>>,
    pub paths: Option<BTreeSet<StoragePath>>,
}

impl TransactionResult {
    /// Result of a prerequisite-only transaction.
    pub fn checked(rev_num: u64) -> Self {
        Self {
            rev_num,
            ..Self::default()
        }
    }

    pub fn pulled(rev_num: u64, pull: PullResult) -> Self {
        Self {
            rev_num,
            data: Some(pull.data),
            paths: Some(pull.paths),
            ..Self::default()
        }
    }

    pub fn pushed(rev_num: u64, new_rev_num: u64) -> Self {
        Self {
            rev_num,
            new_rev_num: Some(new_rev_num),
            ..Self::default()
        }
    }

    /// Result of a wait satisfied at `snapshot` for target `id`.
    ///
    /// A path target is reported in `paths`. A hash target is reported in
    /// `data`, bound to its blob when present and as an empty map when the
    /// wait was for absence.
    pub fn waited(snapshot: &FileSnapshot, id: Option<StorageId>) -> Self {
        let mut result = Self::checked(snapshot.rev_num());
        match id {
            Some(StorageId::Path(path)) => {
                result.paths = Some(BTreeSet::from([path]));
            }
            Some(id @ StorageId::Hash(_)) => {
                let mut data = BTreeMap::new();
                if let Some(blob) = snapshot.get_or_none(&id) {
                    data.insert(id.clone(), blob.clone());
                }
                result.data = Some(data);
            }
            None => {}
        }
        result
    }

    /// Convenience lookup of a path in `data`.
    pub fn blob_at(&self, path: &StoragePath) -> Option<&Blob> {
        self.data
            .as_ref()?
            .get(&StorageId::Path(path.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revstore_delta::{FileDelta, FileOp};

    fn p(s: &str) -> StoragePath {
        StoragePath::parse(s).unwrap()
    }

    #[test]
    fn unused_fields_stay_none() {
        let checked = TransactionResult::checked(3);
        assert!(checked.new_rev_num.is_none());
        assert!(checked.data.is_none());
        assert!(checked.paths.is_none());

        let pushed = TransactionResult::pushed(3, 4);
        assert_eq!(pushed.new_rev_num, Some(4));
        assert!(pushed.data.is_none());

        let pulled = TransactionResult::pulled(3, PullResult::default());
        assert_eq!(pulled.data, Some(BTreeMap::new()));
        assert_eq!(pulled.paths, Some(BTreeSet::new()));
    }

    #[test]
    fn waited_reports_target() {
        let blob = Blob::from("b");
        let snap = FileSnapshot::new(
            2,
            FileDelta::new(vec![
                FileOp::write_path(p("/a"), blob.clone()),
                FileOp::write_blob(blob.clone()),
            ]),
        )
        .unwrap();

        let by_path = TransactionResult::waited(&snap, Some(p("/a").into()));
        assert_eq!(by_path.rev_num, 2);
        assert_eq!(by_path.paths, Some(BTreeSet::from([p("/a")])));
        assert!(by_path.data.is_none());

        let by_hash = TransactionResult::waited(&snap, Some(blob.hash().into()));
        assert_eq!(by_hash.data.unwrap().len(), 1);

        let absent = Blob::from("gone");
        let by_absent = TransactionResult::waited(&snap, Some(absent.hash().into()));
        assert_eq!(by_absent.data, Some(BTreeMap::new()));

        let by_rev = TransactionResult::waited(&snap, None);
        assert!(by_rev.data.is_none() && by_rev.paths.is_none());
    }
}
