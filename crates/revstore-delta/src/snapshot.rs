use std::collections::BTreeMap;
use std::sync::Arc;

use revstore_types::{Blob, ContentHash, StorageId, StoragePath};

use crate::change::FileChange;
use crate::delta::FileDelta;
use crate::error::{DeltaError, DeltaResult};
use crate::file_op::FileOp;

/// The materialized contents of a file at one revision.
///
/// Snapshots are immutable. The id index is shared between clones, and
/// composing a change produces a new snapshot rather than editing this one,
/// so a snapshot handed out to a reader never changes underneath it.
#[derive(Clone, Debug)]
pub struct FileSnapshot {
    rev_num: u64,
    index: Arc<BTreeMap<StorageId, Blob>>,
}

impl FileSnapshot {
    /// Build a snapshot from a document delta.
    ///
    /// Returns [`DeltaError::BadValue`] if `contents` is not a document.
    pub fn new(rev_num: u64, contents: FileDelta) -> DeltaResult<Self> {
        if !contents.is_document() {
            return Err(DeltaError::BadValue(format!(
                "snapshot contents for revision {rev_num} must be a document"
            )));
        }
        let mut index = BTreeMap::new();
        for op in contents.into_ops() {
            apply_op(&mut index, op);
        }
        Ok(Self {
            rev_num,
            index: Arc::new(index),
        })
    }

    /// The empty snapshot at revision 0.
    pub fn empty() -> Self {
        Self {
            rev_num: 0,
            index: Arc::new(BTreeMap::new()),
        }
    }

    pub fn rev_num(&self) -> u64 {
        self.rev_num
    }

    /// Number of bound ids.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Look up a binding, failing with [`DeltaError::NotFound`] if absent.
    pub fn get(&self, id: &StorageId) -> DeltaResult<&Blob> {
        self.get_or_none(id)
            .ok_or_else(|| DeltaError::NotFound(id.clone()))
    }

    pub fn get_or_none(&self, id: &StorageId) -> Option<&Blob> {
        self.index.get(id)
    }

    pub fn get_path(&self, path: &StoragePath) -> Option<&Blob> {
        self.index.get(&StorageId::Path(path.clone()))
    }

    pub fn get_blob(&self, hash: &ContentHash) -> Option<&Blob> {
        self.index.get(&StorageId::Hash(*hash))
    }

    pub fn contains(&self, id: &StorageId) -> bool {
        self.index.contains_key(id)
    }

    /// All bindings in id order. The iterator borrows the snapshot and can be
    /// restarted by calling `entries()` again.
    pub fn entries(&self) -> impl Iterator<Item = (&StorageId, &Blob)> {
        self.index.iter()
    }

    /// Path bindings at `prefix` or beneath it, in path order.
    pub fn paths_with_prefix<'a>(
        &'a self,
        prefix: &'a StoragePath,
    ) -> impl Iterator<Item = (&'a StoragePath, &'a Blob)> + 'a {
        // Every path that starts with the prefix text sorts contiguously from
        // the prefix itself; component-wise matching then filters `/ab` from `/a`.
        self.index
            .range(StorageId::Path(prefix.clone())..)
            .map_while(|(id, blob)| id.as_path().map(|path| (path, blob)))
            .take_while(move |(path, _)| path.as_str().starts_with(prefix.as_str()))
            .filter(move |(path, _)| path.is_prefix_or_same(prefix))
    }

    /// Path bindings of the form `<prefix>/<n>` with `start <= n < end`.
    pub fn paths_in_range<'a>(
        &'a self,
        prefix: &'a StoragePath,
        start: u64,
        end: u64,
    ) -> impl Iterator<Item = (&'a StoragePath, &'a Blob)> + 'a {
        self.paths_with_prefix(prefix)
            .filter(move |(path, _)| path.in_numeric_range(prefix, start, end))
    }

    /// The contents as a document delta, in id order.
    pub fn contents(&self) -> FileDelta {
        self.index
            .iter()
            .map(|(id, blob)| write_op(id, blob))
            .collect()
    }

    /// Apply `change` to produce the snapshot at `change.rev_num`.
    ///
    /// Equivalent to `self.contents().compose(&change.delta, true)` wrapped
    /// at the change's revision, but edits the index directly.
    pub fn compose(&self, change: &FileChange) -> DeltaResult<FileSnapshot> {
        if change.rev_num < self.rev_num {
            return Err(DeltaError::BadValue(format!(
                "cannot compose revision {} onto snapshot at revision {}",
                change.rev_num, self.rev_num
            )));
        }
        let mut index = BTreeMap::clone(&self.index);
        for op in change.delta.ops() {
            apply_op(&mut index, op.clone());
        }
        Ok(FileSnapshot {
            rev_num: change.rev_num,
            index: Arc::new(index),
        })
    }

    /// The minimal edit that turns this snapshot's contents into `newer`'s.
    ///
    /// Removed ids get an explicit `deletePath`/`deleteBlob`; new or changed
    /// ids get a write.
    pub fn diff(&self, newer: &FileSnapshot) -> FileDelta {
        let mut ops = Vec::new();
        for id in self.index.keys() {
            if !newer.index.contains_key(id) {
                ops.push(match id {
                    StorageId::Path(path) => FileOp::delete_path(path.clone()),
                    StorageId::Hash(hash) => FileOp::delete_blob(*hash),
                });
            }
        }
        for (id, blob) in newer.index.iter() {
            if self.index.get(id) != Some(blob) {
                ops.push(write_op(id, blob));
            }
        }
        FileDelta::new(ops)
    }
}

impl Default for FileSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for FileSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.rev_num == other.rev_num
            && (Arc::ptr_eq(&self.index, &other.index) || self.index == other.index)
    }
}

impl Eq for FileSnapshot {}

fn write_op(id: &StorageId, blob: &Blob) -> FileOp {
    match id {
        StorageId::Path(path) => FileOp::write_path(path.clone(), blob.clone()),
        StorageId::Hash(_) => FileOp::write_blob(blob.clone()),
    }
}

fn apply_op(index: &mut BTreeMap<StorageId, Blob>, op: FileOp) {
    match op {
        FileOp::DeleteAll => index.clear(),
        FileOp::DeleteBlob { hash } => {
            index.remove(&StorageId::Hash(hash));
        }
        FileOp::DeletePath { path } => {
            index.remove(&StorageId::Path(path));
        }
        FileOp::DeletePathPrefix { .. } | FileOp::DeletePathRange { .. } => {
            index.retain(|id, _| !op.deletes(id));
        }
        FileOp::WriteBlob { blob } => {
            index.insert(StorageId::Hash(blob.hash()), blob);
        }
        FileOp::WritePath { path, blob } => {
            index.insert(StorageId::Path(path), blob);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn p(s: &str) -> StoragePath {
        StoragePath::parse(s).unwrap()
    }

    fn write(path: &str, content: &str) -> FileOp {
        FileOp::write_path(p(path), Blob::from(content))
    }

    fn snap(rev_num: u64, ops: Vec<FileOp>) -> FileSnapshot {
        FileSnapshot::new(rev_num, FileDelta::new(ops)).unwrap()
    }

    #[test]
    fn non_document_is_rejected() {
        let err = FileSnapshot::new(1, FileDelta::new(vec![FileOp::delete_all()])).unwrap_err();
        assert!(matches!(err, DeltaError::BadValue(_)));
    }

    #[test]
    fn get_and_get_or_none() {
        let s = snap(1, vec![write("/a", "1")]);
        let a: StorageId = p("/a").into();
        let b: StorageId = p("/b").into();
        assert_eq!(s.get(&a).unwrap().as_str(), Some("1"));
        assert_eq!(s.get(&b), Err(DeltaError::NotFound(b.clone())));
        assert!(s.get_or_none(&b).is_none());
    }

    #[test]
    fn entries_are_restartable() {
        let s = snap(1, vec![write("/b", "2"), write("/a", "1")]);
        let first: Vec<_> = s.entries().map(|(id, _)| id.to_string()).collect();
        let second: Vec<_> = s.entries().map(|(id, _)| id.to_string()).collect();
        assert_eq!(first, vec!["/a", "/b"]);
        assert_eq!(first, second);
    }

    #[test]
    fn equality_is_structural() {
        let a = snap(2, vec![write("/a", "1"), write("/b", "2")]);
        let b = snap(2, vec![write("/b", "2"), write("/a", "1")]);
        assert_eq!(a, b);
        assert_ne!(a, snap(3, vec![write("/a", "1"), write("/b", "2")]));
        assert_ne!(a, snap(2, vec![write("/a", "1")]));
    }

    #[test]
    fn compose_produces_new_snapshot() {
        let base = snap(1, vec![write("/a", "1")]);
        let change = FileChange::new(2, FileDelta::new(vec![write("/b", "2")]));
        let next = base.compose(&change).unwrap();
        assert_eq!(next.rev_num(), 2);
        assert_eq!(next.len(), 2);
        // The original is untouched.
        assert_eq!(base.len(), 1);
        assert_eq!(base.rev_num(), 1);
    }

    #[test]
    fn compose_rejects_older_revision() {
        let base = snap(4, vec![]);
        let change = FileChange::new(3, FileDelta::empty());
        assert!(base.compose(&change).is_err());
    }

    #[test]
    fn prefix_and_range_listing() {
        let s = snap(
            1,
            vec![
                write("/bakery", "0"),
                write("/bakery/muffin", "m"),
                write("/bakery-annex", "a"),
                write("/bakeryx", "x"),
                write("/baker", "b"),
                write("/foo/1", "v"),
                write("/foo/2", "v"),
                write("/foo/10", "v"),
                write("/foo/11", "v"),
                write("/foo/12", "v"),
            ],
        );
        let bakery = p("/bakery");
        let listed: Vec<&str> = s.paths_with_prefix(&bakery).map(|(p, _)| p.as_str()).collect();
        assert_eq!(listed, vec!["/bakery", "/bakery/muffin"]);

        let foo = p("/foo");
        let mut ranged: Vec<&str> = s.paths_in_range(&foo, 2, 12).map(|(p, _)| p.as_str()).collect();
        ranged.sort();
        assert_eq!(ranged, vec!["/foo/10", "/foo/11", "/foo/2"]);
    }

    #[test]
    fn diff_emits_writes_and_deletes() {
        let blob = Blob::from("loose");
        let old = snap(1, vec![write("/a", "1"), write("/b", "1"), FileOp::write_blob(blob.clone())]);
        let new = snap(2, vec![write("/a", "1"), write("/b", "2"), write("/c", "3")]);
        let diff = old.diff(&new);
        assert_eq!(
            diff.ops(),
            &[
                FileOp::delete_blob(&blob),
                write("/b", "2"),
                write("/c", "3"),
            ]
        );
    }

    #[test]
    fn diff_against_self_is_empty() {
        let s = snap(5, vec![write("/a", "1"), FileOp::write_blob(Blob::from("z"))]);
        assert!(s.diff(&s).is_empty());
    }

    fn arb_doc() -> impl Strategy<Value = FileDelta> {
        prop::collection::btree_map(0u8..12, prop::sample::select(vec!["x", "y", "z"]), 0..8)
            .prop_map(|m| {
                m.into_iter()
                    .map(|(k, v)| FileOp::write_path(p(&format!("/k/{k}")), Blob::from(v)))
                    .collect()
            })
    }

    proptest! {
        #[test]
        fn diff_reconstructs_newer(old in arb_doc(), new in arb_doc()) {
            let old = FileSnapshot::new(1, old).unwrap();
            let new = FileSnapshot::new(2, new).unwrap();
            let change = FileChange::new(2, old.diff(&new));
            prop_assert_eq!(old.compose(&change).unwrap(), new);
        }

        #[test]
        fn compose_matches_delta_algebra(old in arb_doc(), edit in arb_doc()) {
            let base = FileSnapshot::new(1, old).unwrap();
            let change = FileChange::new(2, edit);
            let via_index = base.compose(&change).unwrap();
            let via_delta = FileSnapshot::new(2, base.contents().compose(&change.delta, true)).unwrap();
            prop_assert_eq!(via_index, via_delta);
        }

        #[test]
        fn diff_of_any_doc_against_itself_is_empty(doc in arb_doc()) {
            let s = FileSnapshot::new(3, doc).unwrap();
            prop_assert!(s.diff(&s).is_empty());
        }
    }
}
