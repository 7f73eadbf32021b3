//! Ordered, composable lists of [`FileOp`]s.
//!
//! Composition is a last-write-wins merge keyed by storage id. Later ops
//! override earlier ones for the same id; `deleteAll`, prefix deletes, and
//! range deletes drop every earlier op they cover. When the caller asks for a
//! document result, deletions are consumed rather than carried forward.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use revstore_types::StorageId;

use crate::file_op::FileOp;

/// An ordered sequence of file ops.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDelta {
    ops: Vec<FileOp>,
}

impl FileDelta {
    pub fn new(ops: Vec<FileOp>) -> Self {
        Self { ops }
    }

    /// The empty delta, which is also the empty document.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[FileOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<FileOp> {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Returns `true` if this delta denotes a complete state: it has no
    /// deletions and writes each id at most once.
    pub fn is_document(&self) -> bool {
        let mut seen = HashSet::with_capacity(self.ops.len());
        for op in &self.ops {
            if op.is_delete() {
                return false;
            }
            if let Some(id) = op.target_id() {
                if !seen.insert(id) {
                    return false;
                }
            }
        }
        true
    }

    /// Compose `other` on top of `self`.
    ///
    /// With `want_document` the result contains only the surviving writes
    /// (ordered by when each was last written). Otherwise surviving deletions
    /// are retained so that composing the result onto a further base still
    /// clears what they cover.
    pub fn compose(&self, other: &FileDelta, want_document: bool) -> FileDelta {
        let mut slots: Vec<Option<FileOp>> = Vec::with_capacity(self.ops.len() + other.ops.len());
        let mut keyed: HashMap<StorageId, usize> = HashMap::new();

        for op in self.ops.iter().chain(other.ops.iter()) {
            if let Some(id) = op.target_id() {
                if let Some(index) = keyed.remove(&id) {
                    slots[index] = None;
                }
                if op.is_write() || !want_document {
                    keyed.insert(id, slots.len());
                    slots.push(Some(op.clone()));
                }
                continue;
            }

            if matches!(op, FileOp::DeleteAll) {
                slots.clear();
                keyed.clear();
            } else {
                keyed.retain(|id, index| {
                    if op.deletes(id) {
                        slots[*index] = None;
                        false
                    } else {
                        true
                    }
                });
            }
            if !want_document {
                slots.push(Some(op.clone()));
            }
        }

        FileDelta {
            ops: slots.into_iter().flatten().collect(),
        }
    }
}

impl From<Vec<FileOp>> for FileDelta {
    fn from(ops: Vec<FileOp>) -> Self {
        Self::new(ops)
    }
}

impl FromIterator<FileOp> for FileDelta {
    fn from_iter<I: IntoIterator<Item = FileOp>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a FileDelta {
    type Item = &'a FileOp;
    type IntoIter = std::slice::Iter<'a, FileOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.iter()
    }
}
