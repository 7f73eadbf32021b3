use serde::{Deserialize, Serialize};

use crate::delta::FileDelta;

/// One entry in a file's revision log: the delta that produced `rev_num`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub rev_num: u64,
    pub delta: FileDelta,
}

impl FileChange {
    pub fn new(rev_num: u64, delta: FileDelta) -> Self {
        Self { rev_num, delta }
    }

    /// The change that creates a file: revision 0 with no contents.
    pub fn first() -> Self {
        Self::new(0, FileDelta::empty())
    }
}
