use std::fmt;

use tracing::debug;

use revstore_delta::{FileDelta, FileOp, FileSnapshot, PredicateSpec};

use crate::error::{TxnError, TxnResult};
use crate::op::{ListOp, OpCategory, ReadOp, TransactionOp, WaitOp};
use crate::result::{PullResult, WaitOutcome};

/// What a validated transaction does.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    /// Only prerequisites (possibly none).
    Prerequisite,
    /// Reads and/or listings.
    Pull,
    /// Writes and/or deletes.
    Push,
    /// A single wait condition.
    Wait,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prerequisite => write!(f, "prerequisite"),
            Self::Pull => write!(f, "pull"),
            Self::Push => write!(f, "push"),
            Self::Wait => write!(f, "wait"),
        }
    }
}

/// A validated bundle of transaction ops.
///
/// Construction enforces:
/// - at most one `timeout` op
/// - at most one wait op
/// - at most one of {waits, reads/lists, writes/deletes} is non-empty
///
/// Ops keep their declaration order, so a push's delta applies its writes
/// and deletes exactly as listed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionSpec {
    ops: Vec<TransactionOp>,
    kind: TransactionKind,
    prerequisites: PredicateSpec,
    timeout_msec: Option<u64>,
}

impl TransactionSpec {
    pub fn new(ops: Vec<TransactionOp>) -> TxnResult<Self> {
        let mut timeouts = ops.iter().filter_map(|op| match op {
            TransactionOp::Timeout { msec } => Some(*msec),
            _ => None,
        });
        let timeout_msec = timeouts.next();
        if timeouts.next().is_some() {
            return Err(TxnError::BadUse("at most one timeout op is allowed".into()));
        }

        let count = |category: OpCategory| ops.iter().filter(|op| op.category() == category).count();
        let waits = count(OpCategory::Wait);
        let pulls = count(OpCategory::Read) + count(OpCategory::List);
        let pushes = count(OpCategory::Write) + count(OpCategory::Delete);

        if waits > 1 {
            return Err(TxnError::BadUse("at most one wait op is allowed".into()));
        }
        let present = [waits, pulls, pushes].iter().filter(|n| **n > 0).count();
        if present > 1 {
            return Err(TxnError::BadUse(format!(
                "a transaction may wait, pull, or push, but not combine them \
                 (waits={waits}, reads/lists={pulls}, writes/deletes={pushes})"
            )));
        }

        let kind = if waits > 0 {
            TransactionKind::Wait
        } else if pulls > 0 {
            TransactionKind::Pull
        } else if pushes > 0 {
            TransactionKind::Push
        } else {
            TransactionKind::Prerequisite
        };

        let prerequisites = ops
            .iter()
            .filter_map(|op| match op {
                TransactionOp::Prerequisite(predicate) => Some(predicate.clone()),
                _ => None,
            })
            .collect();

        Ok(Self {
            ops,
            kind,
            prerequisites,
            timeout_msec,
        })
    }

    pub fn ops(&self) -> &[TransactionOp] {
        &self.ops
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn prerequisites(&self) -> &PredicateSpec {
        &self.prerequisites
    }

    /// The explicit timeout, or `None` to let the engine pick its default.
    pub fn timeout_msec(&self) -> Option<u64> {
        self.timeout_msec
    }

    /// The wait condition, for wait transactions.
    pub fn wait_op(&self) -> Option<&WaitOp> {
        self.ops.iter().find_map(|op| match op {
            TransactionOp::Wait(wait) => Some(wait),
            _ => None,
        })
    }

    /// Check every prerequisite, failing on the first that does not pass.
    pub fn run_prerequisites(&self, snapshot: &FileSnapshot) -> TxnResult<()> {
        self.prerequisites
            .throw_if_not_all_pass(snapshot)
            .map_err(TxnError::from)
    }

    /// Check prerequisites, then gather reads and listings.
    ///
    /// Reads of unbound ids are omitted from `data`.
    pub fn run_pull(&self, snapshot: &FileSnapshot) -> TxnResult<PullResult> {
        self.expect_kind(TransactionKind::Pull)?;
        self.run_prerequisites(snapshot)?;

        let mut result = PullResult::default();
        for op in &self.ops {
            match op {
                TransactionOp::Read(ReadOp::Blob { hash }) => {
                    if let Some(blob) = snapshot.get_blob(hash) {
                        result.data.insert((*hash).into(), blob.clone());
                    }
                }
                TransactionOp::Read(ReadOp::Path { path }) => {
                    if let Some(blob) = snapshot.get_path(path) {
                        result.data.insert(path.clone().into(), blob.clone());
                    }
                }
                TransactionOp::Read(ReadOp::PathRange { prefix, start, end }) => {
                    for (path, blob) in snapshot.paths_in_range(prefix, *start, *end) {
                        result.data.insert(path.clone().into(), blob.clone());
                    }
                }
                TransactionOp::List(ListOp::PathPrefix { prefix }) => {
                    result
                        .paths
                        .extend(snapshot.paths_with_prefix(prefix).map(|(path, _)| path.clone()));
                }
                TransactionOp::List(ListOp::PathRange { prefix, start, end }) => {
                    result.paths.extend(
                        snapshot
                            .paths_in_range(prefix, *start, *end)
                            .map(|(path, _)| path.clone()),
                    );
                }
                TransactionOp::Prerequisite(_)
                | TransactionOp::Mutate(_)
                | TransactionOp::Wait(_)
                | TransactionOp::Timeout { .. } => {}
            }
        }
        debug!(
            rev_num = snapshot.rev_num(),
            blobs = result.data.len(),
            paths = result.paths.len(),
            "pull gathered"
        );
        Ok(result)
    }

    /// Check prerequisites, then build the delta of every write and delete
    /// in declaration order.
    pub fn run_push(&self, snapshot: &FileSnapshot) -> TxnResult<FileDelta> {
        self.expect_kind(TransactionKind::Push)?;
        self.run_prerequisites(snapshot)?;

        let ops: Vec<FileOp> = self
            .ops
            .iter()
            .filter_map(|op| match op {
                TransactionOp::Mutate(file_op) => Some(file_op.clone()),
                _ => None,
            })
            .collect();
        Ok(FileDelta::new(ops))
    }

    /// Check prerequisites, then test the wait condition once.
    pub fn run_wait(&self, snapshot: &FileSnapshot) -> TxnResult<WaitOutcome> {
        self.expect_kind(TransactionKind::Wait)?;
        self.run_prerequisites(snapshot)?;

        let wait = self
            .wait_op()
            .ok_or_else(|| TxnError::BadUse("wait transaction has no wait op".into()))?;
        if wait.test(snapshot) {
            Ok(WaitOutcome::Satisfied { id: wait.target() })
        } else {
            Ok(WaitOutcome::Unsatisfied)
        }
    }

    fn expect_kind(&self, kind: TransactionKind) -> TxnResult<()> {
        if self.kind != kind {
            return Err(TxnError::BadUse(format!(
                "cannot run a {} transaction as a {kind}",
                self.kind
            )));
        }
        Ok(())
    }
}
