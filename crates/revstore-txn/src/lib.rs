//! Transactions for revstore.
//!
//! Callers describe a transaction as a list of [`TransactionOp`]s. A
//! [`TransactionSpec`] validates the list once, classifies it as exactly one
//! [`TransactionKind`], and then knows how to run itself against a
//! [`FileSnapshot`](revstore_delta::FileSnapshot):
//!
//! - prerequisite-only: check predicates, report the revision
//! - pull: check predicates, gather reads and listings
//! - push: check predicates, build the delta to append
//! - wait: check predicates, test the single wait condition
//!
//! The spec never touches storage; the engine owns the log and decides when
//! to re-run a wait.

pub mod error;
pub mod op;
pub mod result;
pub mod spec;

pub use error::{TxnError, TxnResult};
pub use op::{ListOp, OpCategory, ReadOp, TransactionOp, WaitOp};
pub use result::{PullResult, TransactionResult, WaitOutcome};
pub use spec::{TransactionKind, TransactionSpec};
