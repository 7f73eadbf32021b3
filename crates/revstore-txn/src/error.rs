use revstore_delta::DeltaError;

/// Errors from building or running a transaction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TxnError {
    /// The op list cannot form a valid transaction.
    #[error("bad use: {0}")]
    BadUse(String),

    /// A prerequisite failed or a snapshot operation was invalid.
    #[error(transparent)]
    Delta(#[from] DeltaError),
}

/// Result alias for transaction operations.
pub type TxnResult<T> = Result<T, TxnError>;
