use thiserror::Error;

/// Errors produced when constructing or parsing foundation types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid storage path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid storage id: {0:?}")]
    InvalidId(String),
}
