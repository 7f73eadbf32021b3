//! Disk-backed engine for revstore files.
//!
//! A [`LocalFile`] owns one file's revision log. It loads the log from its
//! storage directory on first use, derives snapshots on demand, runs
//! [`TransactionSpec`](revstore_txn::TransactionSpec)s against them, and
//! writes new revisions back with a debounced write-behind task.
//!
//! Directory layout:
//!
//! ```text
//! <storage_root>/<file_id>/00000000.blob
//! <storage_root>/<file_id>/00000001.blob
//! ...
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod local_file;
pub mod store;

pub use config::FileConfig;
pub use error::{FileError, Result};
pub use local_file::LocalFile;
pub use store::{validate_file_id, LocalFileStore};
