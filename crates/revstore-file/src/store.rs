use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::config::FileConfig;
use crate::error::{FileError, Result};
use crate::local_file::LocalFile;

/// A storage root holding one directory per file.
///
/// Hands out a single shared [`LocalFile`] per file id, so every caller in
/// the process goes through the same engine for a given directory.
#[derive(Debug)]
pub struct LocalFileStore {
    root: PathBuf,
    config: FileConfig,
    files: Mutex<HashMap<String, LocalFile>>,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>, config: FileConfig) -> Self {
        Self {
            root: root.into(),
            config,
            files: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &FileConfig {
        &self.config
    }

    /// The engine for `file_id`, opened on first request.
    pub fn file(&self, file_id: &str) -> Result<LocalFile> {
        validate_file_id(file_id)?;
        let mut files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        let file = files.entry(file_id.to_owned()).or_insert_with(|| {
            debug!(file_id, "opening file");
            LocalFile::new(file_id, self.root.join(file_id), self.config.clone())
        });
        Ok(file.clone())
    }

    /// Ids of every directory under the root, sorted.
    ///
    /// A listed directory may still hold no valid revisions; check
    /// [`LocalFile::exists`] for that.
    pub async fn file_ids(&self) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if validate_file_id(name).is_ok() {
                    ids.push(name.to_owned());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Flush every file opened through this store.
    pub async fn flush_all(&self) -> Result<()> {
        let files: Vec<LocalFile> = {
            let files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
            files.values().cloned().collect()
        };
        for file in files {
            file.flush().await?;
        }
        Ok(())
    }
}

/// File ids become directory names: non-empty, `[A-Za-z0-9_-]` only.
pub fn validate_file_id(file_id: &str) -> Result<()> {
    let valid = !file_id.is_empty()
        && file_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if !valid {
        return Err(FileError::InvalidFileId(file_id.to_owned()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use revstore_txn::{TransactionOp, TransactionSpec};
    use revstore_types::{Blob, StoragePath};

    fn config() -> FileConfig {
        FileConfig {
            flush_delay_msec: 10,
            min_timeout_msec: 10,
            ..FileConfig::default()
        }
    }

    #[test]
    fn file_id_rules() {
        assert!(validate_file_id("notes_2024-01").is_ok());
        for bad in ["", "a/b", "..", "with space", "dot.ted"] {
            assert!(matches!(
                validate_file_id(bad),
                Err(FileError::InvalidFileId(_))
            ));
        }
    }

    #[tokio::test]
    async fn handles_are_shared() {
        let root = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(root.path(), config());

        let a = store.file("doc").unwrap();
        let b = store.file("doc").unwrap();
        a.create().await.unwrap();
        a.transact(
            &TransactionSpec::new(vec![TransactionOp::write_path(
                StoragePath::parse("/k").unwrap(),
                Blob::from("v"),
            )])
            .unwrap(),
        )
        .await
        .unwrap();

        // No flush yet, so this only works if both handles share one engine.
        assert_eq!(b.current_rev_num().await.unwrap(), 1);
        assert!(store.file("../escape").is_err());
    }

    #[tokio::test]
    async fn lists_file_directories() {
        let root = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(root.path().join("store"), config());
        assert!(store.file_ids().await.unwrap().is_empty());

        for id in ["beta", "alpha"] {
            store.file(id).unwrap().create().await.unwrap();
        }
        store.flush_all().await.unwrap();
        std::fs::write(root.path().join("store").join("stray.txt"), b"x").unwrap();

        assert_eq!(store.file_ids().await.unwrap(), vec!["alpha", "beta"]);
    }
}
