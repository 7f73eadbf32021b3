use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::sync::{watch, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use revstore_delta::{FileChange, FileSnapshot};
use revstore_txn::{TransactionKind, TransactionResult, TransactionSpec, WaitOutcome};

use crate::codec;
use crate::config::FileConfig;
use crate::error::{FileError, Result};

/// Lower bound on the delay before retrying a failed flush.
const RETRY_FLOOR: Duration = Duration::from_millis(10);

/// Retry delays stop doubling after this many consecutive failures.
const MAX_BACKOFF_SHIFT: u32 = 6;

/// Whether the file exists, as far as the engine knows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Presence {
    /// The storage directory has not been scanned yet.
    Uninitialized,
    Missing,
    Present,
}

/// Result of scanning a storage directory.
enum Scan {
    /// No directory at all.
    Missing,
    /// A directory with no recognizable revision files.
    Stale,
    Present(Vec<FileChange>),
}

/// Writes taken out of [`FileState`] for one flush pass.
struct FlushBatch {
    erase: bool,
    writes: BTreeMap<u64, Vec<u8>>,
    generation: u64,
}

#[derive(Debug)]
struct FileState {
    presence: Presence,
    /// The revision log; `changes[n].rev_num == n`.
    changes: Vec<FileChange>,
    /// Most recently computed snapshot. Replaced, never edited.
    snapshot_cache: Option<FileSnapshot>,
    /// Encoded revisions not yet on disk.
    storage_to_write: BTreeMap<u64, Vec<u8>>,
    /// The directory must be erased before anything else is written.
    erase_pending: bool,
    /// The scan found a directory holding only unrecognized files.
    stale_dir: bool,
    /// A write-behind task is queued and has not started yet.
    flush_scheduled: bool,
    /// Consecutive failed flush passes; stretches the retry delay.
    flush_failures: u32,
    /// Bumped on every delete; pending writes from an older generation are stale.
    generation: u64,
}

impl FileState {
    fn new() -> Self {
        Self {
            presence: Presence::Uninitialized,
            changes: Vec::new(),
            snapshot_cache: None,
            storage_to_write: BTreeMap::new(),
            erase_pending: false,
            stale_dir: false,
            flush_scheduled: false,
            flush_failures: 0,
            generation: 0,
        }
    }

    fn is_dirty(&self) -> bool {
        self.erase_pending || !self.storage_to_write.is_empty()
    }

    fn current_rev_num(&self) -> u64 {
        (self.changes.len() as u64).saturating_sub(1)
    }

    /// The snapshot at `rev_num`, composed forward from the cache when the
    /// cache is at or before it. A later snapshot replaces the cache.
    fn snapshot_at(&mut self, rev_num: u64) -> Result<FileSnapshot> {
        let current = self.current_rev_num();
        if rev_num > current {
            return Err(FileError::RevisionNotFound { rev_num, current });
        }

        let (mut snapshot, next) = match &self.snapshot_cache {
            Some(cached) if cached.rev_num() <= rev_num => (cached.clone(), cached.rev_num() + 1),
            _ => (FileSnapshot::empty(), 0),
        };
        for change in &self.changes[next as usize..=rev_num as usize] {
            snapshot = snapshot.compose(change)?;
        }

        let newer = self
            .snapshot_cache
            .as_ref()
            .map_or(true, |cached| cached.rev_num() < snapshot.rev_num());
        if newer {
            self.snapshot_cache = Some(snapshot.clone());
        }
        Ok(snapshot)
    }

    fn current_snapshot(&mut self) -> Result<FileSnapshot> {
        self.snapshot_at(self.current_rev_num())
    }

    fn append(&mut self, change: FileChange) -> Result<()> {
        let encoded = codec::encode_change(&change)?;
        self.storage_to_write.insert(change.rev_num, encoded);
        self.changes.push(change);
        Ok(())
    }

    fn take_batch(&mut self) -> FlushBatch {
        FlushBatch {
            erase: std::mem::take(&mut self.erase_pending),
            writes: std::mem::take(&mut self.storage_to_write),
            generation: self.generation,
        }
    }

    /// Put back a batch whose write failed, unless a delete has since made
    /// its revisions stale.
    fn restore(&mut self, batch: FlushBatch) {
        if batch.erase {
            self.erase_pending = true;
        }
        if batch.generation == self.generation {
            for (rev_num, bytes) in batch.writes {
                self.storage_to_write.entry(rev_num).or_insert(bytes);
            }
        }
    }
}

struct Shared {
    file_id: String,
    dir: PathBuf,
    config: FileConfig,
    /// The single critical section: scan, log, cache, and pending writes.
    state: Mutex<FileState>,
    /// Serializes disk writes so at most one flush is in flight.
    write_lock: Mutex<()>,
    /// Bumped on every push, create, and delete. Waiters re-test on change.
    changed: watch::Sender<u64>,
}

/// A disk-backed revision-controlled file.
///
/// Holds the revision log in memory, derives snapshots on demand, and
/// persists each revision as its own file under the storage directory with a
/// debounced write-behind task. Handles are cheap to clone and share one
/// engine; the directory is scanned once, on first use.
///
/// Every transaction runs its prerequisite check and its effect under the
/// same lock, so pushes are applied in the order their checks pass.
#[derive(Clone)]
pub struct LocalFile {
    inner: Arc<Shared>,
}

impl fmt::Debug for LocalFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalFile")
            .field("file_id", &self.inner.file_id)
            .field("dir", &self.inner.dir)
            .finish()
    }
}

impl LocalFile {
    /// A handle for the file stored in `dir`. Nothing is read until first use.
    ///
    /// Two handles created separately for the same directory do not
    /// coordinate; use [`LocalFileStore`](crate::LocalFileStore) to share one.
    pub fn new(file_id: impl Into<String>, dir: impl Into<PathBuf>, config: FileConfig) -> Self {
        let (changed, _) = watch::channel(0);
        Self {
            inner: Arc::new(Shared {
                file_id: file_id.into(),
                dir: dir.into(),
                config,
                state: Mutex::new(FileState::new()),
                write_lock: Mutex::new(()),
                changed,
            }),
        }
    }

    pub fn file_id(&self) -> &str {
        &self.inner.file_id
    }

    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    pub fn config(&self) -> &FileConfig {
        &self.inner.config
    }

    /// Whether the file currently exists.
    pub async fn exists(&self) -> Result<bool> {
        let state = self.lock_loaded().await?;
        Ok(state.presence == Presence::Present)
    }

    /// Create the file at revision 0 with no contents.
    ///
    /// A no-op on an existing file. Returns `true` if this call created it.
    pub async fn create(&self) -> Result<bool> {
        let mut state = self.lock_loaded().await?;
        if state.presence == Presence::Present {
            debug!(file_id = %self.inner.file_id, "create on existing file ignored");
            return Ok(false);
        }

        if std::mem::take(&mut state.stale_dir) {
            state.erase_pending = true;
        }
        state.presence = Presence::Present;
        state.changes.clear();
        state.snapshot_cache = None;
        state.append(FileChange::first())?;

        info!(file_id = %self.inner.file_id, "file created");
        self.notify();
        self.schedule_flush(&mut state);
        Ok(true)
    }

    /// Delete the file. The storage directory is erased by the next flush.
    ///
    /// A no-op on a missing file. Returns `true` if this call deleted it.
    pub async fn delete(&self) -> Result<bool> {
        let mut state = self.lock_loaded().await?;
        if state.presence != Presence::Present {
            debug!(file_id = %self.inner.file_id, "delete on missing file ignored");
            return Ok(false);
        }

        state.presence = Presence::Missing;
        state.changes.clear();
        state.snapshot_cache = None;
        state.storage_to_write.clear();
        state.stale_dir = false;
        state.erase_pending = true;
        state.generation += 1;

        info!(file_id = %self.inner.file_id, "file deleted");
        self.notify();
        self.schedule_flush(&mut state);
        Ok(true)
    }

    /// Run a transaction.
    ///
    /// The whole call, including any wait, is bounded by the transaction's timeout
    /// clamped to the configured range; exceeding it is
    /// [`FileError::TimedOut`].
    pub async fn transact(&self, spec: &TransactionSpec) -> Result<TransactionResult> {
        let timeout_msec = self.inner.config.clamp_timeout_msec(spec.timeout_msec());
        let run = async {
            match spec.kind() {
                TransactionKind::Prerequisite => self.check(spec).await,
                TransactionKind::Pull => self.pull(spec).await,
                TransactionKind::Push => self.push(spec).await,
                TransactionKind::Wait => self.wait(spec).await,
            }
        };
        match tokio::time::timeout(Duration::from_millis(timeout_msec), run).await {
            Ok(result) => result,
            Err(_) => {
                debug!(file_id = %self.inner.file_id, kind = %spec.kind(), timeout_msec, "transaction timed out");
                Err(FileError::TimedOut(timeout_msec))
            }
        }
    }

    /// The snapshot at `rev_num`, or at the current revision for `None`.
    pub async fn snapshot(&self, rev_num: Option<u64>) -> Result<FileSnapshot> {
        let mut state = self.lock_present().await?;
        match rev_num {
            Some(rev_num) => state.snapshot_at(rev_num),
            None => state.current_snapshot(),
        }
    }

    pub async fn current_rev_num(&self) -> Result<u64> {
        let state = self.lock_present().await?;
        Ok(state.current_rev_num())
    }

    /// The change that produced `rev_num`.
    pub async fn change(&self, rev_num: u64) -> Result<FileChange> {
        let state = self.lock_present().await?;
        usize::try_from(rev_num)
            .ok()
            .and_then(|index| state.changes.get(index))
            .cloned()
            .ok_or(FileError::RevisionNotFound {
                rev_num,
                current: state.current_rev_num(),
            })
    }

    /// Write every pending change to disk now, and keep writing until
    /// nothing is left pending.
    pub async fn flush(&self) -> Result<()> {
        self.flush_pending().await
    }

    // -----------------------------------------------------------------------
    // Transactions
    // -----------------------------------------------------------------------

    async fn check(&self, spec: &TransactionSpec) -> Result<TransactionResult> {
        let mut state = self.lock_present().await?;
        let snapshot = state.current_snapshot()?;
        spec.run_prerequisites(&snapshot)?;
        Ok(TransactionResult::checked(snapshot.rev_num()))
    }

    async fn pull(&self, spec: &TransactionSpec) -> Result<TransactionResult> {
        let mut state = self.lock_present().await?;
        let snapshot = state.current_snapshot()?;
        let pull = spec.run_pull(&snapshot)?;
        Ok(TransactionResult::pulled(snapshot.rev_num(), pull))
    }

    async fn push(&self, spec: &TransactionSpec) -> Result<TransactionResult> {
        let mut state = self.lock_present().await?;
        let snapshot = state.current_snapshot()?;
        let delta = spec.run_push(&snapshot)?;

        let rev_num = snapshot.rev_num();
        let new_rev_num = rev_num + 1;
        let ops = delta.len();
        state.append(FileChange::new(new_rev_num, delta))?;

        debug!(file_id = %self.inner.file_id, new_rev_num, ops, "revision appended");
        self.notify();
        self.schedule_flush(&mut state);
        Ok(TransactionResult::pushed(rev_num, new_rev_num))
    }

    async fn wait(&self, spec: &TransactionSpec) -> Result<TransactionResult> {
        loop {
            // Subscribing under the state lock means no change between this
            // test and the `changed()` below can be missed.
            let mut changed = {
                let mut state = self.lock_present().await?;
                let snapshot = state.current_snapshot()?;
                if let WaitOutcome::Satisfied { id } = spec.run_wait(&snapshot)? {
                    return Ok(TransactionResult::waited(&snapshot, id));
                }
                self.inner.changed.subscribe()
            };
            // `Shared` owns the sender, so it outlives every receiver here.
            let _ = changed.changed().await;
            debug!(file_id = %self.inner.file_id, "waiter woke");
        }
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    /// Lock the state, scanning the directory first if that has not happened.
    async fn lock_loaded(&self) -> Result<MutexGuard<'_, FileState>> {
        let mut state = self.inner.state.lock().await;
        if state.presence == Presence::Uninitialized {
            match scan_dir(&self.inner.dir).await? {
                Scan::Missing => {
                    debug!(file_id = %self.inner.file_id, "no storage directory");
                    state.presence = Presence::Missing;
                }
                Scan::Stale => {
                    warn!(
                        file_id = %self.inner.file_id,
                        dir = %self.inner.dir.display(),
                        "storage directory holds no revision files; treating file as missing"
                    );
                    state.presence = Presence::Missing;
                    state.stale_dir = true;
                }
                Scan::Present(changes) => {
                    info!(
                        file_id = %self.inner.file_id,
                        revisions = changes.len(),
                        "file loaded"
                    );
                    state.presence = Presence::Present;
                    state.changes = changes;
                }
            }
        }
        Ok(state)
    }

    /// Like [`lock_loaded`](Self::lock_loaded), but the file must exist.
    async fn lock_present(&self) -> Result<MutexGuard<'_, FileState>> {
        let state = self.lock_loaded().await?;
        if state.presence != Presence::Present {
            return Err(FileError::FileNotFound(self.inner.file_id.clone()));
        }
        Ok(state)
    }

    fn notify(&self) {
        self.inner.changed.send_modify(|version| *version += 1);
    }

    // -----------------------------------------------------------------------
    // Write-behind
    // -----------------------------------------------------------------------

    /// Queue a write-behind pass unless one is already waiting to start.
    ///
    /// After failed passes the delay doubles per failure, up to
    /// `2^MAX_BACKOFF_SHIFT` times the configured debounce.
    fn schedule_flush(&self, state: &mut FileState) {
        if state.flush_scheduled {
            return;
        }
        state.flush_scheduled = true;

        let mut delay = self.inner.config.flush_delay();
        if state.flush_failures > 0 {
            let shift = state.flush_failures.min(MAX_BACKOFF_SHIFT);
            delay = delay.max(RETRY_FLOOR).saturating_mul(1 << shift);
        }

        let file = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            file.inner.state.lock().await.flush_scheduled = false;
            if let Err(e) = file.flush_pending().await {
                error!(file_id = %file.inner.file_id, error = %e, "write-behind flush failed");
            }
        });
    }

    async fn flush_pending(&self) -> Result<()> {
        let _writer = self.inner.write_lock.lock().await;
        loop {
            let batch = {
                let mut state = self.inner.state.lock().await;
                if !state.is_dirty() {
                    state.flush_failures = 0;
                    return Ok(());
                }
                state.take_batch()
            };

            if let Err(e) = self.write_batch(&batch).await {
                let mut state = self.inner.state.lock().await;
                state.restore(batch);
                state.flush_failures = state.flush_failures.saturating_add(1);
                warn!(
                    file_id = %self.inner.file_id,
                    failures = state.flush_failures,
                    error = %e,
                    "flush failed; pending revisions kept for retry"
                );
                self.schedule_flush(&mut state);
                return Err(e);
            }
        }
    }

    async fn write_batch(&self, batch: &FlushBatch) -> Result<()> {
        let dir = &self.inner.dir;
        if batch.erase {
            match tokio::fs::remove_dir_all(dir).await {
                Ok(()) => info!(dir = %dir.display(), "storage directory erased"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        if batch.writes.is_empty() {
            return Ok(());
        }

        tokio::fs::create_dir_all(dir).await?;
        for (rev_num, bytes) in &batch.writes {
            let name = codec::revision_file_name(*rev_num);
            let tmp_path = dir.join(format!("{name}{}", codec::TEMP_SUFFIX));

            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(bytes).await?;
            file.flush().await?;
            if self.inner.config.sync_writes {
                file.sync_all().await?;
            }
            drop(file);
            tokio::fs::rename(&tmp_path, dir.join(&name)).await?;
        }
        debug!(
            file_id = %self.inner.file_id,
            revisions = batch.writes.len(),
            erased = batch.erase,
            "flushed"
        );
        Ok(())
    }
}

/// Read every revision file in `dir`.
///
/// Revisions must run gapless from 0 and each file's content must carry the
/// revision its name says; anything else is [`FileError::BadData`].
async fn scan_dir(dir: &Path) -> Result<Scan> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Scan::Missing),
        Err(e) => return Err(e.into()),
    };

    let mut found: BTreeMap<u64, (String, PathBuf)> = BTreeMap::new();
    while let Some(entry) = entries.next_entry().await? {
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            warn!(dir = %dir.display(), "ignoring file with non-UTF-8 name");
            continue;
        };
        if name.ends_with(codec::TEMP_SUFFIX) {
            warn!(dir = %dir.display(), file = name, "ignoring partially written revision");
            continue;
        }
        let Some(rev_num) = codec::parse_revision_file_name(name) else {
            warn!(dir = %dir.display(), file = name, "ignoring unrecognized file");
            continue;
        };
        if let Some((other, _)) = found.insert(rev_num, (name.to_owned(), entry.path())) {
            return Err(FileError::BadData(format!(
                "{other} and {name} both hold revision {rev_num}"
            )));
        }
    }

    if found.is_empty() {
        return Ok(Scan::Stale);
    }

    let mut changes = Vec::with_capacity(found.len());
    for (expected, (rev_num, (name, path))) in (0u64..).zip(found) {
        if rev_num != expected {
            return Err(FileError::BadData(format!(
                "{}: revision {expected} is missing",
                dir.display()
            )));
        }
        let bytes = tokio::fs::read(&path).await?;
        let change = codec::decode_change(&bytes, &name)?;
        if change.rev_num != rev_num {
            return Err(FileError::BadData(format!(
                "{name}: holds revision {} but is named for {rev_num}",
                change.rev_num
            )));
        }
        changes.push(change);
    }
    Ok(Scan::Present(changes))
}
