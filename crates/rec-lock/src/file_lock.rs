//! Advisory `flock`-style locks on `<root>/<classifier>/model_<user>.lock`.
//!
//! The lock belongs to the open file handle, so it is dropped by the OS when the holding process
//! exits for any reason. Lock files are never deleted: removing a path another process has open
//! would let a third process lock a fresh inode while the first still holds the old one.

use fs2::FileExt;
use rec_types::ModelKey;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

const LOCK_EXTENSION: &str = "lock";
const POLL_INTERVAL: Duration = Duration::from_millis(50);

type HeldKeys = Arc<Mutex<HashSet<ModelKey>>>;

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("lock backend failure on {path}: {source}")]
    Backend {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of a lock attempt.
#[derive(Debug)]
pub enum Acquire {
    Held(LockGuard),
    Busy,
}

impl Acquire {
    pub fn is_busy(&self) -> bool {
        matches!(self, Acquire::Busy)
    }
}

/// Ownership of one key's training slot. Released exactly once, when dropped.
#[derive(Debug)]
pub struct LockGuard {
    file: File,
    key: ModelKey,
    path: PathBuf,
    held: HeldKeys,
}

impl LockGuard {
    pub fn key(&self) -> &ModelKey {
        &self.key
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // Closing the handle releases the lock anyway; unlocking first keeps release prompt.
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(
                classifier = %self.key.classifier(),
                user_id = %self.key.user_id(),
                error = %e,
                "unlocking training lock failed, lock is released on close"
            );
        } else {
            tracing::debug!(
                classifier = %self.key.classifier(),
                user_id = %self.key.user_id(),
                "training lock released"
            );
        }
        held_keys(&self.held).remove(&self.key);
    }
}

pub struct FileLockManager {
    root: PathBuf,
    held: HeldKeys,
}

impl FileLockManager {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            held: HeldKeys::default(),
        }
    }

    pub fn lock_path(&self, key: &ModelKey) -> PathBuf {
        self.root
            .join(key.classifier())
            .join(format!("{}.{}", key.file_stem(), LOCK_EXTENSION))
    }

    /// Non-blocking: `Busy` immediately if any handle on the host holds the key.
    ///
    /// Directory creation, open and `flock` run on the blocking pool.
    pub async fn try_acquire(&self, key: &ModelKey) -> Result<Acquire, LockError> {
        let path = self.lock_path(key);
        let attempt = {
            let path = path.clone();
            tokio::task::spawn_blocking(move || lock_file(&path)).await
        };
        let file = match attempt {
            Ok(Ok(Some(file))) => file,
            Ok(Ok(None)) => return Ok(Acquire::Busy),
            Ok(Err(e)) => return Err(e),
            Err(join) => {
                return Err(backend(
                    &path,
                    std::io::Error::new(std::io::ErrorKind::Other, join),
                ))
            }
        };
        held_keys(&self.held).insert(key.clone());
        tracing::debug!(path = %path.display(), "training lock acquired");
        Ok(Acquire::Held(LockGuard {
            file,
            key: key.clone(),
            path,
            held: Arc::clone(&self.held),
        }))
    }

    /// Retry `try_acquire` until it succeeds or `timeout` elapses; a timeout is reported as `Busy`.
    pub async fn acquire_wait(
        &self,
        key: &ModelKey,
        timeout: Duration,
    ) -> Result<Acquire, LockError> {
        let started = Instant::now();
        loop {
            let attempt = self.try_acquire(key).await?;
            if !attempt.is_busy() {
                return Ok(attempt);
            }
            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Ok(Acquire::Busy);
            }
            tokio::time::sleep(POLL_INTERVAL.min(timeout - elapsed)).await;
        }
    }

    /// Whether a `LockGuard` from this manager is alive for `key`. Never touches the lock file,
    /// so it cannot make a concurrent `try_acquire` fail. Holders in other processes are not seen.
    pub fn is_held(&self, key: &ModelKey) -> bool {
        held_keys(&self.held).contains(key)
    }
}

/// `Ok(None)` when another handle holds the lock.
fn lock_file(path: &Path) -> Result<Option<File>, LockError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| backend(parent, e))?;
    }
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| backend(path, e))?;
    match FileExt::try_lock_exclusive(&file) {
        Ok(()) => Ok(Some(file)),
        Err(e) if is_contended(&e) => Ok(None),
        Err(e) => Err(backend(path, e)),
    }
}

// A panic while the set is locked cannot leave it half-updated, so poisoning is ignored.
fn held_keys(held: &Mutex<HashSet<ModelKey>>) -> MutexGuard<'_, HashSet<ModelKey>> {
    held.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn is_contended(e: &std::io::Error) -> bool {
    e.kind() == std::io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

fn backend(path: &Path, source: std::io::Error) -> LockError {
    LockError::Backend {
        path: path.display().to_string(),
        source,
    }
}
