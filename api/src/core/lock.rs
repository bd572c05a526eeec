//! Compute lock: one request at a time on the shared inference device.
//!
//! Two disciplines behind [`ComputeLock`], chosen once at startup:
//! - [`ExclusiveLock`]: the cross-process file lock is taken when the server
//!   starts and held until it exits; requests queue on an in-process mutex.
//! - [`PerRequestLock`]: every request takes the in-process mutex and then the
//!   cross-process file lock, and releases both when its guard drops.
//!
//! Acquisition waits indefinitely. There is no timeout and a request that
//! holds the lock cannot be cancelled, so a stuck inference call blocks every
//! request behind it.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("lock task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Held for the duration of a locked section; dropping it releases the lock.
pub struct LockGuard {
    _local: OwnedMutexGuard<()>,
    // Closing the file releases the cross-process lock.
    _file: Option<File>,
}

pub trait ComputeLock: Send + Sync {
    /// Waits until this request owns the device.
    fn acquire(&self) -> BoxFuture<'_, Result<LockGuard, LockError>>;

    /// True for the hold-for-lifetime discipline.
    fn exclusive_mode(&self) -> bool;
}

/* ---------------------------------------------------------------------- */
/* Exclusive                                                              */
/* ---------------------------------------------------------------------- */

pub struct ExclusiveLock {
    local: Arc<Mutex<()>>,
    path: PathBuf,
    _file: File,
}

impl ExclusiveLock {
    /// Blocks until the file lock at `path` is ours, then keeps it.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, LockError> {
        let path = path.as_ref().to_path_buf();
        let file = lock_file(path.clone()).await?;
        info!(path = %path.display(), "compute lock held for the process lifetime");
        Ok(Self {
            local: Arc::new(Mutex::new(())),
            path,
            _file: file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ComputeLock for ExclusiveLock {
    fn acquire(&self) -> BoxFuture<'_, Result<LockGuard, LockError>> {
        Box::pin(async move {
            let local = self.local.clone().lock_owned().await;
            Ok(LockGuard {
                _local: local,
                _file: None,
            })
        })
    }

    fn exclusive_mode(&self) -> bool {
        true
    }
}

/* ---------------------------------------------------------------------- */
/* Per request                                                            */
/* ---------------------------------------------------------------------- */

pub struct PerRequestLock {
    local: Arc<Mutex<()>>,
    path: PathBuf,
}

impl PerRequestLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            local: Arc::new(Mutex::new(())),
            path: path.into(),
        }
    }
}

impl ComputeLock for PerRequestLock {
    fn acquire(&self) -> BoxFuture<'_, Result<LockGuard, LockError>> {
        Box::pin(async move {
            let local = self.local.clone().lock_owned().await;
            let file = lock_file(self.path.clone()).await?;
            debug!(path = %self.path.display(), "compute lock acquired");
            Ok(LockGuard {
                _local: local,
                _file: Some(file),
            })
        })
    }

    fn exclusive_mode(&self) -> bool {
        false
    }
}

/// Opens (creating if needed) and exclusively locks `path` on a blocking thread.
async fn lock_file(path: PathBuf) -> Result<File, LockError> {
    let file = tokio::task::spawn_blocking(move || -> std::io::Result<File> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;
        file.lock()?;
        Ok(file)
    })
    .await??;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    async fn second_request_waits(lock: Arc<dyn ComputeLock>) {
        let held = Duration::from_millis(150);
        let first = lock.acquire().await.unwrap();
        let releaser = tokio::spawn(async move {
            tokio::time::sleep(held).await;
            drop(first);
        });

        let start = Instant::now();
        let _second = lock.acquire().await.unwrap();
        let waited = start.elapsed();
        releaser.await.unwrap();
        assert!(waited >= Duration::from_millis(120), "waited only {waited:?}");
    }

    #[tokio::test]
    async fn exclusive_mode_serializes_requests() {
        let dir = tempfile::tempdir().unwrap();
        let lock = ExclusiveLock::open(dir.path().join("gpu.lock")).await.unwrap();
        assert!(lock.exclusive_mode());
        second_request_waits(Arc::new(lock)).await;
    }

    #[tokio::test]
    async fn per_request_mode_serializes_requests() {
        let dir = tempfile::tempdir().unwrap();
        let lock = PerRequestLock::new(dir.path().join("locks").join("gpu.lock"));
        assert!(!lock.exclusive_mode());
        second_request_waits(Arc::new(lock)).await;
    }

    #[tokio::test]
    async fn per_request_lock_is_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let lock = PerRequestLock::new(dir.path().join("gpu.lock"));
        drop(lock.acquire().await.unwrap());
        let again = tokio::time::timeout(Duration::from_secs(2), lock.acquire()).await;
        assert!(again.is_ok());
    }
}
