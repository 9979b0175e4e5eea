//! Named semaphore shared by every process running a pass.
//!
//! The semaphore is an exclusive advisory lock on `{dir}/{name}.sem`. It is
//! polled with short random sleeps until acquired or until the timeout
//! elapses. The returned guard releases the lock when dropped.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use fs2::FileExt;
use rand::RngExt;
use tracing::{debug, warn};

use crate::error::{Result, SyncError};

/// Default name of the semaphore guarding both passes.
pub const DEFAULT_LOCK_NAME: &str = "db_schema";

/// Default time to wait for the semaphore.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// A named file semaphore.
#[derive(Debug, Clone)]
pub struct Semaphore {
    name: String,
    path: PathBuf,
    timeout: Duration,
}

impl Semaphore {
    /// Creates a semaphore named `name` under `dir`.
    pub fn new(dir: impl AsRef<Path>, name: impl Into<String>) -> Self {
        let name = name.into();
        let path = dir.as_ref().join(format!("{name}.sem"));
        Self {
            name,
            path,
            timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Sets how long [`acquire`](Self::acquire) waits.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Semaphore name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_error(&self, source: std::io::Error) -> SyncError {
        SyncError::Lock {
            path: self.path.clone(),
            source,
        }
    }

    /// Waits for the semaphore.
    ///
    /// Returns [`SyncError::LockTimeout`] when another holder keeps it past
    /// the timeout.
    pub async fn acquire(&self) -> Result<SemaphoreGuard> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| self.lock_error(e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.lock_error(e))?;

        let contended = fs2::lock_contended_error().kind();
        let started = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => break,
                Err(e) if e.kind() == contended => {
                    if started.elapsed() >= self.timeout {
                        return Err(SyncError::LockTimeout {
                            name: self.name.clone(),
                            timeout: self.timeout,
                        });
                    }
                    let micros = rand::rng().random_range(0..1000);
                    tokio::time::sleep(Duration::from_micros(micros)).await;
                }
                Err(e) => return Err(self.lock_error(e)),
            }
        }

        debug!(semaphore = %self.name, path = %self.path.display(), "Semaphore acquired");
        file.set_len(0).map_err(|e| self.lock_error(e))?;
        writeln!(file, "pid {} at {}", std::process::id(), Utc::now().to_rfc3339())
            .map_err(|e| self.lock_error(e))?;

        Ok(SemaphoreGuard {
            name: self.name.clone(),
            file,
        })
    }
}

/// Holds a semaphore until dropped.
#[derive(Debug)]
pub struct SemaphoreGuard {
    name: String,
    file: File,
}

impl SemaphoreGuard {
    /// Name of the held semaphore.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for SemaphoreGuard {
    fn drop(&mut self) {
        match FileExt::unlock(&self.file) {
            Ok(()) => debug!(semaphore = %self.name, "Semaphore released"),
            Err(e) => warn!(semaphore = %self.name, error = %e, "Failed to release semaphore"),
        }
    }
}
