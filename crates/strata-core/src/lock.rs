//! Repository locking for the reference table.
//!
//! Uses advisory file locks (`flock(2)` on Unix) via the `fs2` crate.
//! The OS releases locks when a process dies, so no stale lock detection
//! is needed.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::time::{Duration, Instant};

use fs2::FileExt;
use tracing::debug;

use crate::error::{StrataError, StrataResult};

/// Lock file guarding read-modify-write of `refs.json`.
pub const REFS_LOCK: &str = "refs.lock";

/// An exclusive repository lock, released on drop.
pub struct RepoLock {
    _file: File,
}

impl RepoLock {
    /// Acquire the exclusive lock named `name` inside `dir`.
    ///
    /// Polls until the lock is acquired or `timeout` expires.
    pub fn acquire(dir: &Path, name: &str, timeout: Duration) -> StrataResult<Self> {
        let lock_path = dir.join(name);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)?;

        let start = Instant::now();
        let poll_interval = Duration::from_millis(10);

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!(lock = %lock_path.display(), "lock acquired");
                    return Ok(RepoLock { _file: file });
                }
                Err(_) if start.elapsed() >= timeout => {
                    return Err(StrataError::LockTimeout);
                }
                Err(_) => std::thread::sleep(poll_interval),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_acquire_release() {
        let dir = tempfile::tempdir().unwrap();
        {
            let _lock = RepoLock::acquire(dir.path(), REFS_LOCK, Duration::from_secs(1)).unwrap();
            assert!(dir.path().join(REFS_LOCK).exists());
        }
        let _again = RepoLock::acquire(dir.path(), REFS_LOCK, Duration::from_secs(1)).unwrap();
    }

    #[test]
    fn test_lock_blocks_second() {
        let dir = tempfile::tempdir().unwrap();
        let _lock = RepoLock::acquire(dir.path(), REFS_LOCK, Duration::from_secs(1)).unwrap();

        let start = Instant::now();
        let second = RepoLock::acquire(dir.path(), REFS_LOCK, Duration::from_millis(50));
        assert!(matches!(second, Err(StrataError::LockTimeout)));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
