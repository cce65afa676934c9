use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::error::DeviceError;

/// A lock older than this is assumed to belong to a crashed run
const STALE_AFTER: Duration = Duration::from_secs(2 * 60 * 60);

/// Advisory lockfile keeping a download run and a transfer run from
/// interleaving. Existence plus modification time is the whole protocol;
/// it only works because every entry point checks it.
#[derive(Debug, Clone)]
pub struct Lockfile {
    path: PathBuf,
}

impl Lockfile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether another job currently holds the lock.
    ///
    /// A stale lock is removed on the spot and reported as not held.
    pub fn is_held(&self) -> bool {
        let Ok(metadata) = std::fs::metadata(&self.path) else {
            return false;
        };
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        if is_stale(modified, SystemTime::now()) {
            let _ = std::fs::remove_file(&self.path);
            return false;
        }
        true
    }

    /// Take the lock, failing if it is already held. The returned guard
    /// frees it on drop, whatever happens to the job in between.
    pub fn acquire(&self) -> Result<LockGuard, DeviceError> {
        if self.is_held() {
            return Err(DeviceError::LockHeld {
                path: self.path.clone(),
            });
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DeviceError::WriteFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        std::fs::write(&self.path, b"").map_err(|e| DeviceError::WriteFailed {
            path: self.path.clone(),
            source: e,
        })?;
        Ok(LockGuard {
            path: self.path.clone(),
        })
    }
}

fn is_stale(modified: SystemTime, now: SystemTime) -> bool {
    match now.duration_since(modified) {
        Ok(age) => age > STALE_AFTER,
        // Lock mtime in the future: the clock moved; treat as fresh
        Err(_) => false,
    }
}

/// Releases the lockfile when dropped
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn acquire_creates_the_lockfile() {
        let dir = tempdir().unwrap();
        let lock = Lockfile::new(dir.path().join("job.lock"));

        let guard = lock.acquire().unwrap();
        assert!(lock.path().exists());
        drop(guard);
    }

    #[test]
    fn guard_drop_releases_the_lock() {
        let dir = tempdir().unwrap();
        let lock = Lockfile::new(dir.path().join("job.lock"));

        let guard = lock.acquire().unwrap();
        drop(guard);

        assert!(!lock.path().exists());
        assert!(!lock.is_held());
    }

    #[test]
    fn acquire_fails_while_held() {
        let dir = tempdir().unwrap();
        let lock = Lockfile::new(dir.path().join("job.lock"));

        let _guard = lock.acquire().unwrap();
        assert!(lock.is_held());
        assert!(matches!(
            lock.acquire(),
            Err(DeviceError::LockHeld { .. })
        ));
    }

    #[test]
    fn missing_lockfile_is_not_held() {
        let dir = tempdir().unwrap();
        let lock = Lockfile::new(dir.path().join("job.lock"));
        assert!(!lock.is_held());
    }

    #[test]
    fn acquire_creates_missing_parent_directories() {
        let dir = tempdir().unwrap();
        let lock = Lockfile::new(dir.path().join("staging").join("job.lock"));

        let _guard = lock.acquire().unwrap();
        assert!(lock.path().exists());
    }

    #[test]
    fn staleness_threshold_is_two_hours() {
        let now = SystemTime::now();
        let fresh = now - Duration::from_secs(60 * 60);
        let expired = now - Duration::from_secs(2 * 60 * 60 + 1);

        assert!(!is_stale(fresh, now));
        assert!(is_stale(expired, now));
    }

    #[test]
    fn future_mtime_counts_as_fresh() {
        let now = SystemTime::now();
        let future = now + Duration::from_secs(600);
        assert!(!is_stale(future, now));
    }
}
