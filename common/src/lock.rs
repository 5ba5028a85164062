//! Lock file that keeps overlapping runs from racing on the seen-offer file.

use crate::error::LockError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LockInfo {
    pid: u32,
    acquired_at: DateTime<Utc>,
}

/// Exclusive, file-based lock for a single notifier run.
///
/// A lock older than `stale_after` whose owning process is gone is assumed
/// to belong to a run that crashed without cleaning up, and is taken over.
/// A lock whose owner is still running is never broken, however old.
#[derive(Debug, Clone)]
pub struct RunLock {
    path: PathBuf,
    stale_after: Duration,
}

impl RunLock {
    pub fn new(path: impl Into<PathBuf>, stale_after: Duration) -> Self {
        Self {
            path: path.into(),
            stale_after,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquires the lock, or fails with [`LockError::Held`] if a live run owns it.
    pub fn acquire(&self) -> Result<RunLockGuard, LockError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| self.io_err(source))?;
        }

        // Second attempt only happens after a stale lock was removed.
        for _ in 0..2 {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&self.path)
            {
                Ok(file) => {
                    let info = LockInfo {
                        pid: std::process::id(),
                        acquired_at: Utc::now(),
                    };
                    self.claim(file, &info)?;

                    debug!(path = %self.path.display(), pid = info.pid, "Run lock acquired");
                    return Ok(RunLockGuard {
                        path: self.path.clone(),
                        owner: info,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    let (pid, acquired_at) = self.current_holder()?;
                    let age = Utc::now().signed_duration_since(acquired_at);
                    let expired = chrono::Duration::from_std(self.stale_after)
                        .map(|limit| age > limit)
                        .unwrap_or(false);

                    if !expired || process_alive(pid) {
                        return Err(LockError::Held {
                            path: self.path.clone(),
                            pid,
                            acquired_at: acquired_at.to_rfc3339(),
                        });
                    }

                    warn!(
                        path = %self.path.display(),
                        pid = pid,
                        age_seconds = age.num_seconds(),
                        "Breaking stale run lock"
                    );
                    match fs::remove_file(&self.path) {
                        Ok(()) => {}
                        Err(e) if e.kind() == ErrorKind::NotFound => {}
                        Err(source) => return Err(self.io_err(source)),
                    }
                }
                Err(source) => return Err(self.io_err(source)),
            }
        }

        let (pid, acquired_at) = self.current_holder()?;
        Err(LockError::Held {
            path: self.path.clone(),
            pid,
            acquired_at: acquired_at.to_rfc3339(),
        })
    }

    /// Writes the owner record into a freshly created lock file. On failure
    /// the file is removed so it does not block later runs.
    fn claim(&self, mut file: impl Write, info: &LockInfo) -> Result<(), LockError> {
        let written = serde_json::to_vec(info)
            .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))
            .and_then(|body| file.write_all(&body).and_then(|()| file.flush()));

        if let Err(source) = written {
            if let Err(e) = fs::remove_file(&self.path) {
                warn!(path = %self.path.display(), error = %e, "Failed to remove half-written run lock");
            }
            return Err(self.io_err(source));
        }
        Ok(())
    }

    /// Reads who holds the lock. A file that cannot be parsed (for example
    /// one still being written) is dated by its modification time.
    fn current_holder(&self) -> Result<(u32, DateTime<Utc>), LockError> {
        let content = match fs::read(&self.path) {
            Ok(content) => content,
            // Released between our open and read: report it as just taken.
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok((0, Utc::now())),
            Err(source) => return Err(self.io_err(source)),
        };

        if let Ok(info) = serde_json::from_slice::<LockInfo>(&content) {
            return Ok((info.pid, info.acquired_at));
        }

        let modified = fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .map_err(|source| self.io_err(source))?;
        Ok((0, DateTime::<Utc>::from(modified)))
    }

    fn io_err(&self, source: std::io::Error) -> LockError {
        LockError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// Whether `pid` names a running process. Pid 0 stands for an unknown
/// owner and is never alive. Without `/proc` only the lock age counts.
fn process_alive(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }
    let proc_root = Path::new("/proc");
    proc_root.is_dir() && proc_root.join(pid.to_string()).exists()
}

/// Removes the lock file when dropped, unless another run has since
/// taken it over.
#[derive(Debug)]
pub struct RunLockGuard {
    path: PathBuf,
    owner: LockInfo,
}

impl RunLockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLockGuard {
    fn drop(&mut self) {
        let still_ours = fs::read(&self.path)
            .ok()
            .and_then(|content| serde_json::from_slice::<LockInfo>(&content).ok())
            .is_some_and(|info| info == self.owner);
        if !still_ours {
            warn!(path = %self.path.display(), "Run lock no longer ours, leaving it in place");
            return;
        }

        match fs::remove_file(&self.path) {
            Ok(()) => info!(path = %self.path.display(), "Run lock released"),
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to release run lock"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);
    /// Larger than any real pid limit.
    const DEAD_PID: u32 = u32::MAX;

    fn write_lock(path: &Path, pid: u32, age: chrono::Duration) {
        let info = LockInfo {
            pid,
            acquired_at: Utc::now() - age,
        };
        fs::write(path, serde_json::to_vec(&info).unwrap()).unwrap();
    }

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(ErrorKind::Other, "disk full"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_second_acquire_fails_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let lock = RunLock::new(dir.path().join("notifier.lock"), HOUR);

        let guard = lock.acquire().unwrap();
        assert!(guard.path().exists());

        let err = lock.acquire().unwrap_err();
        match err {
            LockError::Held { pid, .. } => assert_eq!(pid, std::process::id()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_drop_releases_lock() {
        let dir = tempfile::tempdir().unwrap();
        let lock = RunLock::new(dir.path().join("state").join("notifier.lock"), HOUR);

        let guard = lock.acquire().unwrap();
        drop(guard);
        assert!(!lock.path().exists());

        let _again = lock.acquire().unwrap();
    }

    #[test]
    fn test_stale_lock_is_broken() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notifier.lock");
        write_lock(&path, DEAD_PID, chrono::Duration::hours(2));

        let lock = RunLock::new(&path, HOUR);
        let _guard = lock.acquire().unwrap();

        let info: LockInfo = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(info.pid, std::process::id());
    }

    #[test]
    fn test_fresh_foreign_lock_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notifier.lock");
        write_lock(&path, DEAD_PID, chrono::Duration::zero());

        let err = RunLock::new(&path, HOUR).acquire().unwrap_err();
        assert!(matches!(err, LockError::Held { pid: DEAD_PID, .. }));
        assert!(path.exists());
    }

    #[test]
    fn test_old_lock_of_running_process_is_kept() {
        if !Path::new("/proc").is_dir() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notifier.lock");
        write_lock(&path, std::process::id(), chrono::Duration::hours(2));

        let err = RunLock::new(&path, HOUR).acquire().unwrap_err();
        assert!(matches!(err, LockError::Held { .. }));
    }

    #[test]
    fn test_long_run_keeps_lock_past_stale_window() {
        if !Path::new("/proc").is_dir() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let lock = RunLock::new(dir.path().join("notifier.lock"), Duration::from_millis(50));

        let _first = lock.acquire().unwrap();
        std::thread::sleep(Duration::from_millis(1100));
        assert!(matches!(lock.acquire(), Err(LockError::Held { .. })));
    }

    #[test]
    fn test_guard_leaves_lock_taken_over_by_another_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notifier.lock");
        let guard = RunLock::new(&path, HOUR).acquire().unwrap();

        write_lock(&path, DEAD_PID, chrono::Duration::zero());
        drop(guard);

        assert!(path.exists());
        let info: LockInfo = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(info.pid, DEAD_PID);
    }

    #[test]
    fn test_failed_claim_removes_lock_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notifier.lock");
        fs::write(&path, "").unwrap();
        let lock = RunLock::new(&path, HOUR);
        let info = LockInfo {
            pid: std::process::id(),
            acquired_at: Utc::now(),
        };

        let err = lock.claim(BrokenWriter, &info).unwrap_err();
        assert!(matches!(err, LockError::Io { .. }));
        assert!(!path.exists());
    }
}
