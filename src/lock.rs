//! Cross-process run lock
//!
//! Overlapping scheduled invocations against the same state directory are
//! serialized with an advisory lock on a dedicated lock file. Acquisition is
//! non-blocking and polled until `lock_timeout` elapses.
//!
//! Uses `fs2` for the OS-level lock (flock on unix, LockFileEx on Windows).

use crate::error::{CheckError, CheckResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Delay between two acquisition attempts
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Held run lock. Dropping it removes the lock file and releases the OS lock.
#[derive(Debug)]
pub struct RunLock {
    file: Option<File>,
    lock_path: PathBuf,
}

impl RunLock {
    /// Acquire the lock, polling until `timeout` has elapsed
    pub fn acquire(lock_path: &Path, timeout: Duration) -> CheckResult<Self> {
        let started = Instant::now();
        let mut contended = false;

        loop {
            if let Some(file) = try_acquire_exclusive(lock_path)? {
                debug!(
                    "Acquired run lock {} after {:?}",
                    lock_path.display(),
                    started.elapsed()
                );
                return Ok(Self {
                    file: Some(file),
                    lock_path: lock_path.to_path_buf(),
                });
            }

            if !contended {
                debug!("Run lock {} is held, waiting", lock_path.display());
                contended = true;
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                warn!(
                    "Gave up on run lock {} after {:?}",
                    lock_path.display(),
                    elapsed
                );
                return Err(CheckError::LockTimeout);
            }
            thread::sleep(POLL_INTERVAL.min(timeout - elapsed));
        }
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Remove the lock file and release the OS lock
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        let Some(file) = self.file.take() else {
            return;
        };
        // Remove while still locked so a waiter cannot lock a file we then delete
        if let Err(e) = fs::remove_file(&self.lock_path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Failed to remove lock file {}: {}", self.lock_path.display(), e);
            }
        }
        if let Err(e) = FileExt::unlock(&file) {
            debug!("Failed to unlock {}: {}", self.lock_path.display(), e);
        }
        debug!("Released run lock {}", self.lock_path.display());
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        self.release_inner();
    }
}

/// One non-blocking attempt. `Ok(None)` means another process holds the lock.
fn try_acquire_exclusive(lock_path: &Path) -> CheckResult<Option<File>> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path)
        .map_err(|e| CheckError::state_dir(lock_path, e))?;

    match FileExt::try_lock_exclusive(&file) {
        Ok(()) => {}
        Err(e) if is_contended(&e) => return Ok(None),
        Err(e) => return Err(CheckError::state_dir(lock_path, e)),
    }

    // The previous holder may have unlinked the file we opened
    if !is_same_file(&file, lock_path) {
        let _ = FileExt::unlock(&file);
        return Ok(None);
    }
    Ok(Some(file))
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

#[cfg(unix)]
fn is_same_file(file: &File, lock_path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (file.metadata(), fs::metadata(lock_path)) {
        (Ok(held), Ok(on_disk)) => held.dev() == on_disk.dev() && held.ino() == on_disk.ino(),
        _ => false,
    }
}

// Windows refuses to delete an open file, so the path cannot be swapped underneath us
#[cfg(not(unix))]
fn is_same_file(_file: &File, lock_path: &Path) -> bool {
    lock_path.exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_and_release_removes_lock_file() {
        let temp_dir = TempDir::new().unwrap();
        let lock_path = temp_dir.path().join(".logsentry.lock");

        let lock = RunLock::acquire(&lock_path, Duration::from_secs(1)).unwrap();
        assert!(lock_path.exists());
        lock.release();
        assert!(!lock_path.exists());
    }

    #[test]
    fn test_drop_releases() {
        let temp_dir = TempDir::new().unwrap();
        let lock_path = temp_dir.path().join(".logsentry.lock");
        {
            let _lock = RunLock::acquire(&lock_path, Duration::from_secs(1)).unwrap();
        }
        assert!(!lock_path.exists());
        let again = RunLock::acquire(&lock_path, Duration::ZERO).unwrap();
        again.release();
    }

    #[test]
    fn test_stale_unlocked_file_is_acquired() {
        let temp_dir = TempDir::new().unwrap();
        let lock_path = temp_dir.path().join(".logsentry.lock");
        fs::write(&lock_path, "").unwrap();

        let lock = RunLock::acquire(&lock_path, Duration::ZERO).unwrap();
        lock.release();
        assert!(!lock_path.exists());
    }

    #[test]
    fn test_timeout_when_held() {
        let temp_dir = TempDir::new().unwrap();
        let lock_path = temp_dir.path().join(".logsentry.lock");
        let held = RunLock::acquire(&lock_path, Duration::from_secs(1)).unwrap();

        let started = Instant::now();
        let result = RunLock::acquire(&lock_path, Duration::from_millis(300));
        assert!(matches!(result, Err(CheckError::LockTimeout)));
        assert!(started.elapsed() >= Duration::from_millis(300));

        // The failed waiter must not disturb the holder
        assert!(lock_path.exists());
        held.release();
    }

    #[test]
    fn test_waiter_succeeds_once_holder_releases() {
        let temp_dir = TempDir::new().unwrap();
        let lock_path = temp_dir.path().join(".logsentry.lock");
        let held = RunLock::acquire(&lock_path, Duration::from_secs(1)).unwrap();

        let (tx, rx) = mpsc::channel();
        let waiter_path = lock_path.clone();
        let waiter = thread::spawn(move || {
            tx.send(()).unwrap();
            RunLock::acquire(&waiter_path, Duration::from_secs(5))
        });

        rx.recv().unwrap();
        thread::sleep(Duration::from_millis(300));
        held.release();

        let lock = waiter.join().unwrap().unwrap();
        assert!(lock_path.exists());
        lock.release();
        assert!(!lock_path.exists());
    }

    #[test]
    fn test_unwritable_location_is_state_error() {
        let temp_dir = TempDir::new().unwrap();
        let lock_path = temp_dir.path().join("missing").join(".logsentry.lock");
        assert!(matches!(
            RunLock::acquire(&lock_path, Duration::ZERO),
            Err(CheckError::StateDir { .. })
        ));
    }
}
