use crate::process::is_process_alive;
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

pub type LivenessProbe = fn(u32) -> bool;

const DEFAULT_SETTLE_WINDOW: Duration = Duration::from_millis(500);
const SETTLE_POLL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    Acquired,
    AlreadyRunning { pid: u32 },
    /// The lock file could not be written; startup continues without it.
    Degraded,
}

impl LockOutcome {
    pub fn is_acquired(self) -> bool {
        !matches!(self, Self::AlreadyRunning { .. })
    }
}

enum Existing {
    Live(u32),
    Stale,
}

#[derive(Debug, Clone)]
pub struct InstanceLock {
    path: PathBuf,
    pid: u32,
    probe: LivenessProbe,
    settle: Duration,
}

impl InstanceLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_probe(path, std::process::id(), is_process_alive)
    }

    pub fn with_probe(path: impl Into<PathBuf>, pid: u32, probe: LivenessProbe) -> Self {
        Self {
            path: path.into(),
            pid,
            probe,
            settle: DEFAULT_SETTLE_WINDOW,
        }
    }

    /// How long an empty lock file is given to receive its owner's PID.
    pub fn with_settle_window(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn acquire(&self) -> LockOutcome {
        match self.try_create() {
            Ok(()) => return self.acquired(),
            Err(error) if error.kind() == ErrorKind::AlreadyExists => {}
            Err(error) => return self.degraded(&error),
        }

        match self.inspect_existing() {
            Ok(Existing::Live(pid)) => {
                tracing::info!(pid, path = %self.path.display(), "instance lock held by running process");
                return LockOutcome::AlreadyRunning { pid };
            }
            Ok(Existing::Stale) => {}
            Err(error) => return self.degraded(&error),
        }

        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(error) if error.kind() == ErrorKind::NotFound => {}
            Err(error) => return self.degraded(&error),
        }
        tracing::warn!(path = %self.path.display(), "removed stale instance lock");

        match self.try_create() {
            Ok(()) => self.acquired(),
            Err(error) if error.kind() == ErrorKind::AlreadyExists => {
                // Lost the race against another starting process.
                match self.inspect_existing() {
                    Ok(Existing::Live(pid)) => LockOutcome::AlreadyRunning { pid },
                    Ok(Existing::Stale) => self.degraded(&error),
                    Err(error) => self.degraded(&error),
                }
            }
            Err(error) => self.degraded(&error),
        }
    }

    pub fn release(&self) {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                if parse_pid(&contents) != Some(self.pid) {
                    tracing::debug!(path = %self.path.display(), "instance lock owned elsewhere, leaving it");
                    return;
                }
            }
            Err(error) if error.kind() == ErrorKind::NotFound => return,
            Err(error) => {
                tracing::warn!(error = %error, path = %self.path.display(), "failed to read instance lock on release");
                return;
            }
        }

        match fs::remove_file(&self.path) {
            Ok(()) => tracing::info!(path = %self.path.display(), "released instance lock"),
            Err(error) if error.kind() == ErrorKind::NotFound => {}
            Err(error) => {
                tracing::warn!(error = %error, path = %self.path.display(), "failed to remove instance lock")
            }
        }
    }

    // The PID is written to a staging file first and then linked into
    // place, so the lock file never exists without its content.
    fn try_create(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let staging = self.staging_path();
        let result = write_pid(&staging, self.pid).and_then(|()| fs::hard_link(&staging, &self.path));
        if let Err(error) = fs::remove_file(&staging) {
            if error.kind() != ErrorKind::NotFound {
                tracing::debug!(error = %error, path = %staging.display(), "failed to remove lock staging file");
            }
        }
        result
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("instance"));
        name.push(format!(".{}.tmp", self.pid));
        self.path.with_file_name(name)
    }

    fn inspect_existing(&self) -> io::Result<Existing> {
        let deadline = Instant::now() + self.settle;
        let contents = loop {
            let contents = match fs::read_to_string(&self.path) {
                Ok(contents) => contents,
                // Vanished between the create attempt and the read.
                Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Existing::Stale),
                // Garbage bytes count as unparsable content.
                Err(error) if error.kind() == ErrorKind::InvalidData => return Ok(Existing::Stale),
                Err(error) => return Err(error),
            };
            if !contents.trim().is_empty() || Instant::now() >= deadline {
                break contents;
            }
            // Another process created the file and has not written its PID yet.
            thread::sleep(SETTLE_POLL);
        };

        match parse_pid(&contents) {
            Some(pid) if (self.probe)(pid) => Ok(Existing::Live(pid)),
            Some(pid) => {
                tracing::debug!(pid, "instance lock owner is gone");
                Ok(Existing::Stale)
            }
            None => {
                tracing::debug!("instance lock content is unparsable");
                Ok(Existing::Stale)
            }
        }
    }

    fn acquired(&self) -> LockOutcome {
        tracing::info!(pid = self.pid, path = %self.path.display(), "acquired instance lock");
        LockOutcome::Acquired
    }

    fn degraded(&self, error: &io::Error) -> LockOutcome {
        tracing::warn!(
            error = %error,
            path = %self.path.display(),
            "instance lock unavailable, continuing without single-instance protection"
        );
        LockOutcome::Degraded
    }
}

#[derive(Debug)]
pub struct LockGuard {
    lock: InstanceLock,
}

impl LockGuard {
    pub fn new(lock: InstanceLock) -> Self {
        Self { lock }
    }

    pub fn lock(&self) -> &InstanceLock {
        &self.lock
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.lock.release();
    }
}

fn write_pid(path: &Path, pid: u32) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.write_all(format!("{}\n", pid).as_bytes())?;
    file.sync_all()
}

fn parse_pid(contents: &str) -> Option<u32> {
    contents.trim().parse::<u32>().ok().filter(|pid| *pid != 0)
}

#[cfg(test)]
mod tests {
    use super::{InstanceLock, LockGuard, LockOutcome};
    use std::fs;
    use std::thread;
    use std::time::Duration;

    fn always_alive(_pid: u32) -> bool {
        true
    }

    fn never_alive(_pid: u32) -> bool {
        false
    }

    #[test]
    fn first_acquire_writes_own_pid() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("app.lock");
        let lock = InstanceLock::with_probe(&path, 4242, always_alive);

        assert_eq!(lock.acquire(), LockOutcome::Acquired);
        assert_eq!(fs::read_to_string(&path).expect("read").trim(), "4242");
    }

    #[test]
    fn second_acquire_in_live_process_reports_already_running() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("app.lock");
        let lock = InstanceLock::new(&path);

        assert_eq!(lock.acquire(), LockOutcome::Acquired);
        let second = InstanceLock::new(&path).acquire();
        assert_eq!(
            second,
            LockOutcome::AlreadyRunning {
                pid: std::process::id()
            }
        );
        assert!(!second.is_acquired());
    }

    #[test]
    fn stale_owner_is_removed_and_lock_taken_over() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("app.lock");
        fs::write(&path, "999999\n").expect("seed stale lock");

        let lock = InstanceLock::with_probe(&path, 77, never_alive);
        assert_eq!(lock.acquire(), LockOutcome::Acquired);
        assert_eq!(fs::read_to_string(&path).expect("read").trim(), "77");
    }

    #[test]
    fn unparsable_lock_content_is_treated_as_stale() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("app.lock");
        fs::write(&path, "not a pid").expect("seed corrupt lock");

        let lock = InstanceLock::with_probe(&path, 77, always_alive);
        assert_eq!(lock.acquire(), LockOutcome::Acquired);
        assert_eq!(fs::read_to_string(&path).expect("read").trim(), "77");
    }

    #[test]
    fn acquire_leaves_no_staging_file_behind() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("app.lock");
        let lock = InstanceLock::with_probe(&path, 4242, always_alive);

        assert_eq!(lock.acquire(), LockOutcome::Acquired);
        let names: Vec<_> = fs::read_dir(dir.path())
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("app.lock")]);
    }

    #[test]
    fn empty_lock_being_written_is_not_taken_over() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("app.lock");
        // Another process has created the file but not yet written its PID.
        fs::write(&path, "").expect("seed empty lock");
        let writer_path = path.clone();
        let writer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            fs::write(&writer_path, "1234\n").expect("owner writes pid");
        });

        let outcome = InstanceLock::with_probe(&path, 222, always_alive)
            .with_settle_window(Duration::from_secs(5))
            .acquire();
        writer.join().expect("writer thread");

        assert_eq!(outcome, LockOutcome::AlreadyRunning { pid: 1234 });
        assert_eq!(fs::read_to_string(&path).expect("read").trim(), "1234");
    }

    #[test]
    fn empty_lock_left_behind_is_stale_after_settle_window() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("app.lock");
        fs::write(&path, "").expect("seed empty lock");

        let lock = InstanceLock::with_probe(&path, 222, always_alive)
            .with_settle_window(Duration::from_millis(50));
        assert_eq!(lock.acquire(), LockOutcome::Acquired);
        assert_eq!(fs::read_to_string(&path).expect("read").trim(), "222");
    }

    #[test]
    fn zero_pid_is_treated_as_stale() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("app.lock");
        fs::write(&path, "0").expect("seed zero lock");

        let lock = InstanceLock::with_probe(&path, 77, always_alive);
        assert_eq!(lock.acquire(), LockOutcome::Acquired);
    }

    #[test]
    fn io_failure_degrades_to_acquired_anyway() {
        let dir = tempfile::tempdir().expect("tempdir");
        // The lock path is a directory: it can be neither created nor read.
        let path = dir.path().join("occupied");
        fs::create_dir(&path).expect("mkdir");

        let outcome = InstanceLock::with_probe(&path, 77, always_alive).acquire();
        assert_eq!(outcome, LockOutcome::Degraded);
        assert!(outcome.is_acquired());
    }

    #[test]
    fn release_is_idempotent_and_only_removes_own_lock() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("app.lock");

        let ours = InstanceLock::with_probe(&path, 10, always_alive);
        assert_eq!(ours.acquire(), LockOutcome::Acquired);
        ours.release();
        assert!(!path.exists());
        ours.release();

        fs::write(&path, "11\n").expect("foreign lock");
        ours.release();
        assert!(path.exists());
    }

    #[test]
    fn guard_releases_on_drop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("app.lock");
        let lock = InstanceLock::with_probe(&path, 12, always_alive);
        assert_eq!(lock.acquire(), LockOutcome::Acquired);

        {
            let guard = LockGuard::new(lock);
            assert_eq!(guard.lock().pid(), 12);
            assert!(path.exists());
        }
        assert!(!path.exists());
    }
}
