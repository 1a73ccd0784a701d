// ABOUTME: Cross-process advisory locking via exclusive-create lock files.
// ABOUTME: Detects and removes locks abandoned by processes that have died.

use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::LockError;

/// Subdirectory of the OS temp directory used when no lock dir is configured.
const LOCK_DIR_NAME: &str = "coord-locks";

/// Default delay between acquisition attempts while another process holds the lock.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// The shared lock directory used by default.
///
/// Deterministic across processes so independent callers coordinate through
/// the same set of lock files.
pub fn default_lock_dir() -> PathBuf {
    std::env::temp_dir().join(LOCK_DIR_NAME)
}

/// Options controlling lock acquisition.
///
/// The lock directory is explicit configuration rather than hidden global
/// state so tests and multi-tenant callers can isolate their locks.
#[derive(Debug, Clone)]
pub struct LockOptions {
    /// Directory holding the lock files. Created on demand.
    pub lock_dir: PathBuf,
    /// Delay between acquisition attempts while the lock is held elsewhere.
    pub poll_interval: Duration,
    /// Give up after this long. `None` retries indefinitely.
    pub acquire_timeout: Option<Duration>,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            lock_dir: default_lock_dir(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            acquire_timeout: None,
        }
    }
}

impl LockOptions {
    /// Options using the given lock directory and default timing.
    pub fn in_dir(lock_dir: impl Into<PathBuf>) -> Self {
        Self {
            lock_dir: lock_dir.into(),
            ..Self::default()
        }
    }
}

/// RAII handle for an acquired lock.
///
/// Exactly one guard exists per resource id at a time. Dropping the guard
/// removes the lock file, so release happens on every exit path - success,
/// error return, or panic unwind. If removal fails a warning is logged but
/// no panic occurs.
#[derive(Debug)]
pub struct LockGuard {
    resource_id: String,
    lock_path: PathBuf,
    owner_pid: u32,
}

impl LockGuard {
    /// The resource this guard protects.
    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    /// Path to the lock file on disk.
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Pid recorded in the lock file (this process).
    pub fn owner_pid(&self) -> u32 {
        self.owner_pid
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        match fs::remove_file(&self.lock_path) {
            Ok(()) => {
                tracing::debug!(resource_id = %self.resource_id, "lock released");
            }
            // Already gone: a sweep may have raced us after our process was
            // (wrongly) probed, or the file was cleared manually.
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    resource_id = %self.resource_id,
                    path = %self.lock_path.display(),
                    error = %e,
                    "failed to remove lock file on release"
                );
            }
        }
    }
}

/// Acquire exclusive ownership of `resource_id`.
///
/// The lock file `<lock_dir>/<resource_id>.lock` is created with
/// exclusive-create semantics and holds this process's pid. If another
/// process owns the file, its pid is probed: a dead owner's file is removed
/// and creation retried immediately; a live owner causes a `poll_interval`
/// wait before the next attempt. Waiters are not queued - whichever caller
/// wins the next exclusive create proceeds.
///
/// Returns `LockError::AcquireTimeout` once `options.acquire_timeout`
/// elapses, if one is configured.
pub async fn acquire(resource_id: &str, options: &LockOptions) -> Result<LockGuard, LockError> {
    fs::create_dir_all(&options.lock_dir)?;

    let lock_path = options.lock_dir.join(format!("{resource_id}.lock"));
    let pid = std::process::id();
    let started = Instant::now();

    loop {
        match try_create(&lock_path, pid) {
            Ok(()) => {
                tracing::debug!(resource_id, pid, "lock acquired");
                return Ok(LockGuard {
                    resource_id: resource_id.to_string(),
                    lock_path,
                    owner_pid: pid,
                });
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                match read_owner_pid(&lock_path) {
                    Ok(Some(owner)) if process_alive(owner) => {
                        // Held by a live process; wait below.
                    }
                    Ok(Some(owner)) => {
                        tracing::warn!(resource_id, owner, "removing stale lock (owner is dead)");
                        remove_lock_file(&lock_path)?;
                        continue;
                    }
                    Ok(None) => {
                        // Unparsable content: the owner cannot be probed,
                        // treat the file as stale.
                        tracing::warn!(resource_id, "removing stale lock (unreadable owner pid)");
                        remove_lock_file(&lock_path)?;
                        continue;
                    }
                    // Released between our create attempt and the read.
                    Err(e) if e.kind() == ErrorKind::NotFound => continue,
                    Err(e) => return Err(e.into()),
                }

                if let Some(limit) = options.acquire_timeout {
                    let waited = started.elapsed();
                    if waited >= limit {
                        return Err(LockError::AcquireTimeout {
                            resource_id: resource_id.to_string(),
                            waited_ms: waited.as_millis() as u64,
                        });
                    }
                }

                tokio::time::sleep(options.poll_interval).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Run `operation` while holding the lock for `resource_id`.
///
/// The lock is acquired before the operation starts and released when it
/// finishes, whatever its outcome. Different resource ids never block each
/// other; calls for the same id are mutually exclusive across processes.
pub async fn with_file_lock<F, Fut, T>(
    resource_id: &str,
    options: &LockOptions,
    operation: F,
) -> Result<T, LockError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let guard = acquire(resource_id, options).await?;
    let value = operation().await;
    drop(guard);
    Ok(value)
}

/// Create the lock file exclusively and persist our pid into it.
fn try_create(lock_path: &Path, pid: u32) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(lock_path)?;

    // Write and sync immediately: other processes classify a pid-less lock
    // file as stale, so the window between create and write must stay tiny.
    if let Err(e) = file
        .write_all(pid.to_string().as_bytes())
        .and_then(|()| file.sync_all())
    {
        let _ = fs::remove_file(lock_path);
        return Err(e);
    }

    Ok(())
}

/// Read the owner pid stored in a lock file.
///
/// `Ok(None)` means the file exists but its content is not a pid.
pub(super) fn read_owner_pid(lock_path: &Path) -> io::Result<Option<u32>> {
    let content = fs::read_to_string(lock_path)?;
    Ok(content.trim().parse::<u32>().ok())
}

/// Remove a lock file, tolerating a concurrent removal.
fn remove_lock_file(lock_path: &Path) -> io::Result<()> {
    match fs::remove_file(lock_path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Whether a process with the given pid is currently alive.
///
/// Signal 0 performs error checking only; nothing is delivered to the
/// target. `EPERM` means the process exists but belongs to another user.
#[cfg(unix)]
pub(super) fn process_alive(pid: u32) -> bool {
    let rc = unsafe { libc::kill(pid as libc::pid_t, 0) };
    if rc == 0 {
        return true;
    }
    io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

/// Liveness cannot be probed on this platform; assume alive so locks are
/// never reaped from a running owner.
#[cfg(not(unix))]
pub(super) fn process_alive(_pid: u32) -> bool {
    true
}
