// ABOUTME: Sweeps a lock directory and removes locks owned by dead processes.
// ABOUTME: Shares the on-disk lock file format with the file lock.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use super::file_lock::{process_alive, read_owner_pid};
use crate::error::LockError;

/// Result of a stale lock sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepReport {
    /// Lock files removed because their owner was dead.
    pub cleaned: usize,
    /// Lock files examined.
    pub total: usize,
}

/// Remove lock files in `lock_dir` whose owning process no longer exists.
///
/// Only `*.lock` files are considered. Locks owned by live processes are
/// left untouched, which makes the sweep safe to run concurrently with
/// active [`with_file_lock`](super::with_file_lock) calls. A missing
/// directory is not an error and reports zero files.
pub fn cleanup_stale_locks(lock_dir: &Path) -> Result<SweepReport, LockError> {
    if !lock_dir.exists() {
        return Ok(SweepReport::default());
    }

    let mut report = SweepReport::default();

    for entry in fs::read_dir(lock_dir)? {
        let path = entry?.path();

        if path.extension().and_then(|e| e.to_str()) != Some("lock") {
            continue;
        }
        report.total += 1;

        let alive = match read_owner_pid(&path) {
            Ok(Some(pid)) => process_alive(pid),
            // Unparsable content cannot be probed; treat as dead.
            Ok(None) => false,
            // Released between listing and read.
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };

        if alive {
            continue;
        }

        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "removed stale lock");
                report.cleaned += 1;
            }
            // Someone else cleaned it first.
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }

    tracing::debug!(
        cleaned = report.cleaned,
        total = report.total,
        dir = %lock_dir.display(),
        "stale lock sweep complete"
    );

    Ok(report)
}
