// ABOUTME: Lock module for cross-process mutual exclusion via lock files.
// ABOUTME: Contains the file lock itself and the stale lock reaper.

mod file_lock;
mod reaper;

pub use file_lock::{LockGuard, LockOptions, acquire, default_lock_dir, with_file_lock};
pub use reaper::{SweepReport, cleanup_stale_locks};
