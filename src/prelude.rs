// ABOUTME: Prelude module - convenient imports for common use cases.
// ABOUTME: Use `use coord::prelude::*;` to get started quickly.

pub use crate::error::{CoordError, LockError, PoolError, TimeoutError};
pub use crate::limiter::RateLimiter;
pub use crate::lock::{
    LockGuard, LockOptions, SweepReport, acquire, cleanup_stale_locks, default_lock_dir,
    with_file_lock,
};
pub use crate::parallel::{ChunkRunner, ItemOutput, process_in_chunks};
pub use crate::pool::ResourcePool;
pub use crate::timeout::{timeout_after, with_timeout};
pub use crate::transaction::{Step, Transaction, TransactionOutcome, execute_transaction};
