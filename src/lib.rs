// ABOUTME: Root module for coord - concurrency safety primitives.
// ABOUTME: Re-exports all public types from submodules.

pub mod error;
pub mod limiter;
pub mod lock;
pub mod parallel;
pub mod pool;
pub mod prelude;
pub mod timeout;
pub mod transaction;

pub use error::CoordError;
