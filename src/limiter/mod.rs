// ABOUTME: Limiter module for fixed-rate pacing of repeated operations.
// ABOUTME: Contains the minimum-delay rate limiter.

mod rate_limiter;

pub use rate_limiter::RateLimiter;
