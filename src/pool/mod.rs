// ABOUTME: Pool module for keyed single-flight resource caching.
// ABOUTME: Deduplicates concurrent factory calls and caches their results.

mod resource_pool;

pub use resource_pool::ResourcePool;
