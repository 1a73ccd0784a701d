// ABOUTME: Keyed single-flight cache for expensive resource construction.
// ABOUTME: At most one factory call is ever in flight per key.

use std::collections::HashMap;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::sync::Mutex;

use crate::error::PoolError;

type PendingFuture<V> = Shared<BoxFuture<'static, Result<V, Arc<anyhow::Error>>>>;

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Inner state: a cache of built values and the factory calls in flight.
struct PoolInner<K, V> {
    cache: HashMap<K, V>,
    pending: HashMap<K, PendingFuture<V>>,
}

/// A thread-safe, keyed single-flight cache.
///
/// `get_or_create` guarantees at most one factory invocation per key no
/// matter how many callers race for it; all of them resolve to the same
/// value. Entries live until explicitly deleted or cleared - there is no
/// eviction or TTL, so long-lived pools grow until the caller intervenes.
pub struct ResourcePool<K, V> {
    inner: Mutex<PoolInner<K, V>>,
}

impl<K, V> Default for ResourcePool<K, V> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(PoolInner {
                cache: HashMap::new(),
                pending: HashMap::new(),
            }),
        }
    }
}

impl<K, V> ResourcePool<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a new empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the cached value for `key`, building it with `factory` if needed.
    ///
    /// - Cached: returns the value immediately.
    /// - A factory call for `key` already in flight: awaits that same call;
    ///   `factory` is not invoked again.
    /// - Otherwise: runs `factory(key)`, caches the result on success, and
    ///   clears the in-flight slot whatever the outcome so a failed factory
    ///   can be retried by a later call.
    ///
    /// A panicking factory counts as a failure: the panic is caught and
    /// surfaced as the pool error to every waiter, and the key stays
    /// retryable rather than wedging with a poisoned in-flight slot.
    pub async fn get_or_create<F, Fut>(&self, key: K, factory: F) -> Result<V, PoolError>
    where
        F: FnOnce(K) -> Fut,
        Fut: Future<Output = Result<V, anyhow::Error>> + Send + 'static,
    {
        let shared = {
            let mut inner = self.inner.lock().await;

            if let Some(value) = inner.cache.get(&key) {
                return Ok(value.clone());
            }
            if let Some(pending) = inner.pending.get(&key) {
                // Join the in-flight call; its creator finalizes the maps.
                let pending = pending.clone();
                drop(inner);
                return pending.await.map_err(PoolError::Factory);
            }

            // Registration happens before any await, so callers racing in
            // the same tick still observe the pending entry.
            let fut = factory(key.clone());
            let shared = async move {
                match AssertUnwindSafe(fut).catch_unwind().await {
                    Ok(result) => result.map_err(Arc::new),
                    Err(payload) => Err(Arc::new(anyhow::anyhow!(
                        "factory panicked: {}",
                        panic_message(payload.as_ref())
                    ))),
                }
            }
            .boxed()
            .shared();
            inner.pending.insert(key.clone(), shared.clone());
            shared
        };

        let result = shared.clone().await;

        let mut inner = self.inner.lock().await;
        // Clear our pending slot regardless of outcome. The ptr_eq check
        // keeps us from clobbering a newer in-flight call for the same key.
        let still_ours = inner
            .pending
            .get(&key)
            .is_some_and(|current| current.ptr_eq(&shared));
        if still_ours {
            inner.pending.remove(&key);
        }
        if let Ok(value) = &result {
            inner.cache.insert(key, value.clone());
        }

        result.map_err(PoolError::Factory)
    }

    /// Whether a built value is cached for `key`.
    ///
    /// In-flight factory calls are not visible here.
    pub async fn has(&self, key: &K) -> bool {
        let inner = self.inner.lock().await;
        inner.cache.contains_key(key)
    }

    /// Get the cached value for `key` without creating one.
    pub async fn get(&self, key: &K) -> Option<V> {
        let inner = self.inner.lock().await;
        inner.cache.get(key).cloned()
    }

    /// Manually insert a value for `key`, replacing any cached one.
    pub async fn set(&self, key: K, value: V) {
        let mut inner = self.inner.lock().await;
        inner.cache.insert(key, value);
    }

    /// Remove the cached value for `key`, returning it if present.
    pub async fn delete(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock().await;
        inner.cache.remove(key)
    }

    /// Remove all cached values.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.cache.clear();
    }

    /// Number of cached values.
    pub async fn len(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.cache.len()
    }

    /// Whether the cache holds no values.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
