use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

struct CacheValue<V> {
    value: V,
    stored_at: Instant,
}

/// A cached value together with how long ago it was stored.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit<V> {
    pub value: V,
    pub age: Duration,
}

/// In-memory response cache. Entries are never evicted on expiry so that a
/// stale value can still be served when upstreams are down.
#[derive(Clone)]
pub struct ResponseCache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Arc<Mutex<HashMap<K, CacheValue<V>>>>,
}

impl<K, V> ResponseCache<K, V>
where
    K: Eq + Hash + Send + Sync + std::fmt::Debug,
    V: Clone + Send + Sync,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns the entry only if it is younger than `ttl`.
    pub async fn get_fresh(&self, key: &K, ttl: Duration) -> Option<CacheHit<V>> {
        let cache = self.inner.lock().await;
        match cache.get(key) {
            Some(entry) if entry.stored_at.elapsed() < ttl => {
                debug!("Cache HIT for key: {:?}", key);
                Some(CacheHit {
                    value: entry.value.clone(),
                    age: entry.stored_at.elapsed(),
                })
            }
            Some(_) => {
                debug!("Cache entry expired for key: {:?}", key);
                None
            }
            None => {
                debug!("Cache MISS for key: {:?}", key);
                None
            }
        }
    }

    /// Returns the entry regardless of age.
    pub async fn get_stale(&self, key: &K) -> Option<CacheHit<V>> {
        let cache = self.inner.lock().await;
        cache.get(key).map(|entry| CacheHit {
            value: entry.value.clone(),
            age: entry.stored_at.elapsed(),
        })
    }

    pub async fn put(&self, key: K, value: V) {
        let mut cache = self.inner.lock().await;
        debug!("Cache PUT for key: {:?}", key);
        cache.insert(
            key,
            CacheValue {
                value,
                stored_at: Instant::now(),
            },
        );
    }
}

impl<K, V> Default for ResponseCache<K, V>
where
    K: Eq + Hash + Send + Sync + std::fmt::Debug,
    V: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}
