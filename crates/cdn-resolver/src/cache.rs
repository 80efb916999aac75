use std::{num::NonZeroUsize, sync::Arc};

use lru::LruCache;
use tracing::debug;
use url::Url;

use crate::{config::DEFAULT_CACHE_CAPACITY, error::ResolverError, policy::ReplacementPolicy};

const DEFAULT_CAPACITY: NonZeroUsize = NonZeroUsize::new(DEFAULT_CACHE_CAPACITY).unwrap();

/// Host-independent identity of a request: path plus query.
pub fn request_key(url: &Url) -> String {
    match url.query() {
        Some(query) if !query.is_empty() => format!("{}?{}", url.path(), query),
        _ => url.path().to_owned(),
    }
}

/// Bounded map from request key to the policy of the group the key belongs to.
pub struct PolicyCache {
    inner: LruCache<String, Arc<ReplacementPolicy>>,
    evictions: u64,
}

impl PolicyCache {
    pub fn new(capacity: usize) -> Result<Self, ResolverError> {
        let capacity = NonZeroUsize::new(capacity)
            .ok_or_else(|| ResolverError::configuration("cache capacity must be non-zero"))?;
        Ok(Self {
            inner: LruCache::new(capacity),
            evictions: 0,
        })
    }

    /// Looks up `key` and marks it as most recently used.
    pub fn get(&mut self, key: &str) -> Option<Arc<ReplacementPolicy>> {
        self.inner.get(key).cloned()
    }

    /// Looks up `key` without touching recency.
    pub fn peek(&self, key: &str) -> Option<&Arc<ReplacementPolicy>> {
        self.inner.peek(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains(key)
    }

    pub fn insert(&mut self, key: String, policy: Arc<ReplacementPolicy>) {
        if let Some((evicted, _)) = self.inner.push(key.clone(), policy) {
            if evicted != key {
                self.evictions += 1;
                debug!(key = %evicted, "Evicted least recently used CDN policy");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.cap().get()
    }

    pub fn evictions(&self) -> u64 {
        self.evictions
    }
}

impl Default for PolicyCache {
    fn default() -> Self {
        Self {
            inner: LruCache::new(DEFAULT_CAPACITY),
            evictions: 0,
        }
    }
}

impl std::fmt::Debug for PolicyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("evictions", &self.evictions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::TierBuckets;

    fn empty_policy() -> Arc<ReplacementPolicy> {
        Arc::new(ReplacementPolicy::from_buckets(TierBuckets::new()))
    }

    #[test]
    fn request_key_ignores_host_and_scheme() {
        let a = Url::parse("https://a.example/upgcxcode/1.m4s?e=1&deadline=2").unwrap();
        let b = Url::parse("http://b.example:8080/upgcxcode/1.m4s?e=1&deadline=2").unwrap();
        assert_eq!(request_key(&a), request_key(&b));
        assert_eq!(request_key(&a), "/upgcxcode/1.m4s?e=1&deadline=2");

        let bare = Url::parse("https://a.example/upgcxcode/1.m4s?").unwrap();
        assert_eq!(request_key(&bare), "/upgcxcode/1.m4s");
    }

    #[test]
    fn zero_capacity_is_an_error() {
        assert!(PolicyCache::new(0).is_err());
        assert_eq!(PolicyCache::default().capacity(), DEFAULT_CACHE_CAPACITY);
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = PolicyCache::new(2).unwrap();
        cache.insert("a".into(), empty_policy());
        cache.insert("b".into(), empty_policy());
        assert!(cache.get("a").is_some());

        cache.insert("c".into(), empty_policy());
        assert_eq!(cache.len(), 2);
        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
        assert_eq!(cache.evictions(), 1);
    }

    #[test]
    fn replacing_a_key_is_not_an_eviction() {
        let mut cache = PolicyCache::new(2).unwrap();
        cache.insert("a".into(), empty_policy());
        cache.insert("a".into(), empty_policy());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.evictions(), 0);
    }

    #[test]
    fn peek_does_not_refresh() {
        let mut cache = PolicyCache::new(2).unwrap();
        cache.insert("a".into(), empty_policy());
        cache.insert("b".into(), empty_policy());
        assert!(cache.peek("a").is_some());

        cache.insert("c".into(), empty_policy());
        assert!(!cache.contains("a"));
    }
}
