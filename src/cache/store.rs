//! Expiring, size-bounded key/value storage shared by the render caches.

use std::time::{Duration, Instant};

use bytes::Bytes;
use lru::LruCache;
use metrics::counter;
use tracing::{debug, warn};

use super::config::CacheConfig;
use super::lock::{CacheLock, CacheOp};

/// A value that stops being served once its timeout has elapsed.
#[derive(Debug, Clone)]
pub struct ExpiringEntry<V> {
    value: V,
    cached_at: Instant,
    timeout: Duration,
}

impl<V> ExpiringEntry<V> {
    pub fn new(value: V, timeout: Duration) -> Self {
        Self {
            value,
            cached_at: Instant::now(),
            timeout,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.cached_at.elapsed() >= self.timeout
    }

    /// The value, or `None` once expired.
    pub fn value(&self) -> Option<&V> {
        (!self.is_expired()).then_some(&self.value)
    }
}

/// Rendered output stored by the page and planet caches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPage {
    pub content_type: String,
    pub body: Bytes,
}

impl CachedPage {
    pub fn new(content_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            content_type: content_type.into(),
            body: body.into(),
        }
    }
}

/// String-keyed LRU cache whose entries expire after the configured timeout.
///
/// Concurrent writers race with last-write-wins. When the cache is disabled
/// every operation is a no-op and every lookup misses.
pub struct ExpiringCache<V> {
    id: &'static str,
    timeout: Duration,
    entries: Option<CacheLock<LruCache<String, ExpiringEntry<V>>>>,
}

impl<V: Clone> ExpiringCache<V> {
    pub fn new(id: &'static str, config: &CacheConfig) -> Self {
        let entries = if config.enabled {
            Some(CacheLock::new(id, LruCache::new(config.size_non_zero())))
        } else {
            warn!(cache = id, "caching has been DISABLED");
            None
        };

        Self {
            id,
            timeout: config.timeout,
            entries,
        }
    }

    pub fn id(&self) -> &'static str {
        self.id
    }

    pub fn is_enabled(&self) -> bool {
        self.entries.is_some()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.as_ref()?;
        let mut entries = entries.write(CacheOp::Get);

        let outcome = match entries.get(key) {
            Some(entry) => entry.value().cloned().ok_or(()),
            None => {
                debug!(cache = self.id, key, "MISS");
                counter!("roller_cache_miss_total", "cache" => self.id).increment(1);
                return None;
            }
        };

        match outcome {
            Ok(value) => {
                debug!(cache = self.id, key, "HIT");
                counter!("roller_cache_hit_total", "cache" => self.id).increment(1);
                Some(value)
            }
            Err(()) => {
                entries.pop(key);
                debug!(cache = self.id, key, "HIT-EXPIRED");
                counter!("roller_cache_expired_total", "cache" => self.id).increment(1);
                None
            }
        }
    }

    pub fn put(&self, key: impl Into<String>, value: V) {
        self.put_with_timeout(key, value, self.timeout);
    }

    /// Store with a per-entry timeout, capped by the cache timeout.
    pub fn put_with_timeout(&self, key: impl Into<String>, value: V, timeout: Duration) {
        let Some(entries) = self.entries.as_ref() else {
            return;
        };
        let key = key.into();
        let entry = ExpiringEntry::new(value, timeout.min(self.timeout));

        debug!(cache = self.id, key = %key, "PUT");
        let evicted = entries.write(CacheOp::Put).push(key.clone(), entry);
        if let Some((evicted_key, _)) = evicted
            && evicted_key != key
        {
            counter!("roller_cache_evict_total", "cache" => self.id).increment(1);
        }
    }

    /// Remove and return the live value under `key` when `accept` approves it.
    ///
    /// Lookup, check and removal happen under one write guard, so of several
    /// concurrent callers at most one receives the value. Expired entries are
    /// dropped and a rejected value stays cached.
    pub fn take_if<F>(&self, key: &str, accept: F) -> Option<V>
    where
        F: FnOnce(&V) -> bool,
    {
        let entries = self.entries.as_ref()?;
        let mut entries = entries.write(CacheOp::Take);

        let live = match entries.peek(key) {
            Some(entry) => entry.value().map(|value| accept(value)),
            None => {
                debug!(cache = self.id, key, "TAKE-MISS");
                counter!("roller_cache_miss_total", "cache" => self.id).increment(1);
                return None;
            }
        };

        match live {
            Some(true) => {
                debug!(cache = self.id, key, "TAKE");
                counter!("roller_cache_hit_total", "cache" => self.id).increment(1);
                entries.pop(key).map(|entry| entry.value)
            }
            Some(false) => {
                debug!(cache = self.id, key, "TAKE-REJECTED");
                None
            }
            None => {
                entries.pop(key);
                debug!(cache = self.id, key, "HIT-EXPIRED");
                counter!("roller_cache_expired_total", "cache" => self.id).increment(1);
                None
            }
        }
    }

    /// Remove and return the live value under `key`.
    pub fn take(&self, key: &str) -> Option<V> {
        self.take_if(key, |_| true)
    }

    pub fn remove(&self, key: &str) {
        let Some(entries) = self.entries.as_ref() else {
            return;
        };
        entries.write(CacheOp::Remove).pop(key);
        debug!(cache = self.id, key, "REMOVE");
    }

    pub fn clear(&self) {
        let Some(entries) = self.entries.as_ref() else {
            return;
        };
        entries.write(CacheOp::Clear).clear();
        debug!(cache = self.id, "CLEAR");
    }

    /// Number of stored entries, expired ones included until touched.
    pub fn len(&self) -> usize {
        self.entries
            .as_ref()
            .map_or(0, |entries| entries.read(CacheOp::Len).len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::sync::Barrier;
    use std::thread;

    use super::*;

    fn cache(config: CacheConfig) -> ExpiringCache<String> {
        ExpiringCache::new("cache.test", &config)
    }

    #[test]
    fn put_get_remove_clear() {
        let cache = cache(CacheConfig::planet());
        assert!(cache.get("a").is_none());

        cache.put("a", "1".to_string());
        cache.put("b", "2".to_string());
        assert_eq!(cache.get("a").as_deref(), Some("1"));
        assert_eq!(cache.len(), 2);

        cache.remove("a");
        assert!(cache.get("a").is_none());

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn last_write_wins() {
        let cache = cache(CacheConfig::planet());
        cache.put("a", "1".to_string());
        cache.put("a", "2".to_string());
        assert_eq!(cache.get("a").as_deref(), Some("2"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn expired_entries_are_dropped_on_read() {
        let cache = cache(CacheConfig::planet().with_timeout(Duration::ZERO));
        cache.put("a", "1".to_string());
        assert_eq!(cache.len(), 1);
        assert!(cache.get("a").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn per_entry_timeout_is_capped_by_cache_timeout() {
        let cache = cache(CacheConfig::planet());
        cache.put_with_timeout("short", "1".to_string(), Duration::ZERO);
        cache.put_with_timeout("long", "2".to_string(), Duration::from_secs(3600 * 24));
        assert!(cache.get("short").is_none());
        assert_eq!(cache.get("long").as_deref(), Some("2"));
    }

    #[test]
    fn lru_eviction_at_capacity() {
        let cache = cache(CacheConfig::planet().with_size(2));
        cache.put("a", "1".to_string());
        cache.put("b", "2".to_string());
        assert!(cache.get("a").is_some());

        cache.put("c", "3".to_string());
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn disabled_cache_is_inert() {
        let cache = cache(CacheConfig::planet().disabled());
        assert!(!cache.is_enabled());
        cache.put("a", "1".to_string());
        assert!(cache.get("a").is_none());
        assert!(cache.is_empty());
        cache.remove("a");
        cache.clear();
    }

    #[test]
    fn recovers_from_poisoned_lock() {
        let cache = cache(CacheConfig::planet());
        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = cache
                .entries
                .as_ref()
                .expect("enabled cache")
                .write(CacheOp::Put);
            panic!("poison cache lock");
        }));

        cache.put("a", "1".to_string());
        assert_eq!(cache.get("a").as_deref(), Some("1"));
    }

    #[test]
    fn take_removes_the_live_value_once() {
        let cache = cache(CacheConfig::planet());
        cache.put("a", "1".to_string());

        assert_eq!(cache.take("a").as_deref(), Some("1"));
        assert!(cache.take("a").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn rejected_take_leaves_the_value_cached() {
        let cache = cache(CacheConfig::planet());
        cache.put("a", "1".to_string());

        assert!(cache.take_if("a", |value| value == "2").is_none());
        assert_eq!(cache.take_if("a", |value| value == "1").as_deref(), Some("1"));
        assert!(cache.is_empty());
    }

    #[test]
    fn take_drops_expired_entries() {
        let cache = cache(CacheConfig::planet().with_timeout(Duration::ZERO));
        cache.put("a", "1".to_string());
        assert!(cache.take("a").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn concurrent_takes_hand_out_a_value_once() {
        let cache = cache(CacheConfig::planet());
        cache.put("a", "1".to_string());
        let barrier = Barrier::new(8);

        let taken = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        cache.take("a").is_some()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("taker thread"))
                .filter(|taken| *taken)
                .count()
        });

        assert_eq!(taken, 1);
    }

    #[test]
    fn expiring_entry_reports_value_until_timeout() {
        let entry = ExpiringEntry::new(5, Duration::from_secs(60));
        assert_eq!(entry.value(), Some(&5));
        assert!(!entry.is_expired());

        let entry = ExpiringEntry::new(5, Duration::ZERO);
        assert!(entry.value().is_none());
    }
}
