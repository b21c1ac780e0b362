//! Cache for rendered planet views.

use time::OffsetDateTime;
use tracing::{info, warn};

use super::{
    config::CacheConfig,
    keys::{PLANET_CACHE_ID, planet_key},
    lock::{CacheLock, CacheOp},
    store::{CachedPage, ExpiringCache, ExpiringEntry},
};
use crate::request::PlanetRequest;

/// Planet content plus the aggregate's last-modified timestamp.
///
/// The timestamp expires on the same timeout as the content, after which it
/// is recomputed.
pub struct PlanetCache {
    content: ExpiringCache<CachedPage>,
    last_updated: CacheLock<Option<ExpiringEntry<OffsetDateTime>>>,
}

impl PlanetCache {
    pub fn new(config: &CacheConfig) -> Self {
        info!(
            cache = PLANET_CACHE_ID,
            enabled = config.enabled,
            size = config.size,
            timeout_secs = config.timeout.as_secs(),
            "planet cache configured"
        );

        Self {
            content: ExpiringCache::new(PLANET_CACHE_ID, config),
            last_updated: CacheLock::new(PLANET_CACHE_ID, None),
        }
    }

    pub fn key(request: &PlanetRequest) -> String {
        planet_key(request)
    }

    pub fn get(&self, key: &str) -> Option<CachedPage> {
        self.content.get(key)
    }

    pub fn put(&self, key: impl Into<String>, page: CachedPage) {
        self.content.put(key, page);
    }

    pub fn remove(&self, key: &str) {
        self.content.remove(key);
    }

    /// Drop all content and the cached last-modified time.
    pub fn clear(&self) {
        self.content.clear();
        *self.last_updated.write(CacheOp::Clear) = None;
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// When the planet aggregate last changed.
    ///
    /// Without a recorded update the current time is used and remembered
    /// until the timeout passes.
    pub fn last_modified(&self) -> OffsetDateTime {
        let mut last_updated = self.last_updated.write(CacheOp::LastModified);

        if let Some(value) = last_updated.as_ref().and_then(ExpiringEntry::value) {
            return *value;
        }

        let now = OffsetDateTime::now_utc();
        warn!(
            cache = PLANET_CACHE_ID,
            "can't get last update time, using current time instead"
        );
        *last_updated = Some(ExpiringEntry::new(now, self.content.timeout()));
        now
    }

    /// Record a known update time.
    pub fn mark_updated(&self, at: OffsetDateTime) {
        *self.last_updated.write(CacheOp::MarkUpdated) =
            Some(ExpiringEntry::new(at, self.content.timeout()));
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use time::macros::datetime;

    use super::*;

    #[test]
    fn stores_pages_by_planet_key() {
        let cache = PlanetCache::new(&CacheConfig::planet());
        let key = PlanetCache::key(&PlanetRequest::new("page", "en"));

        assert!(cache.get(&key).is_none());
        cache.put(key.clone(), CachedPage::new("text/html", "<p>planet</p>"));
        assert_eq!(
            cache.get(&key).map(|page| page.body),
            Some("<p>planet</p>".into())
        );
    }

    #[test]
    fn last_modified_is_stable_until_cleared() {
        let cache = PlanetCache::new(&CacheConfig::planet());
        let first = cache.last_modified();
        assert_eq!(cache.last_modified(), first);

        cache.clear();
        std::thread::sleep(Duration::from_millis(2));
        assert!(cache.last_modified() > first);
    }

    #[test]
    fn recorded_update_wins_over_fallback() {
        let cache = PlanetCache::new(&CacheConfig::planet());
        let at = datetime!(2024-05-01 12:00 UTC);
        cache.mark_updated(at);
        assert_eq!(cache.last_modified(), at);
    }

    #[test]
    fn expired_timestamp_is_recomputed() {
        let cache = PlanetCache::new(&CacheConfig::planet().with_timeout(Duration::ZERO));
        let at = datetime!(2024-05-01 12:00 UTC);
        cache.mark_updated(at);
        assert!(cache.last_modified() > at);
    }

    #[test]
    fn clear_also_drops_content() {
        let cache = PlanetCache::new(&CacheConfig::planet());
        cache.put("k", CachedPage::new("text/html", "x"));
        cache.clear();
        assert!(cache.is_empty());
    }
}
