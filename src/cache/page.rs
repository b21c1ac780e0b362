//! Cache for rendered weblog pages.

use tracing::info;

use super::{
    config::CacheConfig,
    keys::{WEBLOG_PAGE_CACHE_ID, weblog_page_key},
    store::{CachedPage, ExpiringCache},
};
use crate::request::WeblogPageRequest;

pub struct WeblogPageCache {
    content: ExpiringCache<CachedPage>,
}

impl WeblogPageCache {
    pub fn new(config: &CacheConfig) -> Self {
        info!(
            cache = WEBLOG_PAGE_CACHE_ID,
            enabled = config.enabled,
            size = config.size,
            timeout_secs = config.timeout.as_secs(),
            "weblog page cache configured"
        );

        Self {
            content: ExpiringCache::new(WEBLOG_PAGE_CACHE_ID, config),
        }
    }

    pub fn key(request: &WeblogPageRequest) -> String {
        weblog_page_key(request)
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

    pub fn clear(&self) {
        self.content.clear();
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_round_trip_through_their_key() {
        let cache = WeblogPageCache::new(&CacheConfig::weblog_page());
        let request = WeblogPageRequest::new("alice", true);
        let key = WeblogPageCache::key(&request);
        assert_eq!(key, "cache.weblogpage:alice/ctx=none");

        cache.put(key.clone(), CachedPage::new("application/json", "{}"));
        assert_eq!(
            cache.get(&key).map(|page| page.content_type),
            Some("application/json".to_string())
        );

        cache.remove(&key);
        assert!(cache.is_empty());
    }

    #[test]
    fn disabled_cache_never_hits() {
        let cache = WeblogPageCache::new(&CacheConfig::weblog_page().disabled());
        cache.put("k", CachedPage::new("text/html", "x"));
        assert!(cache.get("k").is_none());
    }
}
