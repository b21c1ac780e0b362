//! One-time XSRF salts handed to authoring forms.

use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use super::{config::CacheConfig, keys::SALT_CACHE_ID, store::ExpiringCache};

/// Lifetime of a salt, capped by the cache timeout.
pub const SALT_TIMEOUT: Duration = Duration::from_secs(60 * 60);

pub struct SaltCache {
    salts: ExpiringCache<String>,
}

impl SaltCache {
    /// Salts are always kept; `enabled = false` is ignored with a warning.
    pub fn new(config: &CacheConfig) -> Self {
        if !config.enabled {
            warn!(
                cache = SALT_CACHE_ID,
                "salt cache cannot be disabled, ignoring `enabled = false`"
            );
        }
        info!(
            cache = SALT_CACHE_ID,
            size = config.size,
            "salt cache configured"
        );

        let config = CacheConfig {
            enabled: true,
            ..*config
        };
        Self {
            salts: ExpiringCache::new(SALT_CACHE_ID, &config),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.salts.get(key)
    }

    /// Store `value`; it expires after [`SALT_TIMEOUT`].
    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) {
        self.salts.put_with_timeout(key, value.into(), SALT_TIMEOUT);
    }

    /// Generate a fresh salt recorded against `user` and return it.
    pub fn issue(&self, user: &str) -> String {
        let salt = Uuid::new_v4().simple().to_string();
        self.put(salt.clone(), user);
        salt
    }

    /// Take the owner of `salt` out of the cache; a salt validates once.
    pub fn consume(&self, salt: &str) -> Option<String> {
        self.salts.take(salt)
    }

    /// Spend `salt` on behalf of `user`. Succeeds at most once, and only for
    /// the user it was issued to; a salt offered by anyone else stays valid.
    pub fn spend(&self, salt: &str, user: &str) -> bool {
        self.salts.take_if(salt, |owner| owner == user).is_some()
    }

    pub fn remove(&self, key: &str) {
        self.salts.remove(key);
    }

    pub fn clear(&self) {
        self.salts.clear();
    }

    pub fn len(&self) -> usize {
        self.salts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.salts.is_empty()
    }
}
