//! Cache configuration.
//!
//! Each render cache is configured under its id in `roller.toml`:
//!
//! ```toml
//! [cache.planet]
//! enabled = true
//! timeout = 900   # seconds
//! size = 100
//! ```

use std::{num::NonZeroUsize, time::Duration};

use crate::config::CacheTierSettings;

pub(crate) const DEFAULT_PLANET_SIZE: usize = 100;
pub(crate) const DEFAULT_PLANET_TIMEOUT_SECS: u64 = 15 * 60;
pub(crate) const DEFAULT_WEBLOG_PAGE_SIZE: usize = 400;
pub(crate) const DEFAULT_WEBLOG_PAGE_TIMEOUT_SECS: u64 = 60 * 60;
pub(crate) const DEFAULT_SALT_SIZE: usize = 5000;
pub(crate) const DEFAULT_SALT_TIMEOUT_SECS: u64 = 60 * 60;

/// Settings for one expiring cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// A disabled cache stores nothing and always misses.
    pub enabled: bool,
    /// Maximum number of entries before LRU eviction.
    pub size: usize,
    /// Lifetime of an entry.
    pub timeout: Duration,
}

impl CacheConfig {
    pub fn planet() -> Self {
        Self::new(DEFAULT_PLANET_SIZE, DEFAULT_PLANET_TIMEOUT_SECS)
    }

    pub fn weblog_page() -> Self {
        Self::new(DEFAULT_WEBLOG_PAGE_SIZE, DEFAULT_WEBLOG_PAGE_TIMEOUT_SECS)
    }

    pub fn salt() -> Self {
        Self::new(DEFAULT_SALT_SIZE, DEFAULT_SALT_TIMEOUT_SECS)
    }

    fn new(size: usize, timeout_secs: u64) -> Self {
        Self {
            enabled: true,
            size,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn disabled(self) -> Self {
        Self {
            enabled: false,
            ..self
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    pub fn with_size(self, size: usize) -> Self {
        Self { size, ..self }
    }

    /// Returns the size as NonZeroUsize, clamping to 1 if zero.
    pub fn size_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.size).unwrap_or(NonZeroUsize::MIN)
    }
}

impl From<&CacheTierSettings> for CacheConfig {
    fn from(settings: &CacheTierSettings) -> Self {
        Self {
            enabled: settings.enabled,
            size: settings.size.get(),
            timeout: settings.timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let planet = CacheConfig::planet();
        assert!(planet.enabled);
        assert_eq!(planet.size, 100);
        assert_eq!(planet.timeout, Duration::from_secs(900));

        assert_eq!(CacheConfig::weblog_page().timeout, Duration::from_secs(3600));
        assert_eq!(CacheConfig::salt().size, 5000);
    }

    #[test]
    fn builders_adjust_single_fields() {
        let config = CacheConfig::planet()
            .disabled()
            .with_size(7)
            .with_timeout(Duration::from_secs(5));
        assert!(!config.enabled);
        assert_eq!(config.size, 7);
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = CacheConfig::planet().with_size(0);
        assert_eq!(config.size_non_zero().get(), 1);
    }
}
