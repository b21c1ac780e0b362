//! Render caches.
//!
//! Every cache is an explicitly constructed [`ExpiringCache`] owned by the
//! composition root and shared through `Arc`:
//!
//! - **planet**: rendered planet views plus the aggregate's last-modified time
//! - **weblogpage**: rendered weblog pages keyed by [`weblog_page_key`]
//! - **salt**: one-time XSRF salts
//!
//! ## Configuration
//!
//! ```toml
//! [cache.weblogpage]
//! enabled = true
//! timeout = 3600
//! size = 400
//! ```

mod config;
mod keys;
mod lock;
mod page;
mod planet;
mod salt;
mod store;

pub use config::CacheConfig;
pub use keys::{PLANET_CACHE_ID, SALT_CACHE_ID, WEBLOG_PAGE_CACHE_ID, planet_key, weblog_page_key};
pub use page::WeblogPageCache;
pub use planet::PlanetCache;
pub use salt::{SALT_TIMEOUT, SaltCache};
pub use store::{CachedPage, ExpiringCache, ExpiringEntry};
