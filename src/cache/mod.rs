//! 响应缓存与请求去重：以插件形式接入请求生命周期。
//!
//! # Response Caching and Request Deduplication
//!
//! Both features are ordinary [`Plugin`](crate::plugins::Plugin)s. They use
//! the short-circuit resolver on the request configuration, so a served
//! request never reaches the transport.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CachePlugin`] | Serves and stores responses of cacheable methods |
//! | [`CacheManager`] | TTL, size limit, key prefix and statistics |
//! | [`CacheBackend`] | Trait for custom storage |
//! | [`MemoryCache`] | In-memory LRU with per-entry TTL |
//! | [`NullCache`] | Stores nothing |
//! | [`CacheKeyGenerator`] | SHA-256 over method, URL, params and body |
//! | [`DedupePlugin`] | Collapses identical concurrent requests |
//!
//! ## Example
//!
//! ```rust,no_run
//! use plugfetch::cache::{CacheConfig, CacheManager, CachePlugin, DedupePlugin, MemoryCache};
//! use plugfetch::Client;
//!
//! # fn demo() -> plugfetch::Result<()> {
//! let cache = CachePlugin::new(CacheManager::new(CacheConfig::new(), Box::new(MemoryCache::new(1000))));
//! let client = Client::builder()
//!     .base_url("https://api.example.com")
//!     .plugin(cache.into_plugin())
//!     .plugin(DedupePlugin::share().into_plugin())
//!     .build()?;
//! # let _ = client;
//! # Ok(())
//! # }
//! ```

mod backend;
mod dedupe;
mod key;
mod manager;
mod plugin;

pub use backend::{CacheBackend, CachedResponse, MemoryCache, NullCache};
pub use dedupe::{DedupePlugin, DedupePolicy, DEDUPE_KEY_EXTRA, DEDUPE_LEADER_EXTRA};
pub use key::{CacheKey, CacheKeyGenerator};
pub use manager::{CacheConfig, CacheManager, CacheStats};
pub use plugin::{CachePlugin, CACHE_KEY_EXTRA, CACHE_STATUS_EXTRA};
