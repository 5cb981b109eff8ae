//! Response cache as a request plugin.

use super::backend::CachedResponse;
use super::key::CacheKeyGenerator;
use super::manager::{CacheManager, CacheStats};
use crate::plugins::{HookType, Plugin, PluginPriority, ResponseContext};
use crate::types::{RequestConfig, Resolver};
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// `extra` key holding the cache key of a request that missed.
pub const CACHE_KEY_EXTRA: &str = "plugfetch.cache_key";
/// `extra` key set to `"hit"` or `"miss"` for cacheable requests.
pub const CACHE_STATUS_EXTRA: &str = "plugfetch.cache";

/// Serves cached responses through the short-circuit resolver and stores
/// successful responses once they are materialized.
///
/// ```rust
/// use plugfetch::cache::{CacheConfig, CacheManager, CachePlugin, MemoryCache};
/// use std::time::Duration;
///
/// let manager = CacheManager::new(
///     CacheConfig::new().with_ttl(Duration::from_secs(60)),
///     Box::new(MemoryCache::new(500)),
/// );
/// let plugin = CachePlugin::new(manager).into_plugin();
/// # let _ = plugin;
/// ```
pub struct CachePlugin {
    manager: Arc<CacheManager>,
    keys: CacheKeyGenerator,
    priority: i32,
}

impl CachePlugin {
    pub fn new(manager: CacheManager) -> Self {
        Self::shared(Arc::new(manager))
    }

    /// Share one manager between several plugins or clients.
    pub fn shared(manager: Arc<CacheManager>) -> Self {
        Self {
            manager,
            keys: CacheKeyGenerator::new(),
            priority: PluginPriority::Normal.into(),
        }
    }

    pub fn with_key_generator(mut self, keys: CacheKeyGenerator) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_priority(mut self, priority: impl Into<i32>) -> Self {
        self.priority = priority.into();
        self
    }

    pub fn manager(&self) -> &Arc<CacheManager> {
        &self.manager
    }

    pub fn stats(&self) -> CacheStats {
        self.manager.stats()
    }

    pub fn into_plugin(self) -> Arc<dyn Plugin> {
        Arc::new(self)
    }
}

#[async_trait]
impl Plugin for CachePlugin {
    fn name(&self) -> &str {
        "cache"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn implements(&self, hook: HookType) -> bool {
        matches!(hook, HookType::BeforeRequest | HookType::AfterResponse)
    }

    async fn before_request(&self, mut config: RequestConfig) -> Result<RequestConfig> {
        if config.resolve.is_some() || !self.manager.config().caches(config.method) {
            return Ok(config);
        }
        let key = self.keys.generate(&config);
        match self.manager.get(&key).await {
            Ok(Some(hit)) => {
                tracing::debug!(url = %config.url, key = %key, "cache hit");
                config
                    .extra
                    .insert(CACHE_STATUS_EXTRA.to_string(), Value::from("hit"));
                config.set_resolve(Resolver::response(hit.into_response()));
            }
            Ok(None) => {
                config
                    .extra
                    .insert(CACHE_STATUS_EXTRA.to_string(), Value::from("miss"));
                config
                    .extra
                    .insert(CACHE_KEY_EXTRA.to_string(), Value::from(key.hash));
            }
            Err(e) => {
                tracing::warn!(url = %config.url, error = %e, "cache lookup failed");
            }
        }
        Ok(config)
    }

    async fn after_response(&self, ctx: &mut ResponseContext) -> Result<()> {
        let Some(Value::String(hash)) = ctx.config.extra.get(CACHE_KEY_EXTRA) else {
            return Ok(());
        };
        if ctx.config.resolve.is_some() || !ctx.response.ok() {
            return Ok(());
        }
        let key = hash.as_str().into();
        match CachedResponse::capture(&ctx.response).await {
            Ok(entry) => {
                if let Err(e) = self.manager.set(&key, entry).await {
                    tracing::warn!(key = %key, error = %e, "cache store failed");
                }
            }
            Err(e) => tracing::warn!(key = %key, error = %e, "response not cacheable"),
        }
        Ok(())
    }
}

impl std::fmt::Debug for CachePlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachePlugin")
            .field("manager", &self.manager)
            .field("priority", &self.priority)
            .finish()
    }
}
