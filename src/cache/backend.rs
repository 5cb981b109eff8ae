//! Cache backend implementations.

use super::key::CacheKey;
use crate::transport::Response;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use reqwest::header::HeaderMap;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// A fully buffered response, as stored in a cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl CachedResponse {
    /// Buffer `response` through a clone, leaving the original handle unread.
    pub async fn capture(response: &Response) -> Result<Self> {
        let body = response.clone().bytes().await?;
        Ok(Self {
            status: response.status(),
            status_text: response.status_text().to_string(),
            headers: response.headers().clone(),
            body,
        })
    }

    pub fn into_response(self) -> Response {
        Response::from_parts(self.status, self.headers, self.body).with_status_text(self.status_text)
    }

    pub fn size(&self) -> usize {
        self.body.len()
    }
}

struct CacheEntry {
    value: CachedResponse,
    created_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.created_at.elapsed() > self.ttl
    }
}

#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedResponse>>;
    async fn set(&self, key: &CacheKey, value: CachedResponse, ttl: Duration) -> Result<()>;
    async fn delete(&self, key: &CacheKey) -> Result<bool>;
    async fn exists(&self, key: &CacheKey) -> Result<bool>;
    async fn clear(&self) -> Result<()>;
    async fn len(&self) -> Result<usize>;
    fn name(&self) -> &'static str;
}

/// In-memory LRU with per-entry TTL. Expired entries are dropped on access.
pub struct MemoryCache {
    entries: Mutex<LruCache<CacheKey, CacheEntry>>,
}

impl MemoryCache {
    /// `max_entries` of zero is treated as one.
    pub fn new(max_entries: usize) -> Self {
        let cap = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(cap)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, LruCache<CacheKey, CacheEntry>>> {
        self.entries.lock().map_err(|_| {
            Error::unknown_with_context(
                "cache lock poisoned",
                ErrorContext::new().with_source("memory_cache"),
            )
        })
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedResponse>> {
        let mut entries = self.lock()?;
        let expired = match entries.get(key) {
            Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &CacheKey, value: CachedResponse, ttl: Duration) -> Result<()> {
        let mut entries = self.lock()?;
        entries.put(
            key.clone(),
            CacheEntry {
                value,
                created_at: Instant::now(),
                ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.lock()?.pop(key).is_some())
    }

    async fn exists(&self, key: &CacheKey) -> Result<bool> {
        Ok(self
            .lock()?
            .peek(key)
            .map(|e| !e.is_expired())
            .unwrap_or(false))
    }

    async fn clear(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        let mut entries = self.lock()?;
        let expired: Vec<CacheKey> = entries
            .iter()
            .filter(|(_, e)| e.is_expired())
            .map(|(k, _)| k.clone())
            .collect();
        for k in &expired {
            entries.pop(k);
        }
        Ok(entries.len())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Backend that stores nothing.
pub struct NullCache;

impl NullCache {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NullCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for NullCache {
    async fn get(&self, _: &CacheKey) -> Result<Option<CachedResponse>> {
        Ok(None)
    }
    async fn set(&self, _: &CacheKey, _: CachedResponse, _: Duration) -> Result<()> {
        Ok(())
    }
    async fn delete(&self, _: &CacheKey) -> Result<bool> {
        Ok(false)
    }
    async fn exists(&self, _: &CacheKey) -> Result<bool> {
        Ok(false)
    }
    async fn clear(&self) -> Result<()> {
        Ok(())
    }
    async fn len(&self) -> Result<usize> {
        Ok(0)
    }
    fn name(&self) -> &'static str {
        "null"
    }
}
