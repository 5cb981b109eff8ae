//! Base plugin types.

use crate::error::RequestError;
use crate::plugins::HookType;
use crate::transport::{AbortController, ByteStream, Response};
use crate::types::{RequestConfig, ResponseType, ResponseValue, StreamChunk};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Named priority levels. Any `i32` works; lower runs earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PluginPriority {
    Highest = -100,
    High = -50,
    Normal = 0,
    Low = 50,
    Lowest = 100,
}

impl Default for PluginPriority {
    fn default() -> Self {
        PluginPriority::Normal
    }
}

impl From<PluginPriority> for i32 {
    fn from(p: PluginPriority) -> Self {
        p as i32
    }
}

/// Context threaded through `after_response` hooks.
#[derive(Debug)]
pub struct ResponseContext {
    pub config: Arc<RequestConfig>,
    pub response: Response,
    pub response_type: ResponseType,
    /// Materialized value; hooks may replace it.
    pub result: ResponseValue,
    pub controller: AbortController,
}

/// Context handed to `on_finally` hooks. The response is intentionally absent.
#[derive(Debug, Clone)]
pub struct FinallyContext {
    pub config: Arc<RequestConfig>,
}

/// A request lifecycle plugin.
///
/// Every hook has a pass-through default. [`Plugin::implements`] tells the
/// composer which hooks this plugin contributes; hooks it does not implement
/// are left out of that hook's pipeline entirely.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Informational only; plugins are never deduplicated by name.
    fn name(&self) -> &str;

    fn priority(&self) -> i32 {
        PluginPriority::Normal.into()
    }

    fn implements(&self, _hook: HookType) -> bool {
        true
    }

    /// Receive and return the configuration. Setting `config.resolve`
    /// short-circuits the transport and skips the remaining hooks.
    async fn before_request(&self, config: RequestConfig) -> Result<RequestConfig> {
        Ok(config)
    }

    async fn after_response(&self, _ctx: &mut ResponseContext) -> Result<()> {
        Ok(())
    }

    async fn before_stream(&self, body: ByteStream, _config: &RequestConfig) -> Result<ByteStream> {
        Ok(body)
    }

    async fn transform_stream_chunk(
        &self,
        chunk: StreamChunk,
        _config: &RequestConfig,
    ) -> Result<StreamChunk> {
        Ok(chunk)
    }

    async fn on_error(&self, error: RequestError, _config: &RequestConfig) -> RequestError {
        error
    }

    async fn on_finally(&self, _ctx: &FinallyContext) {}
}
