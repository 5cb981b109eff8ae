//! Hook kinds and closure-built plugins.

use super::base::{FinallyContext, Plugin, ResponseContext};
use crate::error::RequestError;
use crate::transport::ByteStream;
use crate::types::{RequestConfig, StreamChunk};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookType {
    BeforeRequest,
    AfterResponse,
    BeforeStream,
    TransformStreamChunk,
    OnError,
    OnFinally,
}

impl HookType {
    pub const ALL: [HookType; 6] = [
        HookType::BeforeRequest,
        HookType::AfterResponse,
        HookType::BeforeStream,
        HookType::TransformStreamChunk,
        HookType::OnError,
        HookType::OnFinally,
    ];
}

type BeforeRequestFn = dyn Fn(RequestConfig) -> Result<RequestConfig> + Send + Sync;
type AfterResponseFn = dyn Fn(&mut ResponseContext) -> Result<()> + Send + Sync;
type BeforeStreamFn = dyn Fn(ByteStream, &RequestConfig) -> Result<ByteStream> + Send + Sync;
type TransformChunkFn = dyn Fn(StreamChunk, &RequestConfig) -> Result<StreamChunk> + Send + Sync;
type OnErrorFn = dyn Fn(RequestError, &RequestConfig) -> RequestError + Send + Sync;
type OnFinallyFn = dyn Fn(&FinallyContext) + Send + Sync;

/// A plugin assembled from synchronous closures.
///
/// Only the hooks that were set are reported by [`Plugin::implements`].
///
/// ```rust
/// use plugfetch::plugins::{FnPlugin, HookType, Plugin};
///
/// let auth = FnPlugin::new("auth")
///     .with_priority(-10)
///     .before_request(|mut cfg| {
///         cfg.set_header("authorization", "Bearer t")?;
///         Ok(cfg)
///     });
/// assert!(auth.implements(HookType::BeforeRequest));
/// assert!(!auth.implements(HookType::OnError));
/// ```
#[derive(Clone)]
pub struct FnPlugin {
    name: String,
    priority: i32,
    before_request: Option<Arc<BeforeRequestFn>>,
    after_response: Option<Arc<AfterResponseFn>>,
    before_stream: Option<Arc<BeforeStreamFn>>,
    transform_stream_chunk: Option<Arc<TransformChunkFn>>,
    on_error: Option<Arc<OnErrorFn>>,
    on_finally: Option<Arc<OnFinallyFn>>,
}

impl FnPlugin {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: 0,
            before_request: None,
            after_response: None,
            before_stream: None,
            transform_stream_chunk: None,
            on_error: None,
            on_finally: None,
        }
    }

    pub fn with_priority(mut self, priority: impl Into<i32>) -> Self {
        self.priority = priority.into();
        self
    }

    pub fn before_request<F>(mut self, f: F) -> Self
    where
        F: Fn(RequestConfig) -> Result<RequestConfig> + Send + Sync + 'static,
    {
        self.before_request = Some(Arc::new(f));
        self
    }

    pub fn after_response<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut ResponseContext) -> Result<()> + Send + Sync + 'static,
    {
        self.after_response = Some(Arc::new(f));
        self
    }

    pub fn before_stream<F>(mut self, f: F) -> Self
    where
        F: Fn(ByteStream, &RequestConfig) -> Result<ByteStream> + Send + Sync + 'static,
    {
        self.before_stream = Some(Arc::new(f));
        self
    }

    pub fn transform_stream_chunk<F>(mut self, f: F) -> Self
    where
        F: Fn(StreamChunk, &RequestConfig) -> Result<StreamChunk> + Send + Sync + 'static,
    {
        self.transform_stream_chunk = Some(Arc::new(f));
        self
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(RequestError, &RequestConfig) -> RequestError + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub fn on_finally<F>(mut self, f: F) -> Self
    where
        F: Fn(&FinallyContext) + Send + Sync + 'static,
    {
        self.on_finally = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> Arc<dyn Plugin> {
        Arc::new(self)
    }
}

impl std::fmt::Debug for FnPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hooks: Vec<_> = HookType::ALL
            .iter()
            .filter(|h| self.implements(**h))
            .collect();
        f.debug_struct("FnPlugin")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("hooks", &hooks)
            .finish()
    }
}

#[async_trait]
impl Plugin for FnPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn implements(&self, hook: HookType) -> bool {
        match hook {
            HookType::BeforeRequest => self.before_request.is_some(),
            HookType::AfterResponse => self.after_response.is_some(),
            HookType::BeforeStream => self.before_stream.is_some(),
            HookType::TransformStreamChunk => self.transform_stream_chunk.is_some(),
            HookType::OnError => self.on_error.is_some(),
            HookType::OnFinally => self.on_finally.is_some(),
        }
    }

    async fn before_request(&self, config: RequestConfig) -> Result<RequestConfig> {
        match &self.before_request {
            Some(f) => f(config),
            None => Ok(config),
        }
    }

    async fn after_response(&self, ctx: &mut ResponseContext) -> Result<()> {
        match &self.after_response {
            Some(f) => f(ctx),
            None => Ok(()),
        }
    }

    async fn before_stream(&self, body: ByteStream, config: &RequestConfig) -> Result<ByteStream> {
        match &self.before_stream {
            Some(f) => f(body, config),
            None => Ok(body),
        }
    }

    async fn transform_stream_chunk(
        &self,
        chunk: StreamChunk,
        config: &RequestConfig,
    ) -> Result<StreamChunk> {
        match &self.transform_stream_chunk {
            Some(f) => f(chunk, config),
            None => Ok(chunk),
        }
    }

    async fn on_error(&self, error: RequestError, config: &RequestConfig) -> RequestError {
        match &self.on_error {
            Some(f) => f(error, config),
            None => error,
        }
    }

    async fn on_finally(&self, ctx: &FinallyContext) {
        if let Some(f) = &self.on_finally {
            f(ctx)
        }
    }
}
