//! The request object: an in-flight request with its materializers.

use super::error_classification::ErrorHandler;
use super::execution::{self, Execution, Settlement};
use super::signals::{InflightSet, InflightTracker};
use crate::error::{ErrorOrigin, RequestError};
use crate::error_kind::ErrorKind;
use crate::pipeline::finalize::{FinalizeGuard, Finalizer};
use crate::pipeline::stream::{apply_before_stream, ChunkPipeline, ChunkStream};
use crate::plugins::{Composition, FinallyContext, Plugin, ResponseContext};
use crate::transport::{AbortController, ByteStream, Response, Transport};
use crate::types::{
    Blob, FormData, FromResponseValue, RequestConfig, ResponseType, ResponseValue,
};
use crate::{RequestResult, Result};
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt, Shared};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::future::IntoFuture;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// What a request is built from; kept so [`Request::retry`] can rebuild it.
#[derive(Clone)]
pub(crate) struct RequestOptions {
    pub(crate) config: RequestConfig,
    pub(crate) composition: Arc<Composition>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) inflight: Option<Arc<InflightSet>>,
    pub(crate) controller: Option<AbortController>,
}

struct Inner {
    id: Uuid,
    options: RequestOptions,
    controller: AbortController,
    composition: Arc<Composition>,
    errors: ErrorHandler,
    outcome: Shared<BoxFuture<'static, Settlement>>,
    stream_taken: AtomicBool,
}

/// An in-flight HTTP request.
///
/// The workflow starts as soon as the request is constructed (when built
/// inside a tokio runtime; otherwise on first use). Consume it through one
/// of the materializers, or await it directly, which is the same as
/// [`json`](Request::json):
///
/// ```rust,no_run
/// # async fn demo(client: plugfetch::Client) -> plugfetch::RequestResult<()> {
/// let users = client.get("/users", Default::default()).await?;
/// let text = client.get("/readme", Default::default()).text().await?;
/// # Ok(())
/// # }
/// ```
///
/// Every materializer call is independent: it reads through its own clone of
/// the response, runs the after_response hooks and runs on_finally exactly
/// once. The chunk stream can be taken once per request.
#[derive(Clone)]
pub struct Request {
    inner: Arc<Inner>,
}

impl Request {
    /// Build a standalone request with its own plugin list.
    pub fn new(
        config: RequestConfig,
        plugins: &[Arc<dyn Plugin>],
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self::from_options(RequestOptions {
            config,
            composition: Arc::new(Composition::compose(plugins)),
            transport,
            inflight: None,
            controller: None,
        })
    }

    pub(crate) fn from_options(options: RequestOptions) -> Self {
        let id = Uuid::new_v4();
        let controller = options.controller.clone().unwrap_or_default();

        let composition = match &options.inflight {
            Some(set) => {
                set.insert(id, controller.clone());
                options
                    .composition
                    .with_extras(&[InflightTracker::new(Arc::clone(set), id)])
            }
            None => Arc::clone(&options.composition),
        };

        let timed_out = Arc::new(AtomicBool::new(false));
        let errors = ErrorHandler::new(composition.on_error.clone(), timed_out.clone());
        let workflow = execution::run(Execution {
            id,
            config: options.config.clone(),
            composition: Arc::clone(&composition),
            transport: Arc::clone(&options.transport),
            controller: controller.clone(),
            timed_out,
            errors: errors.clone(),
        });

        let outcome: BoxFuture<'static, Settlement> = match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let task = handle.spawn(workflow);
                let fallback = Arc::new(options.config.clone());
                async move {
                    match task.await {
                        Ok(settlement) => settlement,
                        Err(e) => Settlement {
                            result: Err(RequestError::new(
                                ErrorKind::UnknownError,
                                format!("request task failed: {}", e),
                            )
                            .with_config(Arc::clone(&fallback))),
                            config: fallback,
                        },
                    }
                }
                .boxed()
            }
            Err(_) => workflow.boxed(),
        };

        Self {
            inner: Arc::new(Inner {
                id,
                options,
                controller,
                composition,
                errors,
                outcome: outcome.shared(),
                stream_taken: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Configuration this request was built from, before any plugin ran.
    pub fn config(&self) -> &RequestConfig {
        &self.inner.options.config
    }

    pub fn controller(&self) -> &AbortController {
        &self.inner.controller
    }

    /// Signal cancellation. Idempotent; does not wait for anything to unwind.
    pub fn abort(&self) {
        self.inner.controller.abort();
    }

    pub fn is_aborted(&self) -> bool {
        self.inner.controller.is_aborted()
    }

    /// A fresh, independent request built from the same options and a new
    /// abort controller.
    pub fn retry(&self) -> Request {
        let mut options = self.inner.options.clone();
        options.controller = None;
        Request::from_options(options)
    }

    /// Clone of the raw response, without committing to a decode target.
    pub async fn response(&self) -> RequestResult<Response> {
        self.inner.outcome.clone().await.result
    }

    pub async fn json(&self) -> RequestResult<Value> {
        self.materialize(ResponseType::Json, Value::from_response_value)
            .await
    }

    /// Decode the JSON result into `T` after the after_response hooks ran.
    pub async fn json_as<T: DeserializeOwned + Send>(&self) -> RequestResult<T> {
        self.materialize(ResponseType::Json, |value| {
            let value = Value::from_response_value(value)?;
            Ok(serde_json::from_value(value)?)
        })
        .await
    }

    pub async fn text(&self) -> RequestResult<String> {
        self.materialize(ResponseType::Text, String::from_response_value)
            .await
    }

    pub async fn blob(&self) -> RequestResult<Blob> {
        self.materialize(ResponseType::Blob, Blob::from_response_value)
            .await
    }

    pub async fn array_buffer(&self) -> RequestResult<Bytes> {
        self.materialize(ResponseType::ArrayBuffer, Bytes::from_response_value)
            .await
    }

    pub async fn form_data(&self) -> RequestResult<FormData> {
        self.materialize(ResponseType::FormData, FormData::from_response_value)
            .await
    }

    pub async fn bytes(&self) -> RequestResult<Vec<u8>> {
        self.materialize(ResponseType::Bytes, Vec::<u8>::from_response_value)
            .await
    }

    /// Single-pass chunk stream. A second call fails with "stream already consumed".
    pub fn stream(&self) -> RequestResult<ChunkStream> {
        if self.inner.stream_taken.swap(true, Ordering::SeqCst) {
            return Err(RequestError::new(ErrorKind::UnknownError, "stream already consumed")
                .with_config(Arc::new(self.inner.options.config.clone()))
                .with_origin(ErrorOrigin::Stream));
        }
        let inner = Arc::clone(&self.inner);
        Ok(Box::pin(async_stream::stream! {
            let settlement = inner.outcome.clone().await;
            let config = Arc::clone(&settlement.config);
            let guard = FinalizeGuard::new(inner.finalizer(&config));
            match inner.open_body(settlement).await {
                Err(err) => {
                    yield Err(err);
                    guard.finish().await;
                }
                Ok(body) => {
                    let pipeline = ChunkPipeline {
                        transform: inner.composition.transform_stream_chunk.clone(),
                        config,
                        signal: inner.controller.signal(),
                        errors: inner.errors.clone(),
                    };
                    let mut chunks = pipeline.run(body, guard);
                    while let Some(item) = chunks.next().await {
                        yield item;
                    }
                }
            }
        }))
    }

    async fn materialize<T, F>(&self, response_type: ResponseType, extract: F) -> RequestResult<T>
    where
        F: FnOnce(ResponseValue) -> Result<T> + Send,
    {
        let settlement = self.inner.outcome.clone().await;
        let guard = FinalizeGuard::new(self.inner.finalizer(&settlement.config));
        let result = self.inner.process(settlement, response_type, extract).await;
        guard.finish().await;
        result
    }
}

impl Inner {
    fn finalizer(&self, config: &Arc<RequestConfig>) -> Arc<Finalizer> {
        Finalizer::new(
            self.composition.on_finally.clone(),
            FinallyContext {
                config: Arc::clone(config),
            },
        )
    }

    async fn process<T, F>(
        &self,
        settlement: Settlement,
        response_type: ResponseType,
        extract: F,
    ) -> RequestResult<T>
    where
        F: FnOnce(ResponseValue) -> Result<T> + Send,
    {
        let Settlement { config, result } = settlement;
        let response = result?;

        let value = match decode(&response, response_type).await {
            Ok(value) => value,
            Err(e) => {
                return Err(self
                    .errors
                    .handle_with_origin(e, Some(ErrorOrigin::Decode), &config)
                    .await)
            }
        };

        let mut ctx = ResponseContext {
            config: Arc::clone(&config),
            response: response.clone(),
            response_type,
            result: value,
            controller: self.controller.clone(),
        };
        for plugin in &self.composition.after_response {
            if let Err(e) = plugin.after_response(&mut ctx).await {
                tracing::debug!(plugin = plugin.name(), error = %e, "after_response hook failed");
                return Err(self
                    .errors
                    .handle_with_origin(e, Some(ErrorOrigin::Plugin), &config)
                    .await);
            }
        }

        match extract(ctx.result) {
            Ok(v) => Ok(v),
            Err(e) => Err(self
                .errors
                .handle_with_origin(e, Some(ErrorOrigin::Decode), &config)
                .await),
        }
    }

    async fn open_body(&self, settlement: Settlement) -> RequestResult<ByteStream> {
        let Settlement { config, result } = settlement;
        let response = result?;
        let opened = match response.body() {
            Ok(body) => apply_before_stream(&self.composition.before_stream, body, &config).await,
            Err(e) => Err(e),
        };
        match opened {
            Ok(body) => Ok(body),
            Err(e) => Err(self
                .errors
                .handle_with_origin(e, Some(ErrorOrigin::Stream), &config)
                .await),
        }
    }
}

async fn decode(response: &Response, response_type: ResponseType) -> Result<ResponseValue> {
    Ok(match response_type {
        ResponseType::Json => {
            let body = response.bytes().await?;
            if body.iter().all(u8::is_ascii_whitespace) {
                ResponseValue::Json(Value::Null)
            } else {
                ResponseValue::Json(serde_json::from_slice(&body)?)
            }
        }
        ResponseType::Text => ResponseValue::Text(response.text().await?),
        ResponseType::Blob => ResponseValue::Blob(response.blob().await?),
        ResponseType::ArrayBuffer => ResponseValue::ArrayBuffer(response.array_buffer().await?),
        ResponseType::FormData => ResponseValue::FormData(response.form_data().await?),
        ResponseType::Bytes => ResponseValue::Bytes(response.bytes().await?.to_vec()),
    })
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.inner.id)
            .field("method", &self.inner.options.config.method)
            .field("url", &self.inner.options.config.url)
            .field("aborted", &self.is_aborted())
            .finish()
    }
}

impl IntoFuture for Request {
    type Output = RequestResult<Value>;
    type IntoFuture = BoxFuture<'static, RequestResult<Value>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.json().await })
    }
}

impl<'a> IntoFuture for &'a Request {
    type Output = RequestResult<Value>;
    type IntoFuture = BoxFuture<'a, RequestResult<Value>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.json())
    }
}
