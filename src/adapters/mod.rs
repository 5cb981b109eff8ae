//! Reactive wrappers that drive one [`Request`] per invocation.
//!
//! An adapter wraps a request factory. Each [`Adapter::run`] call flips a
//! loading flag on, injects a [`LoadingPlugin`] that releases the run when the
//! request finalizes, and hands back an [`AdapterCall`] exposing the usual
//! materializers plus [`AdapterCall::cancel`]. The flag stays on while any
//! run of the same adapter is unreleased.
//!
//! Two flavours of loading state are provided:
//!
//! | Adapter | State |
//! |---------|-------|
//! | [`WatchAdapter`] | a `tokio::sync::watch` channel |
//! | [`SignalAdapter`] | a [`Signal<bool>`] with callback subscribers |

mod signal;
mod watch;

pub use signal::{Signal, SignalAdapter, SubscriptionId};
pub use watch::{WatchAdapter, WatchLoading};

use crate::error::{ErrorOrigin, RequestError};
use crate::pipeline::ChunkStream;
use crate::plugins::{FinallyContext, HookType, Plugin, PluginPriority};
use crate::types::{Blob, FormData};
use crate::{Request, RequestResult};
use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::IntoFuture;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// A loading flag an adapter can drive.
pub trait LoadingState: Send + Sync + 'static {
    fn set_loading(&self, loading: bool);
    fn is_loading(&self) -> bool;
}

type ErrorCallback = dyn Fn(&RequestError) + Send + Sync;

/// One run's claim on the shared loading flag.
struct LoadingRun {
    state: Arc<dyn LoadingState>,
    active: Arc<Mutex<usize>>,
    released: AtomicBool,
}

impl LoadingRun {
    fn start(state: Arc<dyn LoadingState>, active: Arc<Mutex<usize>>) -> Arc<Self> {
        if let Ok(mut n) = active.lock() {
            *n += 1;
            state.set_loading(true);
        }
        Arc::new(Self {
            state,
            active,
            released: AtomicBool::new(false),
        })
    }

    /// Idempotent; clears the flag once the last active run is released.
    fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Ok(mut n) = self.active.lock() {
            *n = n.saturating_sub(1);
            if *n == 0 {
                self.state.set_loading(false);
            }
        }
    }
}

/// Releases its adapter run when the request finalizes.
pub struct LoadingPlugin {
    run: Arc<LoadingRun>,
}

#[async_trait]
impl Plugin for LoadingPlugin {
    fn name(&self) -> &str {
        "loading"
    }

    fn priority(&self) -> i32 {
        PluginPriority::Lowest.into()
    }

    fn implements(&self, hook: HookType) -> bool {
        hook == HookType::OnFinally
    }

    async fn on_finally(&self, _ctx: &FinallyContext) {
        self.run.release();
    }
}

/// Wraps a factory `Fn(args, extra_plugins) -> Request`.
///
/// ```rust,no_run
/// use plugfetch::adapters::WatchAdapter;
/// use plugfetch::plugins::Plugin;
/// use plugfetch::{Client, RequestInit};
/// use std::sync::Arc;
///
/// # async fn demo(client: Client) {
/// let users = WatchAdapter::watch(move |page: u32, plugins: Vec<Arc<dyn Plugin>>| {
///     let mut init = RequestInit::new().params(serde_json::json!({ "page": page }));
///     init.plugins = plugins;
///     client.get("/users", init)
/// });
/// let mut loading = users.state().subscribe();
/// let call = users.run(1);
/// assert!(*loading.borrow_and_update());
/// let _ = call.json().await;
/// # }
/// ```
pub struct Adapter<S, F> {
    state: Arc<S>,
    active: Arc<Mutex<usize>>,
    factory: F,
    on_error: Option<Arc<ErrorCallback>>,
}

impl<S: LoadingState, F> Adapter<S, F> {
    pub fn new(state: S, factory: F) -> Self {
        Self {
            state: Arc::new(state),
            active: Arc::new(Mutex::new(0)),
            factory,
            on_error: None,
        }
    }

    /// Invoked for failures the caller should see: not for aborts, and not for
    /// a decode failure that trails an error already reported for the same call.
    pub fn on_error<C>(mut self, callback: C) -> Self
    where
        C: Fn(&RequestError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }

    pub fn state(&self) -> &Arc<S> {
        &self.state
    }

    pub fn loading(&self) -> bool {
        self.state.is_loading()
    }

    pub fn run<A>(&self, args: A) -> AdapterCall
    where
        F: Fn(A, Vec<Arc<dyn Plugin>>) -> Request,
    {
        let state: Arc<dyn LoadingState> = self.state.clone();
        let run = LoadingRun::start(state, Arc::clone(&self.active));
        let loading: Arc<dyn Plugin> = Arc::new(LoadingPlugin {
            run: Arc::clone(&run),
        });
        let request = (self.factory)(args, vec![loading]);
        tracing::debug!(request_id = %request.id(), url = %request.config().url, "adapter run");
        AdapterCall {
            request,
            run,
            reporter: ErrorReporter {
                callback: self.on_error.clone(),
                reported: Arc::new(AtomicBool::new(false)),
            },
        }
    }
}

#[derive(Clone)]
struct ErrorReporter {
    callback: Option<Arc<ErrorCallback>>,
    reported: Arc<AtomicBool>,
}

impl ErrorReporter {
    fn report(&self, error: &RequestError) {
        if error.is_aborted() {
            return;
        }
        let already = self.reported.swap(true, Ordering::SeqCst);
        if already && error.origin == ErrorOrigin::Decode {
            return;
        }
        if let Some(cb) = &self.callback {
            cb(error);
        }
    }

    fn check<T>(&self, result: RequestResult<T>) -> RequestResult<T> {
        if let Err(e) = &result {
            self.report(e);
        }
        result
    }
}

/// One adapter invocation.
#[derive(Clone)]
pub struct AdapterCall {
    request: Request,
    run: Arc<LoadingRun>,
    reporter: ErrorReporter,
}

impl AdapterCall {
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// The adapter's shared flag, not this call alone.
    pub fn loading(&self) -> bool {
        self.run.state.is_loading()
    }

    /// Abort the request and release this run without waiting for finalization.
    pub fn cancel(&self) {
        self.request.abort();
        self.run.release();
    }

    pub async fn json(&self) -> RequestResult<Value> {
        self.reporter.check(self.request.json().await)
    }

    pub async fn json_as<T: DeserializeOwned + Send>(&self) -> RequestResult<T> {
        self.reporter.check(self.request.json_as().await)
    }

    pub async fn text(&self) -> RequestResult<String> {
        self.reporter.check(self.request.text().await)
    }

    pub async fn blob(&self) -> RequestResult<Blob> {
        self.reporter.check(self.request.blob().await)
    }

    pub async fn array_buffer(&self) -> RequestResult<Bytes> {
        self.reporter.check(self.request.array_buffer().await)
    }

    pub async fn form_data(&self) -> RequestResult<FormData> {
        self.reporter.check(self.request.form_data().await)
    }

    pub async fn bytes(&self) -> RequestResult<Vec<u8>> {
        self.reporter.check(self.request.bytes().await)
    }

    /// Chunk stream; reader failures and per-chunk errors are both reported.
    pub fn stream(&self) -> RequestResult<ChunkStream> {
        let stream = self.reporter.check(self.request.stream())?;
        let reporter = self.reporter.clone();
        Ok(Box::pin(stream.inspect(move |item| match item {
            Err(e) => reporter.report(e),
            Ok(chunk) => {
                if let Some(e) = &chunk.error {
                    reporter.report(e);
                }
            }
        })))
    }
}

impl std::fmt::Debug for AdapterCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterCall")
            .field("request", &self.request)
            .field("loading", &self.loading())
            .finish()
    }
}

impl IntoFuture for AdapterCall {
    type Output = RequestResult<Value>;
    type IntoFuture = BoxFuture<'static, RequestResult<Value>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.json().await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_kind::ErrorKind;

    #[derive(Default)]
    struct Flag(AtomicBool);

    impl LoadingState for Flag {
        fn set_loading(&self, loading: bool) {
            self.0.store(loading, Ordering::SeqCst);
        }

        fn is_loading(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn flag_clears_after_the_last_run_releases() {
        let flag = Arc::new(Flag::default());
        let active = Arc::new(Mutex::new(0));
        let first = LoadingRun::start(flag.clone(), Arc::clone(&active));
        let second = LoadingRun::start(flag.clone(), Arc::clone(&active));

        first.release();
        first.release();
        assert!(flag.is_loading());
        second.release();
        assert!(!flag.is_loading());
        assert_eq!(*active.lock().unwrap(), 0);
    }

    #[test]
    fn reporter_skips_aborts_and_trailing_decode_errors() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reporter = ErrorReporter {
            callback: Some(Arc::new(move |e: &RequestError| {
                sink.lock().unwrap().push(e.name.clone())
            })),
            reported: Arc::new(AtomicBool::new(false)),
        };

        reporter.report(&RequestError::new(ErrorKind::Aborted, "aborted"));
        reporter.report(&RequestError::custom("BusinessError", "code 40001", 200));
        reporter.report(
            &RequestError::new(ErrorKind::UnknownError, "bad json").with_origin(ErrorOrigin::Decode),
        );
        reporter.report(&RequestError::new(ErrorKind::NetworkError, "down"));

        assert_eq!(*seen.lock().unwrap(), vec!["BusinessError", "NetworkError"]);
    }

    #[test]
    fn first_decode_error_is_reported() {
        let count = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&count);
        let reporter = ErrorReporter {
            callback: Some(Arc::new(move |_: &RequestError| *sink.lock().unwrap() += 1)),
            reported: Arc::new(AtomicBool::new(false)),
        };
        reporter.report(
            &RequestError::new(ErrorKind::UnknownError, "bad json").with_origin(ErrorOrigin::Decode),
        );
        assert_eq!(*count.lock().unwrap(), 1);
    }
}
