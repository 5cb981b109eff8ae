//! 请求执行逻辑：单次请求从插件预处理到传输完成的工作流。
//!
//! Request workflow (single attempt): before_request hooks, short-circuit or
//! transport dispatch, either one raced against abort and timeout, status check.

use crate::client::error_classification::ErrorHandler;
use crate::error::{ErrorOrigin, RequestError};
use crate::plugins::Composition;
use crate::transport::{AbortController, Credentials, Response, Transport, TransportRequest};
use crate::types::{RequestConfig, Resolved};
use crate::utils::{build_body, build_url};
use crate::Error;
use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Terminal state of a workflow, shared by every consumer of one request.
#[derive(Debug, Clone)]
pub(crate) struct Settlement {
    /// Configuration as left by the last before_request hook.
    pub(crate) config: Arc<RequestConfig>,
    pub(crate) result: std::result::Result<Response, RequestError>,
}

/// Everything one workflow run owns.
pub(crate) struct Execution {
    pub(crate) id: Uuid,
    pub(crate) config: RequestConfig,
    pub(crate) composition: Arc<Composition>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) controller: AbortController,
    pub(crate) timed_out: Arc<AtomicBool>,
    pub(crate) errors: ErrorHandler,
}

type Failure = (Error, Option<ErrorOrigin>);

pub(crate) async fn run(exec: Execution) -> Settlement {
    let Execution {
        id,
        config,
        composition,
        transport,
        controller,
        timed_out,
        errors,
    } = exec;
    let start = Instant::now();

    let config = match run_before_request(&composition, config).await {
        Ok(config) => Arc::new(config),
        Err((last_config, e)) => {
            let config = Arc::new(last_config);
            let err = errors
                .handle_with_origin(e, Some(ErrorOrigin::Plugin), &config)
                .await;
            warn!(
                request_id = %id,
                error_kind = %err.kind,
                "before_request hook failed"
            );
            return Settlement {
                config,
                result: Err(err),
            };
        }
    };

    let work: BoxFuture<'_, std::result::Result<Response, Failure>> = match &config.resolve {
        Some(resolver) => {
            debug!(request_id = %id, url = %config.url, "request short-circuited by plugin");
            resolver
                .resolve()
                .map(|r| {
                    r.map(Resolved::into_response)
                        .map_err(|e| (e, Some(ErrorOrigin::Resolver)))
                })
                .boxed()
        }
        None => dispatch(&config, transport.as_ref(), &controller).boxed(),
    };
    let outcome = race(work, &controller, &timed_out, config.effective_timeout()).await;

    let outcome = outcome.and_then(|response| {
        if response.ok() {
            Ok(response)
        } else {
            Err((Error::Http(response), None))
        }
    });

    let duration_ms = start.elapsed().as_millis();
    match outcome {
        Ok(response) => {
            info!(
                request_id = %id,
                method = %config.method,
                url = %config.url,
                http_status = response.status(),
                duration_ms = duration_ms,
                "request settled"
            );
            Settlement {
                config,
                result: Ok(response),
            }
        }
        Err((e, origin)) => {
            let err = errors.handle_with_origin(e, origin, &config).await;
            warn!(
                request_id = %id,
                method = %config.method,
                url = %config.url,
                http_status = err.status,
                error_kind = %err.kind,
                duration_ms = duration_ms,
                "request failed"
            );
            Settlement {
                config,
                result: Err(err),
            }
        }
    }
}

/// Run before_request hooks in order. Stops as soon as a resolver is set.
/// On failure hands back the configuration the failing hook received.
async fn run_before_request(
    composition: &Composition,
    mut config: RequestConfig,
) -> std::result::Result<RequestConfig, (RequestConfig, Error)> {
    for plugin in &composition.before_request {
        if config.resolve.is_some() {
            break;
        }
        let last = config.clone();
        config = match plugin.before_request(config).await {
            Ok(next) => next,
            Err(e) => {
                debug!(plugin = plugin.name(), error = %e, "before_request hook failed");
                return Err((last, e));
            }
        };
    }
    Ok(config)
}

async fn dispatch(
    config: &RequestConfig,
    transport: &dyn Transport,
    controller: &AbortController,
) -> std::result::Result<Response, Failure> {
    let build = |e: Error| (e, Some(ErrorOrigin::Build));
    let url = build_url(
        &config.base_url,
        &config.url,
        config.params.as_ref(),
        &config.query_options,
    )
    .map_err(build)?;
    let mut headers = config.headers.clone();
    let body = build_body(
        config.data.as_ref(),
        config.method,
        &mut headers,
        &config.query_options,
    )
    .map_err(build)?;

    let request = TransportRequest {
        url,
        method: config.method,
        headers,
        body,
        credentials: if config.with_credentials {
            Credentials::Include
        } else {
            Credentials::SameOrigin
        },
        signal: controller.signal(),
    };
    debug!(method = %request.method, url = %request.url, "dispatching request");
    transport.fetch(request).await.map_err(|e| (e, None))
}

/// Race a resolver or transport call against the abort signal and the timeout.
/// The timer sets `timed_out` before it aborts the controller.
async fn race<F>(
    work: F,
    controller: &AbortController,
    timed_out: &AtomicBool,
    timeout: Option<Duration>,
) -> std::result::Result<Response, Failure>
where
    F: Future<Output = std::result::Result<Response, Failure>>,
{
    let signal = controller.signal();
    tokio::select! {
        biased;
        _ = signal.cancelled() => Err((Error::Cancelled, None)),
        r = work => r,
        _ = sleep_or_never(timeout) => {
            timed_out.store(true, Ordering::SeqCst);
            controller.abort();
            Err((Error::Cancelled, None))
        }
    }
}

async fn sleep_or_never(timeout: Option<Duration>) {
    match timeout {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending::<()>().await,
    }
}
