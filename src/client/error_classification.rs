//! Error classification logic

use crate::error::{ErrorOrigin, RequestError};
use crate::error_kind::ErrorKind;
use crate::plugins::Plugin;
use crate::types::RequestConfig;
use crate::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Map a raw failure onto the canonical taxonomy.
///
/// `timed_out` disambiguates a cancellation: the timer sets it before it
/// aborts the controller, so a cancellation observed afterwards reads it as set.
pub(crate) fn classify(error: Error, timed_out: bool) -> RequestError {
    match error {
        Error::Request(canonical) => *canonical,
        Error::Cancelled => {
            if timed_out {
                RequestError::new(ErrorKind::Timeout, "Request timed out")
                    .with_origin(ErrorOrigin::Cancelled)
            } else {
                RequestError::new(ErrorKind::Aborted, "The request was aborted")
                    .with_origin(ErrorOrigin::Cancelled)
            }
        }
        Error::Transport(e) => {
            RequestError::new(ErrorKind::NetworkError, e.to_string()).with_origin(ErrorOrigin::Transport)
        }
        Error::Http(response) => {
            let status = response.status();
            let status_text = response.status_text().to_string();
            RequestError::new(ErrorKind::FailRequest, "Fail Request")
                .with_status(status, status_text)
                .with_response(response)
                .with_origin(ErrorOrigin::Status)
        }
        other => {
            let origin = match &other {
                Error::Plugin { .. } => ErrorOrigin::Plugin,
                Error::Decode { .. } | Error::Serialization(_) | Error::BodyUsed(_) => {
                    ErrorOrigin::Decode
                }
                Error::Configuration { .. } | Error::Header(_) => ErrorOrigin::Build,
                Error::Io(_) => ErrorOrigin::Stream,
                _ => ErrorOrigin::Other,
            };
            RequestError::new(ErrorKind::UnknownError, other.to_string()).with_origin(origin)
        }
    }
}

/// Normalizes failures for one request and threads them through `on_error` hooks.
#[derive(Clone)]
pub(crate) struct ErrorHandler {
    on_error: Vec<Arc<dyn Plugin>>,
    timed_out: Arc<AtomicBool>,
}

impl ErrorHandler {
    pub(crate) fn new(on_error: Vec<Arc<dyn Plugin>>, timed_out: Arc<AtomicBool>) -> Self {
        Self { on_error, timed_out }
    }

    pub(crate) fn timed_out(&self) -> bool {
        self.timed_out.load(Ordering::SeqCst)
    }

    /// Classify, attach `config`, then run every `on_error` hook in order.
    ///
    /// An already canonical error is returned untouched; it has been through
    /// the hooks once.
    pub(crate) async fn handle(&self, error: Error, config: &Arc<RequestConfig>) -> RequestError {
        self.handle_with_origin(error, None, config).await
    }

    /// Like [`handle`](Self::handle), overriding the origin the classifier
    /// picked. Cancellations keep their own origin.
    pub(crate) async fn handle_with_origin(
        &self,
        error: Error,
        origin: Option<ErrorOrigin>,
        config: &Arc<RequestConfig>,
    ) -> RequestError {
        if let Error::Request(canonical) = error {
            return *canonical;
        }
        let origin = if error.is_cancelled() { None } else { origin };
        let mut classified = classify(error, self.timed_out());
        if let Some(origin) = origin {
            classified.origin = origin;
        }
        if classified.config.is_none() {
            classified.config = Some(Arc::clone(config));
        }
        tracing::debug!(
            error_kind = %classified.kind,
            status = classified.status,
            origin = ?classified.origin,
            "request failed"
        );
        let mut current = classified;
        for plugin in &self.on_error {
            current = plugin.on_error(current, config).await;
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::FnPlugin;
    use crate::transport::{Response, TransportError};
    use bytes::Bytes;

    #[test]
    fn cancellation_depends_on_timeout_flag() {
        assert_eq!(classify(Error::Cancelled, false).name, "Aborted");
        let timeout = classify(Error::Cancelled, true);
        assert_eq!(timeout.name, "Timeout");
        assert_eq!(timeout.status, 408);
    }

    #[test]
    fn non_2xx_is_fail_request_with_http_status() {
        let resp = Response::from_bytes(Bytes::from_static(b"missing")).with_status(404);
        let err = classify(Error::Http(resp), false);
        assert_eq!(err.kind, ErrorKind::FailRequest);
        assert_eq!(err.name, "FailRequest");
        assert_eq!(err.message, "Fail Request");
        assert_eq!(err.status, 404);
        assert_eq!(err.status_text, "Not Found");
        assert!(err.response.is_some());
    }

    #[test]
    fn transport_failures_keep_their_message() {
        let err = classify(
            Error::Transport(TransportError::Network("connection refused".into())),
            false,
        );
        assert_eq!(err.kind, ErrorKind::NetworkError);
        assert_eq!(err.status, 599);
        assert!(err.message.contains("connection refused"));
    }

    #[test]
    fn everything_else_is_unknown() {
        let err = classify(Error::plugin("auth", "boom"), false);
        assert_eq!(err.kind, ErrorKind::UnknownError);
        assert_eq!(err.status, 601);
        assert_eq!(err.origin, ErrorOrigin::Plugin);
    }

    #[tokio::test]
    async fn on_error_hooks_run_in_order_once() {
        let first = FnPlugin::new("first")
            .with_priority(1)
            .on_error(|e, _| e.with_name("Renamed"))
            .build();
        let second = FnPlugin::new("second")
            .with_priority(2)
            .on_error(|mut e, _| {
                e.message = format!("{} (seen by second)", e.message);
                e
            })
            .build();
        let handler = ErrorHandler::new(vec![first, second], Arc::new(AtomicBool::new(false)));
        let config = Arc::new(RequestConfig::new("/x"));

        let err = handler.handle(Error::Cancelled, &config).await;
        assert_eq!(err.name, "Renamed");
        assert_eq!(err.kind, ErrorKind::Aborted);
        assert!(err.message.ends_with("(seen by second)"));

        let again = handler.handle(Error::from(err.clone()), &config).await;
        assert_eq!(again.message, err.message);
    }
}
