use crate::error_kind::ErrorKind;
use crate::transport::{Response, TransportError};
use crate::types::RequestConfig;
use std::sync::Arc;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "config.base_url", "data.file")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "body_builder", "cache_plugin")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Raw failure raised anywhere inside the request workflow, a plugin hook or a
/// response decoder. The error normalizer turns every one of these into a
/// [`RequestError`] before a caller sees it.
#[derive(Debug, Error)]
pub enum Error {
    /// Already canonical; passes through the normalizer untouched.
    #[error("{0}")]
    Request(Box<RequestError>),

    #[error("The operation was aborted")]
    Cancelled,

    #[error("Network transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("HTTP {} {}", .0.status(), .0.status_text())]
    Http(Response),

    #[error("Body already consumed: {0}")]
    BodyUsed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid header: {0}")]
    Header(String),

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Plugin error ({plugin}): {message}")]
    Plugin { plugin: String, message: String },

    #[error("Decode error: {message}{}", format_context(.context))]
    Decode {
        message: String,
        context: ErrorContext,
    },

    #[error("Unknown error: {message}{}", format_context(.context))]
    Unknown {
        message: String,
        context: ErrorContext,
    },
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Create a new decode error with structured context
    pub fn decode_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Decode {
            message: msg.into(),
            context,
        }
    }

    /// Create a new unknown error with structured context
    pub fn unknown_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Unknown {
            message: msg.into(),
            context,
        }
    }

    /// Create a plugin failure attributed to `plugin`.
    pub fn plugin(plugin: impl Into<String>, msg: impl Into<String>) -> Self {
        Error::Plugin {
            plugin: plugin.into(),
            message: msg.into(),
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. }
            | Error::Decode { context, .. }
            | Error::Unknown { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Whether this failure is a cancellation signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

impl From<RequestError> for Error {
    fn from(e: RequestError) -> Self {
        Error::Request(Box::new(e))
    }
}

/// Where a canonical error was raised. Informational; classification does not depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorOrigin {
    /// Transport call failed before any response.
    Transport,
    /// Transport returned a non-2xx response.
    Status,
    /// Abort signal or timeout.
    Cancelled,
    /// A plugin hook failed.
    Plugin,
    /// The response body could not be decoded.
    Decode,
    /// A short-circuit resolver failed.
    Resolver,
    /// URL or body could not be built from the configuration.
    Build,
    /// The body stream failed while being read.
    Stream,
    /// Anything else, including errors constructed by plugins.
    Other,
}

/// The canonical failure shape every caller sees.
///
/// `name` and `message` may be rewritten by `on_error` plugins; `kind` always
/// records how the normalizer classified the failure.
#[derive(Debug, Clone, Error)]
#[error("{name}: {message}")]
pub struct RequestError {
    pub kind: ErrorKind,
    pub name: String,
    pub message: String,
    pub status: u16,
    pub status_text: String,
    pub response: Option<Response>,
    pub config: Option<Arc<RequestConfig>>,
    pub origin: ErrorOrigin,
}

impl RequestError {
    /// Create an error of `kind` with the kind's default name and status.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            name: kind.name().to_string(),
            message: message.into(),
            status: kind.sentinel_status().unwrap_or(0),
            status_text: String::new(),
            response: None,
            config: None,
            origin: ErrorOrigin::Other,
        }
    }

    /// Create a custom-named error, typically from a plugin translating a business failure.
    pub fn custom(name: impl Into<String>, message: impl Into<String>, status: u16) -> Self {
        Self {
            name: name.into(),
            status,
            ..Self::new(ErrorKind::UnknownError, message)
        }
    }

    pub fn with_status(mut self, status: u16, status_text: impl Into<String>) -> Self {
        self.status = status;
        self.status_text = status_text.into();
        self
    }

    pub fn with_response(mut self, response: Response) -> Self {
        self.response = Some(response);
        self
    }

    pub fn with_config(mut self, config: Arc<RequestConfig>) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_origin(mut self, origin: ErrorOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == ErrorKind::Timeout
    }

    pub fn is_aborted(&self) -> bool {
        self.kind == ErrorKind::Aborted
    }
}
