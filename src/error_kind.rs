//! Canonical failure kinds produced by the error normalizer.
//!
//! Every failure that reaches a caller is one of five kinds. Kinds that do not
//! correspond to an HTTP response carry a reserved status sentinel so callers
//! can branch on `status` regardless of where the failure came from.
//!
//! | Kind           | Status        | Produced when                                   |
//! |----------------|---------------|-------------------------------------------------|
//! | `Timeout`      | 408           | the configured timeout fired and aborted        |
//! | `Aborted`      | 499           | the request was cancelled by the caller         |
//! | `NetworkError` | 599           | the transport failed before a response arrived  |
//! | `FailRequest`  | HTTP status   | a response arrived with a non-2xx status        |
//! | `UnknownError` | 601           | anything else (plugin failures, decode errors)  |
//!
//! ## Example
//!
//! ```rust
//! use plugfetch::ErrorKind;
//!
//! assert_eq!(ErrorKind::Timeout.name(), "Timeout");
//! assert_eq!(ErrorKind::Aborted.sentinel_status(), Some(499));
//! assert!(ErrorKind::NetworkError.retryable());
//! ```

use std::fmt;

/// Reserved status for [`ErrorKind::Timeout`].
pub const TIMEOUT_STATUS: u16 = 408;
/// Reserved status for [`ErrorKind::Aborted`].
pub const ABORTED_STATUS: u16 = 499;
/// Reserved status for [`ErrorKind::NetworkError`].
pub const NETWORK_ERROR_STATUS: u16 = 599;
/// Reserved status for [`ErrorKind::UnknownError`].
pub const UNKNOWN_ERROR_STATUS: u16 = 601;

/// Classified failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The timeout timer fired before the transport settled.
    Timeout,
    /// The request was aborted through its controller.
    Aborted,
    /// Transport-level failure prior to receiving any response.
    NetworkError,
    /// A response was received but its status is outside 200-299.
    FailRequest,
    /// The failure could not be classified.
    UnknownError,
}

impl ErrorKind {
    /// Default error name, also used as `RequestError::name` until a plugin renames it.
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Timeout => "Timeout",
            Self::Aborted => "Aborted",
            Self::NetworkError => "NetworkError",
            Self::FailRequest => "FailRequest",
            Self::UnknownError => "UnknownError",
        }
    }

    /// Reserved status for kinds that have no HTTP status of their own.
    #[inline]
    pub fn sentinel_status(&self) -> Option<u16> {
        match self {
            Self::Timeout => Some(TIMEOUT_STATUS),
            Self::Aborted => Some(ABORTED_STATUS),
            Self::NetworkError => Some(NETWORK_ERROR_STATUS),
            Self::UnknownError => Some(UNKNOWN_ERROR_STATUS),
            Self::FailRequest => None,
        }
    }

    /// Whether a caller-driven `.retry()` is generally worth attempting.
    ///
    /// The core never retries on its own; this is a hint for retry layers built on top.
    #[inline]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::NetworkError)
    }

    /// Parse a kind from its name (as produced by [`ErrorKind::name`]).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Timeout" => Some(Self::Timeout),
            "Aborted" => Some(Self::Aborted),
            "NetworkError" => Some(Self::NetworkError),
            "FailRequest" => Some(Self::FailRequest),
            "UnknownError" => Some(Self::UnknownError),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_roundtrip() {
        for kind in [
            ErrorKind::Timeout,
            ErrorKind::Aborted,
            ErrorKind::NetworkError,
            ErrorKind::FailRequest,
            ErrorKind::UnknownError,
        ] {
            assert_eq!(ErrorKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ErrorKind::from_name("SyntaxError"), None);
    }

    #[test]
    fn fail_request_has_no_sentinel() {
        assert_eq!(ErrorKind::FailRequest.sentinel_status(), None);
        assert_eq!(ErrorKind::UnknownError.sentinel_status(), Some(601));
        assert!(!ErrorKind::Aborted.retryable());
    }
}
