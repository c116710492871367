//! Pull proxy error types.
//!
//! Two families of errors exist:
//!
//! - [`ProxyError`] is returned to callers of the handle API (bad input, actor
//!   gone). Connection failures never surface here.
//! - [`PullError`] describes why an upstream session failed or ended. It is
//!   handed to lifecycle callbacks and logged, never returned from `play()`.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Pull proxy error type.
///
/// Maps to stable numeric codes for management APIs:
/// - `InvalidUrl`: 1
/// - `ActorUnavailable`: 2
/// - `Config`: 3
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The URL passed to `play()` is unusable (e.g. empty).
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The proxy actor has stopped and no longer accepts commands.
    #[error("Proxy actor unavailable: {0}")]
    ActorUnavailable(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ProxyError {
    /// Returns the numeric code for this error.
    #[must_use]
    pub fn error_code(&self) -> i32 {
        match self {
            ProxyError::InvalidUrl(_) => 1,
            ProxyError::ActorUnavailable(_) => 2,
            ProxyError::Config(_) => 3,
        }
    }
}

impl From<crate::config::ConfigError> for ProxyError {
    fn from(err: crate::config::ConfigError) -> Self {
        ProxyError::Config(err.to_string())
    }
}

/// Category of an upstream failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PullErrorKind {
    /// Handshake or protocol error while connecting.
    Connect,
    /// The connect attempt did not finish in time.
    Timeout,
    /// An established session dropped.
    Shutdown,
    /// The sink asked the proxy to stop (active close).
    ClosedByRequest,
    /// Anything else (e.g. the attempt task died).
    Other,
}

impl PullErrorKind {
    /// Returns the kind as a string for logs and metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            PullErrorKind::Connect => "connect",
            PullErrorKind::Timeout => "timeout",
            PullErrorKind::Shutdown => "shutdown",
            PullErrorKind::ClosedByRequest => "closed_by_request",
            PullErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for PullErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an upstream session failed or ended.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct PullError {
    kind: PullErrorKind,
    message: String,
}

impl PullError {
    /// Create an error of the given kind.
    pub fn new(kind: PullErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Handshake/protocol failure.
    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(PullErrorKind::Connect, message)
    }

    /// Attempt timed out after `after`.
    #[must_use]
    pub fn timeout(after: Duration) -> Self {
        Self::new(
            PullErrorKind::Timeout,
            format!("connect timed out after {}ms", after.as_millis()),
        )
    }

    /// Established session dropped.
    pub fn shutdown(message: impl Into<String>) -> Self {
        Self::new(PullErrorKind::Shutdown, message)
    }

    /// Active close requested by the sink side.
    #[must_use]
    pub fn closed_by_request() -> Self {
        Self::new(PullErrorKind::ClosedByRequest, "closed by request")
    }

    /// Uncategorised failure.
    pub fn other(message: impl Into<String>) -> Self {
        Self::new(PullErrorKind::Other, message)
    }

    /// The failure category.
    #[must_use]
    pub fn kind(&self) -> PullErrorKind {
        self.kind
    }

    /// Human-readable detail.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether this error ends the session without retrying by default.
    #[must_use]
    pub fn is_active_close(&self) -> bool {
        self.kind == PullErrorKind::ClosedByRequest
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(ProxyError::InvalidUrl(String::new()).error_code(), 1);
        assert_eq!(
            ProxyError::ActorUnavailable("closed".to_string()).error_code(),
            2
        );
        assert_eq!(ProxyError::Config("bad".to_string()).error_code(), 3);
    }

    #[test]
    fn test_display_formatting() {
        assert_eq!(
            format!("{}", ProxyError::InvalidUrl("empty".to_string())),
            "Invalid URL: empty"
        );
        assert_eq!(
            format!("{}", PullError::connect("handshake refused")),
            "connect: handshake refused"
        );
        assert_eq!(
            format!("{}", PullError::closed_by_request()),
            "closed_by_request: closed by request"
        );
    }

    #[test]
    fn test_timeout_message_contains_duration() {
        let err = PullError::timeout(Duration::from_secs(10));
        assert_eq!(err.kind(), PullErrorKind::Timeout);
        assert_eq!(err.message(), "connect timed out after 10000ms");
    }

    #[test]
    fn test_active_close_detection() {
        assert!(PullError::closed_by_request().is_active_close());
        assert!(!PullError::shutdown("peer reset").is_active_close());
        assert!(!PullError::other("task died").is_active_close());
    }

    #[test]
    fn test_config_error_conversion() {
        let err: ProxyError =
            crate::config::ConfigError::InvalidValue("min > max".to_string()).into();
        assert!(matches!(err, ProxyError::Config(_)));
        assert_eq!(err.error_code(), 3);
    }
}
