//! Error types raised by pipeline stages and handlers.

use std::fmt;
use std::panic::Location;
use std::time::Duration;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::Serialize;

/// Message returned to rate-limited clients.
pub const RATE_LIMIT_MESSAGE: &str = "request limit exceeded try again later";

/// Whole seconds in `d`, rounded up.
pub fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

/// Boxed error produced by collaborators outside the pipeline.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Coarse classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// Expected, caller-correctable failure. Safe to describe to the client.
    Operational,
    /// Bug or unforeseen condition. Message is never exposed in production.
    Programming,
}

/// A classified failure with an HTTP status and client message.
#[derive(Debug, Clone)]
pub struct AppError {
    kind: ErrorKind,
    status: StatusCode,
    message: String,
    headers: HeaderMap,
    origin: &'static Location<'static>,
}

impl AppError {
    /// Create an operational error.
    #[track_caller]
    pub fn operational(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Operational,
            status,
            message: message.into(),
            headers: HeaderMap::new(),
            origin: Location::caller(),
        }
    }

    /// Create a programming error. Always maps to 500.
    #[track_caller]
    pub fn programming(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Programming,
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            headers: HeaderMap::new(),
            origin: Location::caller(),
        }
    }

    /// No registered route matched `original_url`.
    #[track_caller]
    pub fn not_found(original_url: &str) -> Self {
        Self::operational(
            StatusCode::NOT_FOUND,
            format!("That route {} was not found on server!", original_url),
        )
    }

    /// The client exhausted its request budget for the current window.
    #[track_caller]
    pub fn too_many_requests(message: impl Into<String>, retry_after: Duration) -> Self {
        let retry_secs = ceil_secs(retry_after).max(1);
        Self::operational(StatusCode::TOO_MANY_REQUESTS, message)
            .with_header(header::RETRY_AFTER, HeaderValue::from(retry_secs))
    }

    /// Request body exceeded the configured limit.
    #[track_caller]
    pub fn payload_too_large(limit: usize) -> Self {
        Self::operational(
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("Request body exceeds the limit of {} bytes", limit),
        )
    }

    /// Attach a header to the eventual error response.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Source location where the error was raised.
    pub fn origin(&self) -> &'static Location<'static> {
        self.origin
    }

    pub fn is_operational(&self) -> bool {
        self.kind == ErrorKind::Operational
    }

    /// Whether the message may be shown to clients in production.
    pub fn safe_to_expose(&self) -> bool {
        self.is_operational()
    }

    /// `"fail"` for client errors, `"error"` for everything else.
    pub fn status_label(&self) -> &'static str {
        if self.status.is_client_error() {
            "fail"
        } else {
            "error"
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for AppError {}

/// A single failed field in a schema validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Anything a stage or handler can raise.
///
/// Only [`PipelineError::App`] is already classified. Every other variant is
/// a raw source condition that the error normalizer maps to an [`AppError`].
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    App(#[from] AppError),

    /// A malformed identifier or value that could not be cast to its type.
    #[error("cast failed for value \"{value}\" at path \"{path}\"")]
    Cast { path: String, value: String },

    /// A uniqueness constraint was violated.
    #[error("duplicate key on field `{field}`: {value}")]
    Duplicate { field: String, value: String },

    #[error("validation failed: {}", join_violations(.0))]
    Validation(Vec<FieldViolation>),

    #[error("invalid token: {reason}")]
    InvalidToken { reason: String },

    #[error("jwt expired")]
    TokenExpired,

    /// Anything unforeseen.
    #[error("{source}")]
    Internal {
        source: BoxError,
        origin: &'static Location<'static>,
    },
}

impl PipelineError {
    /// Wrap an unexpected error, recording where it was raised.
    #[track_caller]
    pub fn internal(source: impl Into<BoxError>) -> Self {
        Self::Internal {
            source: source.into(),
            origin: Location::caller(),
        }
    }

    /// Variant name used in development error output.
    pub fn name(&self) -> &'static str {
        match self {
            PipelineError::App(_) => "AppError",
            PipelineError::Cast { .. } => "CastError",
            PipelineError::Duplicate { .. } => "DuplicateKeyError",
            PipelineError::Validation(_) => "ValidationError",
            PipelineError::InvalidToken { .. } => "InvalidTokenError",
            PipelineError::TokenExpired => "TokenExpiredError",
            PipelineError::Internal { .. } => "InternalError",
        }
    }

    /// Where the error was raised, when known.
    pub fn origin(&self) -> Option<&'static Location<'static>> {
        match self {
            PipelineError::App(err) => Some(err.origin()),
            PipelineError::Internal { origin, .. } => Some(*origin),
            _ => None,
        }
    }

    /// Human-readable trace: name, message, origin and the cause chain.
    pub fn trace(&self) -> String {
        let mut out = format!("{}: {}", self.name(), self);
        if let Some(origin) = self.origin() {
            out.push_str(&format!(
                "\n    at {}:{}:{}",
                origin.file(),
                origin.line(),
                origin.column()
            ));
        }
        let mut cause = std::error::Error::source(self);
        while let Some(err) = cause {
            out.push_str(&format!("\nCaused by: {}", err));
            cause = err.source();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_names_url() {
        let err = AppError::not_found("/xyz?a=1");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.message(), "That route /xyz?a=1 was not found on server!");
        assert_eq!(err.status_label(), "fail");
        assert!(err.safe_to_expose());
    }

    #[test]
    fn test_too_many_requests_sets_retry_after() {
        let err = AppError::too_many_requests(RATE_LIMIT_MESSAGE, Duration::from_millis(1500));
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.headers().get(header::RETRY_AFTER).unwrap(), "2");

        let err = AppError::too_many_requests(RATE_LIMIT_MESSAGE, Duration::ZERO);
        assert_eq!(err.headers().get(header::RETRY_AFTER).unwrap(), "1");
    }

    #[test]
    fn test_programming_is_not_exposed() {
        let err = AppError::programming("null deref");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.status_label(), "error");
        assert!(!err.safe_to_expose());
    }

    #[test]
    fn test_origin_points_at_caller() {
        let err = AppError::operational(StatusCode::BAD_REQUEST, "bad");
        assert!(err.origin().file().ends_with("app_error.rs"));
    }

    #[test]
    fn test_trace_includes_cause_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = PipelineError::internal(io);
        let trace = err.trace();
        assert!(trace.starts_with("InternalError: disk gone"));
        assert!(trace.contains("app_error.rs"));
        assert!(trace.contains("Caused by: disk gone"));
    }

    #[test]
    fn test_validation_display_joins_fields() {
        let err = PipelineError::Validation(vec![
            FieldViolation::new("name", "is required"),
            FieldViolation::new("price", "must be positive"),
        ]);
        assert_eq!(
            err.to_string(),
            "validation failed: name: is required, price: must be positive"
        );
    }
}
