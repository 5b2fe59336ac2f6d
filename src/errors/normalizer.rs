//! Converts any raised [`PipelineError`] into the client-visible response.
//!
//! # Classification
//! ```text
//! App (already classified)   → passthrough
//! Cast                       → 400 "Invalid <path>: <value>."
//! Duplicate                  → 400 "Duplicate field value: <value>. ..."
//! Validation                 → 400 "Invalid input data. <a>. <b>"
//! InvalidToken               → 401
//! TokenExpired               → 401
//! Internal                   → 500 "Something went wrong" (Programming)
//! ```
//!
//! In development every response also carries the original message, the
//! internal kind and a `stack` trace. In production Programming errors are
//! logged and replaced by the generic message.

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::config::Environment;
use crate::errors::app_error::{AppError, ErrorKind, PipelineError};
use crate::observability::metrics;

/// Message shown for every Programming error in production.
pub const GENERIC_MESSAGE: &str = "Something went wrong";

/// Internal details included only in development responses.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub name: &'static str,
    pub kind: ErrorKind,
    pub status_code: u16,
    pub is_operational: bool,
}

/// JSON error envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// A fully rendered error response.
#[derive(Debug, Clone)]
pub struct ErrorResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ErrorBody,
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.body)).into_response();
        response.headers_mut().extend(self.headers);
        response
    }
}

/// Environment-aware error normalizer.
#[derive(Debug, Clone, Copy)]
pub struct ErrorNormalizer {
    environment: Environment,
}

impl ErrorNormalizer {
    pub fn new(environment: Environment) -> Self {
        Self { environment }
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Map a raw error to its classified form.
    pub fn classify(&self, error: &PipelineError) -> AppError {
        match error {
            PipelineError::App(err) => err.clone(),
            PipelineError::Cast { path, value } => AppError::operational(
                StatusCode::BAD_REQUEST,
                format!("Invalid {}: {}.", path, value),
            ),
            PipelineError::Duplicate { value, .. } => AppError::operational(
                StatusCode::BAD_REQUEST,
                format!("Duplicate field value: {}. Please use another value!", value),
            ),
            PipelineError::Validation(violations) => {
                let messages: Vec<&str> = violations.iter().map(|v| v.message.as_str()).collect();
                AppError::operational(
                    StatusCode::BAD_REQUEST,
                    format!("Invalid input data. {}", messages.join(". ")),
                )
            }
            PipelineError::InvalidToken { .. } => AppError::operational(
                StatusCode::UNAUTHORIZED,
                "Invalid token. Please log in again!",
            ),
            PipelineError::TokenExpired => AppError::operational(
                StatusCode::UNAUTHORIZED,
                "Your token has expired! Please log in again.",
            ),
            PipelineError::Internal { .. } => AppError::programming(GENERIC_MESSAGE),
        }
    }

    /// Produce the client response for `error`. Never fails.
    pub fn normalize(&self, error: PipelineError) -> ErrorResponse {
        let classified = self.classify(&error);
        let status = classified.status();
        metrics::record_error(classified.kind(), status.as_u16());

        match classified.kind() {
            ErrorKind::Programming => {
                tracing::error!(
                    error = %error,
                    name = error.name(),
                    trace = %error.trace(),
                    "Unhandled error"
                );
            }
            ErrorKind::Operational => {
                tracing::debug!(
                    status = status.as_u16(),
                    message = classified.message(),
                    "Operational error"
                );
            }
        }

        let body = if self.environment.is_development() {
            ErrorBody {
                status: classified.status_label(),
                message: error.to_string(),
                error: Some(ErrorDetail {
                    name: error.name(),
                    kind: classified.kind(),
                    status_code: status.as_u16(),
                    is_operational: classified.is_operational(),
                }),
                stack: Some(error.trace()),
            }
        } else if classified.safe_to_expose() {
            ErrorBody {
                status: classified.status_label(),
                message: classified.message().to_string(),
                error: None,
                stack: None,
            }
        } else {
            ErrorBody {
                status: "error",
                message: GENERIC_MESSAGE.to_string(),
                error: None,
                stack: None,
            }
        };

        ErrorResponse {
            status,
            headers: classified.headers().clone(),
            body,
        }
    }
}
