//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, timeout)
//!     → request.rs (ApiRequest: query parsing, raw body, client key)
//!     → [pipeline stages and routing]
//!     → response.rs (handler result) or errors::normalizer (failure)
//!     → Send to client
//! ```

use axum::http::HeaderName;

pub mod request;
pub mod response;
pub mod server;

pub use request::{parse_query, ApiRequest, QueryMap, QueryValue};
pub use response::ApiResponse;
pub use server::HttpServer;

/// Header carrying the per-request correlation ID.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
