//! Built-in route table served by the binary.
//!
//! Small handlers that report what the pipeline handed them, useful for
//! smoke-testing a deployment.

use axum::http::StatusCode;
use serde_json::{json, Value};

use crate::errors::{AppError, PipelineError};
use crate::http::{ApiRequest, ApiResponse};
use crate::pipeline::RequestTime;
use crate::routing::Router;
use crate::security::RateLimitInfo;

fn request_time(request: &ApiRequest) -> Value {
    request
        .extensions
        .get::<RequestTime>()
        .map(|t| Value::String(t.to_rfc3339()))
        .unwrap_or(Value::Null)
}

async fn status(request: ApiRequest) -> Result<ApiResponse, PipelineError> {
    let remaining = request
        .extensions
        .get::<RateLimitInfo>()
        .map(|info| info.remaining);
    Ok(ApiResponse::ok(json!({
        "status": "success",
        "requestTime": request_time(&request),
        "remaining": remaining,
    })))
}

async fn echo(request: ApiRequest) -> Result<ApiResponse, PipelineError> {
    Ok(ApiResponse::ok(json!({
        "status": "success",
        "requestTime": request_time(&request),
        "data": {
            "method": request.method.as_str(),
            "query": request.query,
            "params": request.params,
            "body": request.body,
        },
    })))
}

async fn create(request: ApiRequest) -> Result<ApiResponse, PipelineError> {
    if !request.body.is_object() {
        return Err(
            AppError::operational(StatusCode::BAD_REQUEST, "Request body must be a JSON object")
                .into(),
        );
    }
    Ok(ApiResponse::created(json!({
        "status": "success",
        "data": request.body,
    })))
}

/// The routes mounted under `/api/v1`.
pub fn routes() -> Router {
    let v1 = Router::new()
        .get("/status", status)
        .get("/echo", echo)
        .post("/echo", create)
        .get("/echo/:id", echo);
    Router::new().nest("/api/v1", v1)
}
