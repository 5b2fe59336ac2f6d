//! The stage contract and the small built-in stages.

use axum::body::Bytes;
use axum::http::StatusCode;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::errors::{AppError, PipelineError};
use crate::http::request::ApiRequest;

/// One step of the request pipeline.
///
/// A stage either hands back the (possibly transformed) request or raises,
/// in which case every later stage and the dispatch are skipped.
pub trait Stage: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    fn apply(&self, request: ApiRequest) -> Result<ApiRequest, PipelineError>;
}

/// Parses JSON request bodies.
///
/// Runs only when the content type is JSON and the body is non-empty; any
/// other body is left raw for the handler. A parsed body is dropped from
/// `raw_body` so only the sanitized `body` reaches handlers.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBodyParser;

impl Stage for JsonBodyParser {
    fn name(&self) -> &'static str {
        "json_body"
    }

    fn apply(&self, mut request: ApiRequest) -> Result<ApiRequest, PipelineError> {
        if request.raw_body.is_empty() || !request.is_json() {
            return Ok(request);
        }
        request.body = serde_json::from_slice::<Value>(&request.raw_body).map_err(|e| {
            AppError::operational(StatusCode::BAD_REQUEST, format!("Invalid JSON body: {}", e))
        })?;
        request.raw_body = Bytes::new();
        Ok(request)
    }
}

/// Time the request entered the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTime(pub DateTime<Utc>);

impl RequestTime {
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// Attaches a [`RequestTime`] to every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestStamp;

impl Stage for RequestStamp {
    fn name(&self) -> &'static str {
        "request_time"
    }

    fn apply(&self, mut request: ApiRequest) -> Result<ApiRequest, PipelineError> {
        request.extensions.insert(RequestTime(Utc::now()));
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Method, Uri};
    use serde_json::json;

    fn post(raw: &'static str) -> ApiRequest {
        let uri: Uri = "/api/v1/tours".parse().unwrap();
        ApiRequest::new(Method::POST, &uri).with_raw_json(raw)
    }

    #[test]
    fn test_parses_json_body() {
        let request = JsonBodyParser.apply(post(r#"{"name":"Hiker","price":397}"#)).unwrap();
        assert_eq!(request.body, json!({"name": "Hiker", "price": 397}));
        assert!(request.raw_body.is_empty());
    }

    #[test]
    fn test_malformed_json_is_bad_request() {
        let err = JsonBodyParser.apply(post(r#"{"name":"#)).unwrap_err();
        match err {
            PipelineError::App(app) => {
                assert_eq!(app.status(), StatusCode::BAD_REQUEST);
                assert!(app.message().starts_with("Invalid JSON body"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_non_json_body_left_raw() {
        let uri: Uri = "/upload".parse().unwrap();
        let mut request = ApiRequest::new(Method::POST, &uri);
        request.raw_body = "not json".into();
        let request = JsonBodyParser.apply(request).unwrap();
        assert_eq!(request.body, Value::Null);
        assert_eq!(&request.raw_body[..], b"not json");
    }

    #[test]
    fn test_request_stamp() {
        let uri: Uri = "/".parse().unwrap();
        let request = RequestStamp.apply(ApiRequest::new(Method::GET, &uri)).unwrap();
        let stamp = request.extensions.get::<RequestTime>().unwrap();
        assert!(stamp.to_rfc3339().ends_with('Z'));
    }
}
