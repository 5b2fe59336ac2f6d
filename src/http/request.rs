//! Request model carried through the pipeline.
//!
//! # Responsibilities
//! - Capture method, path, original URL, headers and client key
//! - Parse the raw query string into a possibly multi-valued mapping
//! - Hold the raw body until the body parser stage turns it into JSON
//! - Carry typed per-request attachments (rate-limit info, timestamps)
//!
//! # Design Decisions
//! - Plain owned data: stages take the request by value and hand it back
//! - Repeated query names are kept as `Many` until deduplication resolves them
//! - The original URL is captured before any stage runs, for error messages

use std::collections::BTreeMap;

use axum::body::Bytes;
use axum::http::{header, request::Parts, Extensions, HeaderMap, HeaderName, HeaderValue, Method, Uri};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::http::X_REQUEST_ID;

/// One query parameter's value(s).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum QueryValue {
    Single(String),
    Many(Vec<String>),
}

impl QueryValue {
    /// The last supplied value.
    pub fn last(&self) -> Option<&str> {
        match self {
            QueryValue::Single(v) => Some(v),
            QueryValue::Many(vs) => vs.last().map(String::as_str),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            QueryValue::Single(_) => 1,
            QueryValue::Many(vs) => vs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&mut self, value: String) {
        match self {
            QueryValue::Single(first) => {
                let first = std::mem::take(first);
                *self = QueryValue::Many(vec![first, value]);
            }
            QueryValue::Many(vs) => vs.push(value),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(v: &str) -> Self {
        QueryValue::Single(v.to_string())
    }
}

/// Query parameters keyed by name.
pub type QueryMap = BTreeMap<String, QueryValue>;

/// Parse a raw (still percent-encoded) query string.
///
/// Names that appear more than once collect their values in order.
pub fn parse_query(raw: &str) -> QueryMap {
    let mut query = QueryMap::new();
    for (name, value) in url::form_urlencoded::parse(raw.as_bytes()) {
        match query.get_mut(name.as_ref()) {
            Some(existing) => existing.push(value.into_owned()),
            None => {
                query.insert(name.into_owned(), QueryValue::Single(value.into_owned()));
            }
        }
    }
    query
}

/// A request as seen by pipeline stages and handlers.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    /// Path plus raw query exactly as received.
    pub original_url: String,
    pub headers: HeaderMap,
    pub query: QueryMap,
    /// Route parameters, filled in when a route matches.
    pub params: BTreeMap<String, String>,
    /// Parsed JSON body. `Null` until the body parser runs or when empty.
    pub body: Value,
    /// Body bytes as received. Emptied once the body parser has produced `body`.
    pub raw_body: Bytes,
    /// Identifies the client for admission control (source address).
    pub client_key: String,
    /// Correlation ID, taken from `X-Request-Id` when present.
    pub request_id: String,
    pub extensions: Extensions,
}

impl ApiRequest {
    /// Create a request for `uri` with no headers and an empty body.
    pub fn new(method: Method, uri: &Uri) -> Self {
        let original_url = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| uri.path().to_string());
        Self {
            method,
            path: uri.path().to_string(),
            original_url,
            headers: HeaderMap::new(),
            query: uri.query().map(parse_query).unwrap_or_default(),
            params: BTreeMap::new(),
            body: Value::Null,
            raw_body: Bytes::new(),
            client_key: "unknown".to_string(),
            request_id: Uuid::new_v4().to_string(),
            extensions: Extensions::new(),
        }
    }

    /// Build from HTTP request parts and the buffered body.
    pub fn from_parts(parts: Parts, raw_body: Bytes, client_key: String) -> Self {
        let mut request = Self::new(parts.method, &parts.uri);
        if let Some(id) = parts
            .headers
            .get(&X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
        {
            request.request_id = id.to_string();
        }
        request.headers = parts.headers;
        request.extensions = parts.extensions;
        request.raw_body = raw_body;
        request.client_key = client_key;
        request
    }

    pub fn with_client_key(mut self, key: impl Into<String>) -> Self {
        self.client_key = key.into();
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set a JSON body, as the body parser would.
    pub fn with_json(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// Set the raw body and mark it as JSON.
    pub fn with_raw_json(mut self, raw: impl Into<Bytes>) -> Self {
        self.raw_body = raw.into();
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self
    }

    /// Whether the declared content type is JSON (`application/json` or `+json`).
    pub fn is_json(&self) -> bool {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|mime| {
                let mime = mime.trim().to_ascii_lowercase();
                mime == "application/json" || mime.ends_with("+json")
            })
            .unwrap_or(false)
    }

    /// Cookies from the `Cookie` header(s). Later duplicates win.
    pub fn cookies(&self) -> BTreeMap<String, String> {
        self.headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| {
                let (name, value) = pair.split_once('=')?;
                let name = name.trim();
                if name.is_empty() {
                    return None;
                }
                let value = value.trim().trim_matches('"');
                Some((name.to_string(), value.to_string()))
            })
            .collect()
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookies().remove(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_collects_repeats() {
        let query = parse_query("a=1&b=x&a=2&a=3");
        assert_eq!(
            query.get("a"),
            Some(&QueryValue::Many(vec!["1".into(), "2".into(), "3".into()]))
        );
        assert_eq!(query.get("b"), Some(&QueryValue::Single("x".into())));
    }

    #[test]
    fn test_parse_query_decodes() {
        let query = parse_query("name=The%20Forest+Hiker&sort%5B%24gt%5D=1");
        assert_eq!(query.get("name").and_then(|v| v.last()), Some("The Forest Hiker"));
        assert!(query.contains_key("sort[$gt]"));
    }

    #[test]
    fn test_new_keeps_original_url() {
        let uri: Uri = "/api/v1/tours?price=1&price=2".parse().unwrap();
        let request = ApiRequest::new(Method::GET, &uri);
        assert_eq!(request.path, "/api/v1/tours");
        assert_eq!(request.original_url, "/api/v1/tours?price=1&price=2");
        assert_eq!(request.query.get("price").map(QueryValue::len), Some(2));
    }

    #[test]
    fn test_request_id_from_header() {
        let (parts, ()) = axum::http::Request::builder()
            .uri("/api/v1/tours")
            .header("x-request-id", "abc-123")
            .body(())
            .unwrap()
            .into_parts();
        let request = ApiRequest::from_parts(parts, Bytes::new(), "192.0.2.1".into());
        assert_eq!(request.request_id, "abc-123");

        let uri: Uri = "/".parse().unwrap();
        let generated = ApiRequest::new(Method::GET, &uri);
        assert!(Uuid::parse_str(&generated.request_id).is_ok());
    }

    #[test]
    fn test_is_json() {
        let uri: Uri = "/".parse().unwrap();
        let request = ApiRequest::new(Method::POST, &uri).with_header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        assert!(request.is_json());

        let request = ApiRequest::new(Method::POST, &uri).with_header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain"),
        );
        assert!(!request.is_json());
    }

    #[test]
    fn test_cookies() {
        let uri: Uri = "/".parse().unwrap();
        let request = ApiRequest::new(Method::GET, &uri).with_header(
            header::COOKIE,
            HeaderValue::from_static("jwt=abc.def; theme=\"dark\"; =skip"),
        );
        assert_eq!(request.cookie("jwt").as_deref(), Some("abc.def"));
        assert_eq!(request.cookie("theme").as_deref(), Some("dark"));
        assert_eq!(request.cookies().len(), 2);
    }
}
