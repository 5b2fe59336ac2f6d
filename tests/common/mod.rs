//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use gateway_pipeline::config::{Environment, GatewayConfig};
use gateway_pipeline::http::{ApiRequest, ApiResponse, HttpServer};
use gateway_pipeline::routing::Router;
use gateway_pipeline::PipelineError;

/// A collected response.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Config with a small admission capacity so tests can exhaust it.
pub fn test_config(environment: Environment, capacity: u32) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.environment = environment;
    config.rate_limit.capacity = capacity;
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config
}

async fn echo(request: ApiRequest) -> Result<ApiResponse, PipelineError> {
    Ok(ApiResponse::ok(json!({
        "query": request.query,
        "params": request.params,
        "body": request.body,
        "raw": String::from_utf8_lossy(&request.raw_body),
    })))
}

async fn explode(_request: ApiRequest) -> Result<ApiResponse, PipelineError> {
    Err(PipelineError::internal("database handle missing"))
}

async fn cast(_request: ApiRequest) -> Result<ApiResponse, PipelineError> {
    Err(PipelineError::Cast {
        path: "_id".to_string(),
        value: "wwwww".to_string(),
    })
}

async fn slow(_request: ApiRequest) -> Result<ApiResponse, PipelineError> {
    tokio::time::sleep(std::time::Duration::from_secs(3)).await;
    Ok(ApiResponse::no_content())
}

/// Routes used by the integration tests.
pub fn test_routes() -> Router {
    let api = Router::new()
        .get("/tours", echo)
        .post("/tours", echo)
        .get("/tours/:id", echo)
        .get("/boom", explode)
        .get("/slow", slow)
        .get("/cast", cast);
    Router::new()
        .nest("/api/v1", api)
        .get("/health", echo)
}

pub fn server(config: GatewayConfig) -> HttpServer {
    HttpServer::new(config, test_routes())
}

/// Build a request as if it arrived from `peer`.
pub fn request(method: Method, uri: &str, peer: &str, body: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }
    let mut request = builder
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap();
    let addr: SocketAddr = peer.parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

/// Drive one request through the app without a listener.
pub async fn send(server: &HttpServer, request: Request<Body>) -> TestResponse {
    let response = server.app().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    TestResponse {
        status,
        headers,
        body,
    }
}

pub async fn get(server: &HttpServer, uri: &str) -> TestResponse {
    send(server, request(Method::GET, uri, "198.51.100.1:40000", None)).await
}
