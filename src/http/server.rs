//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router; every request lands in the pipeline fallback
//! - Wire up middleware (tracing, request ID)
//! - Bound each request by the configured timeout, answered with a JSON 408
//! - Buffer the body within the configured limit
//! - Derive the client key from the peer address
//! - Serve until the shutdown signal fires

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::errors::AppError;
use crate::http::request::ApiRequest;
use crate::http::X_REQUEST_ID;
use crate::pipeline::Pipeline;
use crate::routing::Router as RouteTable;

/// Application state injected into the handler.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub max_body_bytes: usize,
    pub request_timeout: Duration,
    pub trust_forwarded_for: bool,
}

/// HTTP server fronting the pipeline.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
}

impl HttpServer {
    /// Create a new HTTP server dispatching to `routes`.
    pub fn new(config: GatewayConfig, routes: RouteTable) -> Self {
        let state = AppState {
            pipeline: Arc::new(Pipeline::from_config(&config, routes)),
            max_body_bytes: config.limits.max_body_bytes,
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
            trust_forwarded_for: config.listener.trust_forwarded_for,
        };
        let router = Self::build_router(state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .fallback(pipeline_handler)
            .with_state(state)
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get(X_REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
    }

    /// The Axum application, for driving without a listener.
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            environment = %self.config.environment,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Client key for admission control: the peer IP, or the first
/// `X-Forwarded-For` hop when that header is trusted.
fn client_key(request: &Request<Body>, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Entry point for every request. Buffering and the pipeline together must
/// finish within the request timeout.
async fn pipeline_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let limit = state.request_timeout;
    match tokio::time::timeout(limit, handle(&state, request)).await {
        Ok(response) => response,
        Err(_) => {
            tracing::warn!(timeout_secs = limit.as_secs(), "Request timed out");
            let err = AppError::operational(StatusCode::REQUEST_TIMEOUT, "Request timed out");
            state.pipeline.normalizer().normalize(err.into()).into_response()
        }
    }
}

/// Buffer, convert, run the pipeline.
async fn handle(state: &AppState, request: Request<Body>) -> Response {
    let client = client_key(&request, state.trust_forwarded_for);

    let declared_len = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared_len.is_some_and(|len| len > state.max_body_bytes) {
        let err = AppError::payload_too_large(state.max_body_bytes);
        return state.pipeline.normalizer().normalize(err.into()).into_response();
    }

    let (parts, body) = request.into_parts();
    let raw_body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(client = %client, error = %e, "Failed to buffer request body");
            let err = AppError::payload_too_large(state.max_body_bytes);
            return state.pipeline.normalizer().normalize(err.into()).into_response();
        }
    };

    state
        .pipeline
        .execute(ApiRequest::from_parts(parts, raw_body, client))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_key_from_connect_info() {
        let mut request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let addr: SocketAddr = "192.0.2.7:5555".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        assert_eq!(client_key(&request, false), "192.0.2.7");
    }

    #[test]
    fn test_forwarded_for_only_when_trusted() {
        let mut request = Request::builder()
            .uri("/")
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        let addr: SocketAddr = "10.0.0.1:80".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        assert_eq!(client_key(&request, true), "203.0.113.9");
        assert_eq!(client_key(&request, false), "10.0.0.1");
    }

    #[test]
    fn test_client_key_unknown_without_peer() {
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        assert_eq!(client_key(&request, false), "unknown");
    }
}
