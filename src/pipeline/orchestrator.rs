//! Pipeline orchestration.
//!
//! Runs the stages in order, dispatches to the matched handler and funnels
//! every raised error into the [`ErrorNormalizer`]. This is the only place
//! errors are caught.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;

use crate::config::GatewayConfig;
use crate::errors::{ErrorNormalizer, PipelineError};
use crate::http::request::ApiRequest;
use crate::http::response::ApiResponse;
use crate::observability::metrics;
use crate::pipeline::stage::{JsonBodyParser, RequestStamp, Stage};
use crate::routing::Router;
use crate::security::{AdmissionController, ParameterDeduplicator, RateLimitInfo, Sanitizer};

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

/// Ordered stages in front of a router.
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
    sanitizer: Arc<Sanitizer>,
    router: Router,
    normalizer: ErrorNormalizer,
}

impl Pipeline {
    /// Assemble a pipeline from explicit parts. `sanitizer` also cleans the
    /// route parameters captured at dispatch.
    pub fn new(
        stages: Vec<Arc<dyn Stage>>,
        sanitizer: Arc<Sanitizer>,
        router: Router,
        normalizer: ErrorNormalizer,
    ) -> Self {
        Self {
            stages,
            sanitizer,
            router,
            normalizer,
        }
    }

    /// The standard chain:
    /// body parser → sanitizer → deduplicator → admission → request stamp.
    pub fn from_config(config: &GatewayConfig, router: Router) -> Self {
        let sanitizer = Arc::new(Sanitizer::new(&config.sanitizer));

        let mut stages: Vec<Arc<dyn Stage>> = vec![
            Arc::new(JsonBodyParser),
            sanitizer.clone(),
            Arc::new(ParameterDeduplicator::new(&config.parameter_pollution)),
        ];
        if config.rate_limit.enabled {
            stages.push(Arc::new(AdmissionController::new(&config.rate_limit)));
        } else {
            tracing::info!("Rate limiting disabled");
        }
        stages.push(Arc::new(RequestStamp));

        Self::new(
            stages,
            sanitizer,
            router,
            ErrorNormalizer::new(config.environment),
        )
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn normalizer(&self) -> &ErrorNormalizer {
        &self.normalizer
    }

    /// Run every stage in order, stopping at the first error.
    pub fn run_stages(&self, mut request: ApiRequest) -> Result<ApiRequest, PipelineError> {
        let request_id = request.request_id.clone();
        for stage in &self.stages {
            request = stage.apply(request).map_err(|e| {
                tracing::debug!(
                    stage = stage.name(),
                    request_id = %request_id,
                    error = %e,
                    "Stage short-circuited"
                );
                e
            })?;
        }
        Ok(request)
    }

    /// Resolve the route, clean its parameters and call the handler.
    ///
    /// A panicking handler is reported as an internal error instead of
    /// tearing down the connection.
    pub async fn dispatch(&self, mut request: ApiRequest) -> Result<ApiResponse, PipelineError> {
        let resolved = self.router.resolve(&request)?;
        request.params = resolved.params;
        self.sanitizer.sanitize_params(&mut request.params);

        let handler = resolved.handler;
        let request_id = request.request_id.clone();
        match AssertUnwindSafe(async move { handler.call(request).await })
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(request_id = %request_id, panic = %message, "Handler panicked");
                Err(PipelineError::internal(format!("handler panicked: {}", message)))
            }
        }
    }

    /// Process one request end to end. Never fails: errors become responses.
    pub async fn execute(&self, request: ApiRequest) -> Response {
        let start = Instant::now();
        let method = request.method.clone();

        let (result, rate_info) = match self.run_stages(request) {
            Ok(request) => {
                let info = request.extensions.get::<RateLimitInfo>().copied();
                (self.dispatch(request).await, info)
            }
            Err(e) => (Err(e), None),
        };

        let mut response = match result {
            Ok(response) => response.into_response(),
            Err(e) => self.normalizer.normalize(e).into_response(),
        };
        if let Some(info) = rate_info {
            info.apply_headers(response.headers_mut());
        }

        metrics::record_request(method.as_str(), response.status().as_u16(), start);
        response
    }
}
