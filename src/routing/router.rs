//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store registered routes and their handlers
//! - Look up the matching route for a request
//! - Raise NotFound when nothing matches
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - First registered match wins
//! - Sub-routers are flattened when mounted under a prefix

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use axum::http::Method;
use futures_util::future::BoxFuture;

use crate::errors::{AppError, PipelineError};
use crate::http::request::ApiRequest;
use crate::http::response::ApiResponse;
use crate::routing::matcher::{MethodMatcher, PathPattern};

/// Future returned by a [`Handler`].
pub type HandlerFuture = BoxFuture<'static, Result<ApiResponse, PipelineError>>;

/// The dispatch contract implemented by business handlers.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, request: ApiRequest) -> HandlerFuture;
}

impl<F, Fut> Handler for F
where
    F: Fn(ApiRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ApiResponse, PipelineError>> + Send + 'static,
{
    fn call(&self, request: ApiRequest) -> HandlerFuture {
        Box::pin(self(request))
    }
}

/// A registered route.
#[derive(Clone)]
pub struct Route {
    method: MethodMatcher,
    pattern: PathPattern,
    handler: Arc<dyn Handler>,
}

impl Route {
    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

/// A route that matched a request.
pub struct ResolvedRoute {
    pub handler: Arc<dyn Handler>,
    pub params: BTreeMap<String, String>,
}

/// Ordered route table.
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method` on `pattern`.
    pub fn route(self, method: Method, pattern: &str, handler: impl Handler) -> Self {
        self.push(MethodMatcher::new(method), pattern, handler)
    }

    /// Register `handler` for every method on `pattern`.
    pub fn any(self, pattern: &str, handler: impl Handler) -> Self {
        self.push(MethodMatcher::any(), pattern, handler)
    }

    pub fn get(self, pattern: &str, handler: impl Handler) -> Self {
        self.route(Method::GET, pattern, handler)
    }

    pub fn post(self, pattern: &str, handler: impl Handler) -> Self {
        self.route(Method::POST, pattern, handler)
    }

    pub fn patch(self, pattern: &str, handler: impl Handler) -> Self {
        self.route(Method::PATCH, pattern, handler)
    }

    pub fn delete(self, pattern: &str, handler: impl Handler) -> Self {
        self.route(Method::DELETE, pattern, handler)
    }

    fn push(mut self, method: MethodMatcher, pattern: &str, handler: impl Handler) -> Self {
        self.routes.push(Route {
            method,
            pattern: PathPattern::new(pattern),
            handler: Arc::new(handler),
        });
        self
    }

    /// Mount every route of `other` under `prefix`.
    pub fn nest(mut self, prefix: &str, other: Router) -> Self {
        self.routes.extend(other.routes.into_iter().map(|route| Route {
            pattern: route.pattern.prefixed(prefix),
            ..route
        }));
        self
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Find the handler for `request`, or raise NotFound naming its URL.
    pub fn resolve(&self, request: &ApiRequest) -> Result<ResolvedRoute, PipelineError> {
        self.routes
            .iter()
            .filter(|route| route.method.matches(&request.method))
            .find_map(|route| {
                route.pattern.captures(&request.path).map(|params| ResolvedRoute {
                    handler: route.handler.clone(),
                    params,
                })
            })
            .ok_or_else(|| {
                tracing::debug!(method = %request.method, path = %request.path, "No route matched");
                AppError::not_found(&request.original_url).into()
            })
    }

    /// Resolve and invoke the handler.
    pub async fn dispatch(&self, mut request: ApiRequest) -> Result<ApiResponse, PipelineError> {
        let resolved = self.resolve(&request)?;
        request.params = resolved.params;
        resolved.handler.call(request).await
    }
}
