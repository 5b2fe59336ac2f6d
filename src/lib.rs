//! HTTP request pipeline library.
//!
//! Every request passes through a fixed chain of stages (body parsing,
//! sanitization, parameter deduplication, admission control, timestamp)
//! before the route table dispatches it. Failures anywhere are turned
//! into a uniform JSON envelope by the error normalizer.

pub mod config;
pub mod demo;
pub mod errors;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod routing;
pub mod security;

pub use config::GatewayConfig;
pub use errors::{AppError, PipelineError};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use pipeline::Pipeline;
pub use routing::Router;
