//! Error taxonomy and normalization.
//!
//! # Data Flow
//! ```text
//! stage / handler raises PipelineError
//!     → pipeline orchestrator (sole catcher)
//!     → normalizer.rs (classify, render for environment)
//!     → JSON error envelope to client
//! ```
//!
//! # Design Decisions
//! - Operational errors are expected and safe to describe
//! - Programming errors never leak their message in production
//! - The normalizer is infallible: every error becomes a response

pub mod app_error;
pub mod normalizer;

pub use app_error::{
    ceil_secs, AppError, BoxError, ErrorKind, FieldViolation, PipelineError, RATE_LIMIT_MESSAGE,
};
pub use normalizer::{ErrorBody, ErrorDetail, ErrorNormalizer, ErrorResponse, GENERIC_MESSAGE};
