//! Request pipeline.
//!
//! # Data Flow
//! ```text
//! ApiRequest
//!     → json_body      (parse JSON body)
//!     → sanitize       (operator keys, markup)
//!     → dedupe_params  (parameter pollution)
//!     → rate_limit     (only under the gated prefix)
//!     → request_time   (timestamp)
//!     → router dispatch (params sanitized, handler called)
//!     → ApiResponse
//!
//! any stage or handler raises
//!     → ErrorNormalizer → JSON error envelope
//! ```

pub mod orchestrator;
pub mod stage;

pub use orchestrator::Pipeline;
pub use stage::{JsonBodyParser, RequestStamp, RequestTime, Stage};
