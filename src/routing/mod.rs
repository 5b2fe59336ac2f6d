//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Sanitized, admitted ApiRequest (method, path)
//!     → router.rs (route lookup, first match wins)
//!     → matcher.rs (evaluate method and path pattern)
//!     → Return: handler + captured params, or NotFound
//! ```
//!
//! # Design Decisions
//! - Routes registered at startup, immutable at runtime
//! - No regex in hot path
//! - Deterministic: same input always matches same route
//! - Handlers are opaque: anything implementing `Handler`

pub mod matcher;
pub mod router;

pub use matcher::{MethodMatcher, PathPattern};
pub use router::{Handler, HandlerFuture, ResolvedRoute, Route, Router};
