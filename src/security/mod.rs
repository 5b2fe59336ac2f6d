//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → sanitize.rs (strip operator keys, neutralize markup)
//!     → pollution.rs (collapse repeated query parameters)
//!     → rate_limit.rs (fixed-window admission under the gated prefix)
//!     → Pass to routing
//! ```
//!
//! # Design Decisions
//! - Defense in depth: multiple layers of protection
//! - Fail closed: a denied admission is an error, never a silent pass
//! - No trust in client input

pub mod pollution;
pub mod rate_limit;
pub mod sanitize;

pub use pollution::ParameterDeduplicator;
pub use rate_limit::{Admission, AdmissionController, RateEntry, RateLimitInfo};
pub use sanitize::{neutralize, Sanitizer};
