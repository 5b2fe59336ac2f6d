//! Route matching logic.
//!
//! # Responsibilities
//! - Match request paths against patterns (`/tours/:id`, `/files/*`)
//! - Capture named path parameters (percent-decoded)
//! - Match request methods (HEAD is served by GET routes)
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - A single trailing slash is ignored
//! - No regex to guarantee O(n) matching

use std::collections::BTreeMap;
use std::fmt;

use axum::http::Method;
use percent_encoding::percent_decode_str;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    /// Matches the remaining path, including nothing.
    Rest,
}

/// A compiled path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.trim_matches('/').split('/').filter(|s| !s.is_empty())
}

impl PathPattern {
    pub fn new(pattern: &str) -> Self {
        let segments = split(pattern)
            .map(|s| {
                if s == "*" {
                    Segment::Rest
                } else if let Some(name) = s.strip_prefix(':') {
                    Segment::Param(name.to_string())
                } else {
                    Segment::Literal(s.to_string())
                }
            })
            .collect();
        Self {
            raw: pattern.to_string(),
            segments,
        }
    }

    /// Prepend `prefix` to this pattern, as when mounting a sub-router.
    pub fn prefixed(&self, prefix: &str) -> Self {
        let parts: Vec<&str> = [prefix.trim_matches('/'), self.raw.trim_matches('/')]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect();
        Self::new(&format!("/{}", parts.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Match `path`, returning captured parameters on success.
    pub fn captures(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let mut params = BTreeMap::new();
        let mut parts = split(path);
        for segment in &self.segments {
            match segment {
                Segment::Rest => return Some(params),
                Segment::Literal(expected) => {
                    if parts.next()? != expected.as_str() {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let raw = parts.next()?;
                    let value = percent_decode_str(raw).decode_utf8_lossy().into_owned();
                    params.insert(name.clone(), value);
                }
            }
        }
        match parts.next() {
            Some(_) => None,
            None => Some(params),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        self.captures(path).is_some()
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Matches the request method. `None` accepts every method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodMatcher {
    method: Option<Method>,
}

impl MethodMatcher {
    pub fn new(method: Method) -> Self {
        Self {
            method: Some(method),
        }
    }

    pub fn any() -> Self {
        Self { method: None }
    }

    pub fn matches(&self, method: &Method) -> bool {
        match &self.method {
            None => true,
            Some(expected) => {
                expected == method || (*expected == Method::GET && *method == Method::HEAD)
            }
        }
    }
}
