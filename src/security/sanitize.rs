//! Input sanitization against operator injection and markup.
//!
//! # Responsibilities
//! - Drop mapping keys that a query language would read as operators
//!   (`$gt`, `$where`, `a.b`, `price[$ne]`)
//! - Neutralize markup delimiters in every string leaf
//! - Bound recursion depth on nested bodies
//!
//! # Design Decisions
//! - Walks query, body and route parameters in place
//! - Output never contains a literal `<` or `>`, so re-running is a no-op
//! - Containers past the depth limit are replaced with null, not rejected

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde_json::Value;

use crate::config::SanitizerConfig;
use crate::errors::PipelineError;
use crate::http::request::{ApiRequest, QueryMap, QueryValue};
use crate::observability::metrics;
use crate::pipeline::Stage;

/// Replace markup delimiters with their HTML entities.
pub fn neutralize(text: &str) -> Cow<'_, str> {
    if !text.contains(['<', '>']) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

fn neutralize_in_place(text: &mut String) {
    if let Cow::Owned(clean) = neutralize(text) {
        *text = clean;
    }
}

/// Strips operator keys and neutralizes markup in request data.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    marker: char,
    strip_dotted_keys: bool,
    max_depth: usize,
}

impl Sanitizer {
    pub fn new(config: &SanitizerConfig) -> Self {
        Self {
            marker: config.operator_marker,
            strip_dotted_keys: config.strip_dotted_keys,
            max_depth: config.max_depth,
        }
    }

    /// Whether `key` would be interpreted as an operator downstream.
    pub fn is_operator_key(&self, key: &str) -> bool {
        if key.starts_with(self.marker) {
            return true;
        }
        if self.strip_dotted_keys && key.contains('.') {
            return true;
        }
        // bracket syntax: `price[$gt]`
        key.split('[').skip(1).any(|segment| segment.starts_with(self.marker))
    }

    /// Sanitize a JSON value in place. Returns the number of keys removed.
    pub fn sanitize_value(&self, value: &mut Value) -> usize {
        let mut removed = 0;
        self.walk(value, 0, &mut removed);
        removed
    }

    fn walk(&self, value: &mut Value, depth: usize, removed: &mut usize) {
        if depth >= self.max_depth && (value.is_object() || value.is_array()) {
            tracing::warn!(max_depth = self.max_depth, "Nested input truncated");
            *value = Value::Null;
            return;
        }
        match value {
            Value::Object(map) => {
                let before = map.len();
                map.retain(|key, _| !self.is_operator_key(key));
                *removed += before - map.len();
                for child in map.values_mut() {
                    self.walk(child, depth + 1, removed);
                }
            }
            Value::Array(items) => {
                for item in items.iter_mut() {
                    self.walk(item, depth + 1, removed);
                }
            }
            Value::String(text) => neutralize_in_place(text),
            _ => {}
        }
    }

    /// Sanitize query parameters in place. Returns the number of keys removed.
    pub fn sanitize_query(&self, query: &mut QueryMap) -> usize {
        let before = query.len();
        query.retain(|key, _| !self.is_operator_key(key));
        for value in query.values_mut() {
            match value {
                QueryValue::Single(v) => neutralize_in_place(v),
                QueryValue::Many(vs) => vs.iter_mut().for_each(neutralize_in_place),
            }
        }
        before - query.len()
    }

    /// Sanitize route parameters in place. Returns the number of keys removed.
    pub fn sanitize_params(&self, params: &mut BTreeMap<String, String>) -> usize {
        let before = params.len();
        params.retain(|key, _| !self.is_operator_key(key));
        params.values_mut().for_each(neutralize_in_place);
        before - params.len()
    }

    /// Sanitize query, body and route parameters of a request.
    pub fn sanitize(&self, mut request: ApiRequest) -> ApiRequest {
        let removed = self.sanitize_query(&mut request.query)
            + self.sanitize_value(&mut request.body)
            + self.sanitize_params(&mut request.params);
        if removed > 0 {
            tracing::warn!(
                client = %request.client_key,
                path = %request.path,
                removed,
                "Stripped operator keys from request"
            );
            metrics::record_sanitized_keys(removed);
        }
        request
    }
}

impl Stage for Sanitizer {
    fn name(&self) -> &'static str {
        "sanitize"
    }

    fn apply(&self, request: ApiRequest) -> Result<ApiRequest, PipelineError> {
        Ok(self.sanitize(request))
    }
}
