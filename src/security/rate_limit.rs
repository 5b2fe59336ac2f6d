//! Fixed-window admission control.
//!
//! Each client key owns a [`RateEntry`]. The window is reset lazily on the
//! first request that arrives at least `window` after `window_start`; there
//! is no background timer. Only paths under the gated prefix are counted.
//!
//! Entries live in a sharded map. The increment-and-compare for one key runs
//! under that key's shard write lock, so concurrent requests from the same
//! client never lose an update. The map is bounded: when a new key arrives
//! and the map is full, the least recently seen keys are evicted in a batch
//! of about 1% of the bound, so one scan pays for many insertions.

use std::time::{Duration, Instant};

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::errors::{ceil_secs, AppError, PipelineError, RATE_LIMIT_MESSAGE};
use crate::http::request::ApiRequest;
use crate::observability::metrics;
use crate::pipeline::Stage;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Request count for one client in its current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateEntry {
    pub count: u32,
    pub window_start: Instant,
    last_seen: Instant,
}

impl RateEntry {
    fn new(now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
            last_seen: now,
        }
    }
}

/// Quota state reported back to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    pub reset_after: Duration,
}

impl RateLimitInfo {
    /// Write `X-RateLimit-*` headers.
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        let reset_secs = ceil_secs(self.reset_after);
        headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(self.limit));
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(self.remaining));
        headers.insert(X_RATELIMIT_RESET, HeaderValue::from(reset_secs));
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Allowed(RateLimitInfo),
    Denied {
        message: &'static str,
        retry_after: Duration,
    },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed(_))
    }
}

/// Fixed-window rate limiter gating a path prefix.
#[derive(Debug)]
pub struct AdmissionController {
    entries: DashMap<String, RateEntry>,
    window: Duration,
    capacity: u32,
    max_entries: usize,
    gated_prefix: String,
}

impl AdmissionController {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            entries: DashMap::new(),
            window: config.window(),
            capacity: config.capacity,
            max_entries: config.max_tracked_clients.max(1),
            gated_prefix: config.gated_prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Whether `path` falls under the gated prefix. Matching is per segment:
    /// `/api` gates `/api/v1` but not `/apiary`.
    pub fn is_gated(&self, path: &str) -> bool {
        if self.gated_prefix.is_empty() {
            return true;
        }
        match path.strip_prefix(self.gated_prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// Count one request from `key` at `now`.
    pub fn check(&self, key: &str, now: Instant) -> Admission {
        if !self.entries.contains_key(key) {
            self.make_room();
        }

        let (count, window_start) = {
            let mut entry = self
                .entries
                .entry(key.to_string())
                .or_insert_with(|| RateEntry::new(now));
            if now.saturating_duration_since(entry.window_start) >= self.window {
                entry.count = 0;
                entry.window_start = now;
            }
            entry.count = entry.count.saturating_add(1);
            entry.last_seen = now;
            (entry.count, entry.window_start)
        };

        let reset_after = self
            .window
            .saturating_sub(now.saturating_duration_since(window_start));

        if count > self.capacity {
            Admission::Denied {
                message: RATE_LIMIT_MESSAGE,
                retry_after: reset_after,
            }
        } else {
            Admission::Allowed(RateLimitInfo {
                limit: self.capacity,
                remaining: self.capacity - count,
                reset_after,
            })
        }
    }

    /// Number of entries dropped per eviction pass.
    fn eviction_batch(&self) -> usize {
        (self.max_entries / 100).max(1)
    }

    /// When full, evict the least recently seen entries so one more fits.
    fn make_room(&self) {
        let len = self.entries.len();
        if len < self.max_entries {
            return;
        }

        let mut by_age: Vec<(Instant, String)> = self
            .entries
            .iter()
            .map(|e| (e.value().last_seen, e.key().clone()))
            .collect();
        let evict = (len + 1 - self.max_entries)
            .max(self.eviction_batch())
            .min(by_age.len());
        if evict < by_age.len() {
            by_age.select_nth_unstable(evict);
            by_age.truncate(evict);
        }

        for (_, key) in &by_age {
            self.entries.remove(key);
        }
        tracing::debug!(evicted = by_age.len(), "Evicted least recently seen rate entries");
        metrics::record_tracked_clients(self.entries.len());
    }

    /// Snapshot of the entry for `key`.
    pub fn entry(&self, key: &str) -> Option<RateEntry> {
        self.entries.get(key).map(|e| *e.value())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

impl Stage for AdmissionController {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn apply(&self, mut request: ApiRequest) -> Result<ApiRequest, PipelineError> {
        if !self.is_gated(&request.path) {
            return Ok(request);
        }

        match self.check(&request.client_key, Instant::now()) {
            Admission::Allowed(info) => {
                request.extensions.insert(info);
                Ok(request)
            }
            Admission::Denied { message, retry_after } => {
                tracing::warn!(
                    client = %request.client_key,
                    path = %request.path,
                    request_id = %request.request_id,
                    "Rate limit exceeded"
                );
                metrics::record_rate_limited("window_exhausted");
                let info = RateLimitInfo {
                    limit: self.capacity,
                    remaining: 0,
                    reset_after: retry_after,
                };
                let mut error = AppError::too_many_requests(message, retry_after);
                let mut headers = HeaderMap::new();
                info.apply_headers(&mut headers);
                for (name, value) in headers.iter() {
                    error = error.with_header(name.clone(), value.clone());
                }
                Err(error.into())
            }
        }
    }
}
