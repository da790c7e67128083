//! Rate limit tracking from provider response headers.
//!
//! Providers spell the headers differently (`X-RateLimit-*` at Hubspot and
//! GitHub, `x-rate-limit-*` at Twitter). Both families are recognised. The
//! reset value is either a Unix timestamp or, for small values, a number of
//! seconds from now.

use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::HeaderMap;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::warn;

const LIMIT_HEADERS: [&str; 2] = ["x-ratelimit-limit", "x-rate-limit-limit"];
const REMAINING_HEADERS: [&str; 2] = ["x-ratelimit-remaining", "x-rate-limit-remaining"];
const RESET_HEADERS: [&str; 2] = ["x-ratelimit-reset", "x-rate-limit-reset"];
const RESOURCE_HEADER: &str = "x-ratelimit-resource";

/// Reset values below this are relative seconds rather than timestamps.
const RELATIVE_RESET_THRESHOLD: i64 = 1_000_000_000;

/// Default resource name when a provider does not report one.
pub const DEFAULT_RESOURCE: &str = "default";

/// Rate limit state reported by a provider.
///
/// # Examples
///
/// ```
/// use hookbridge_sdk::client::RateLimit;
/// use chrono::{Utc, Duration};
///
/// let rate_limit = RateLimit::new(900, 12, Utc::now() + Duration::minutes(15), "default");
///
/// assert!(!rate_limit.is_exhausted());
/// assert!(rate_limit.is_near_exhaustion(0.1));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimit {
    limit: u32,
    remaining: u32,
    reset_at: DateTime<Utc>,
    resource: String,
}

impl RateLimit {
    /// Create a rate limit snapshot.
    pub fn new(
        limit: u32,
        remaining: u32,
        reset_at: DateTime<Utc>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            limit,
            remaining,
            reset_at,
            resource: resource.into(),
        }
    }

    /// Requests allowed per window.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Requests remaining in the current window.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// When the window resets.
    pub fn reset_at(&self) -> DateTime<Utc> {
        self.reset_at
    }

    /// Resource the limit applies to.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// No requests remain.
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Remaining requests are at or below `margin` (a fraction of the limit).
    pub fn is_near_exhaustion(&self, margin: f64) -> bool {
        let threshold = (self.limit as f64 * margin) as u32;
        self.remaining <= threshold
    }

    /// The reset time has passed.
    pub fn has_reset(&self) -> bool {
        Utc::now() >= self.reset_at
    }
}

fn header_value<'a>(headers: &'a HeaderMap, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
}

fn parse_reset_at(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    let raw: i64 = header_value(headers, &RESET_HEADERS)?.parse().ok()?;
    if raw < RELATIVE_RESET_THRESHOLD {
        return Some(Utc::now() + chrono::Duration::seconds(raw.max(0)));
    }
    Utc.timestamp_opt(raw, 0).single()
}

/// Time until the rate limit window resets, if the provider reported it.
pub fn parse_reset_delay(headers: &HeaderMap) -> Option<Duration> {
    let reset_at = parse_reset_at(headers)?;
    Some((reset_at - Utc::now()).to_std().unwrap_or(Duration::ZERO))
}

/// Parse rate limit state from response headers.
///
/// Returns `None` unless limit, remaining and reset are all present and
/// numeric.
pub fn parse_rate_limit_from_headers(headers: &HeaderMap) -> Option<RateLimit> {
    let limit = header_value(headers, &LIMIT_HEADERS)?.parse().ok()?;
    let remaining = header_value(headers, &REMAINING_HEADERS)?.parse().ok()?;
    let reset_at = parse_reset_at(headers)?;
    let resource = header_value(headers, &[RESOURCE_HEADER]).unwrap_or(DEFAULT_RESOURCE);

    Some(RateLimit::new(limit, remaining, reset_at, resource))
}

/// Thread-safe record of the most recent rate limit state per resource.
///
/// The limiter only observes; it never delays requests. Callers can consult
/// [`can_proceed`](Self::can_proceed) before starting a long pagination run.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    limits: Arc<RwLock<HashMap<String, RateLimit>>>,
    margin: f64,
}

impl RateLimiter {
    /// Create a limiter that keeps `margin` (0.0 to 1.0) of the window in reserve.
    pub fn new(margin: f64) -> Self {
        Self {
            limits: Arc::new(RwLock::new(HashMap::new())),
            margin: margin.clamp(0.0, 1.0),
        }
    }

    /// Record rate limit headers from a response.
    pub fn update_from_headers(&self, headers: &HeaderMap) {
        let Some(rate_limit) = parse_rate_limit_from_headers(headers) else {
            return;
        };

        if rate_limit.is_near_exhaustion(self.margin) {
            warn!(
                resource = rate_limit.resource(),
                remaining = rate_limit.remaining(),
                limit = rate_limit.limit(),
                reset_at = %rate_limit.reset_at(),
                "Provider rate limit nearly exhausted"
            );
        }

        if let Ok(mut limits) = self.limits.write() {
            limits.insert(rate_limit.resource().to_string(), rate_limit);
        }
    }

    /// Whether a request for `resource` stays outside the safety margin.
    ///
    /// Unknown resources and windows that have already reset always proceed.
    pub fn can_proceed(&self, resource: &str) -> bool {
        match self.get_limit(resource) {
            Some(limit) => limit.has_reset() || !limit.is_near_exhaustion(self.margin),
            None => true,
        }
    }

    /// The last recorded state for `resource`.
    pub fn get_limit(&self, resource: &str) -> Option<RateLimit> {
        self.limits
            .read()
            .ok()
            .and_then(|limits| limits.get(resource).cloned())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(0.1)
    }
}

#[cfg(test)]
#[path = "rate_limit_tests.rs"]
mod tests;
