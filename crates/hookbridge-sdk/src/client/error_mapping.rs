//! Declarative mapping from provider failures to [`NormalizedError`].
//!
//! Each provider declares where its error envelope keeps the message and the
//! provider code. Classification itself is uniform:
//!
//! | Response                                   | Kind               |
//! |--------------------------------------------|--------------------|
//! | 401                                        | `Unauthorized`     |
//! | 429                                        | `RateLimited`      |
//! | 404                                        | `NotFound`         |
//! | any other status with an envelope message  | `ProviderRejected` |
//! | anything else                              | `Unknown`          |

use super::rate_limit::parse_reset_delay;
use crate::error::NormalizedError;
use crate::field_path::FieldPath;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const MAX_FALLBACK_MESSAGE_CHARS: usize = 200;

/// Where a provider's error envelope keeps its message and code.
///
/// Paths are tried in order; the first one that resolves to a scalar wins.
///
/// # Examples
///
/// ```rust
/// use hookbridge_sdk::client::ErrorMapping;
/// use reqwest::header::HeaderMap;
///
/// let mapping = ErrorMapping::default();
/// let body = br#"{"errors":[{"code":214,"message":"Webhook URL does not meet the requirements."}]}"#;
///
/// let error = mapping.normalize(400, &HeaderMap::new(), body);
/// assert_eq!(error.kind, hookbridge_sdk::ErrorKind::ProviderRejected);
/// assert_eq!(error.provider_code.as_deref(), Some("214"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMapping {
    /// Candidate locations of the human readable message.
    #[serde(default = "default_message_paths")]
    pub message_paths: Vec<FieldPath>,

    /// Candidate locations of the provider error code.
    #[serde(default = "default_code_paths")]
    pub code_paths: Vec<FieldPath>,
}

fn default_message_paths() -> Vec<FieldPath> {
    [
        "error.error.message",
        "error.message",
        "errors.0.message",
        "error_description",
        "message",
        "error",
    ]
    .into_iter()
    .map(FieldPath::new)
    .collect()
}

fn default_code_paths() -> Vec<FieldPath> {
    ["error.code", "errors.0.code", "code", "error.type", "category"]
        .into_iter()
        .map(FieldPath::new)
        .collect()
}

impl Default for ErrorMapping {
    fn default() -> Self {
        Self {
            message_paths: default_message_paths(),
            code_paths: default_code_paths(),
        }
    }
}

impl ErrorMapping {
    /// A mapping that only looks at the given message and code paths.
    pub fn new(message_paths: Vec<FieldPath>, code_paths: Vec<FieldPath>) -> Self {
        Self {
            message_paths,
            code_paths,
        }
    }

    /// Find the envelope message, if the body is JSON and has one.
    pub fn envelope_message(&self, body: &Value) -> Option<String> {
        first_match(&self.message_paths, body)
    }

    /// Find the provider error code, if any.
    pub fn envelope_code(&self, body: &Value) -> Option<String> {
        first_match(&self.code_paths, body)
    }

    /// Classify a non-success response.
    pub fn normalize(&self, status: u16, headers: &HeaderMap, body: &[u8]) -> NormalizedError {
        let envelope: Option<Value> = serde_json::from_slice(body).ok();
        let message = envelope.as_ref().and_then(|v| self.envelope_message(v));
        let code = envelope.as_ref().and_then(|v| self.envelope_code(v));
        let describe = || message.clone().unwrap_or_else(|| fallback_message(status, body));

        let mut error = match status {
            401 => NormalizedError::unauthorized(status, describe()),
            429 => NormalizedError::rate_limited(status, retry_after(headers), describe()),
            404 => NormalizedError::not_found(describe()),
            _ => match message.clone() {
                Some(message) => NormalizedError::provider_rejected(status, code.clone(), message),
                None => NormalizedError::unknown(Some(status), fallback_message(status, body)),
            },
        };

        if error.provider_code.is_none() {
            error.provider_code = code;
        }
        error
    }
}

fn first_match(paths: &[FieldPath], body: &Value) -> Option<String> {
    paths
        .iter()
        .filter_map(|path| path.lookup_string(body))
        .find(|value| !value.trim().is_empty())
}

fn fallback_message(status: u16, body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if !text.is_empty() {
        return text.chars().take(MAX_FALLBACK_MESSAGE_CHARS).collect();
    }

    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status))
}

/// How long to wait before retrying, from `Retry-After` or a rate limit
/// reset header.
///
/// `Retry-After` may hold delta seconds or an HTTP date. When it is absent the
/// `x-ratelimit-reset` family is consulted.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    if let Some(value) = headers.get(RETRY_AFTER).and_then(|v| v.to_str().ok()) {
        let value = value.trim();
        if let Ok(seconds) = value.parse::<u64>() {
            return Some(Duration::from_secs(seconds));
        }
        if let Ok(date) = DateTime::parse_from_rfc2822(value) {
            let delay = date.with_timezone(&Utc) - Utc::now();
            return Some(delay.to_std().unwrap_or(Duration::ZERO));
        }
    }

    parse_reset_delay(headers)
}

#[cfg(test)]
#[path = "error_mapping_tests.rs"]
mod tests;
