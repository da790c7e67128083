//! Error types for connector operations.
//!
//! Every failure that crosses the request adapter is expressed as a
//! [`NormalizedError`]; raw provider bodies never leak past the client. The
//! remaining enums cover local validation and the credential boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Classification of a failed provider call.
///
/// The set is closed: callers match on it to decide between "fix the
/// credential", "back off" and "give up".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// 401-class response; the credential or signing secret is wrong.
    Unauthorized,

    /// 429-class response; the caller should wait before retrying.
    RateLimited,

    /// 404-class response.
    NotFound,

    /// Any other failure for which the provider returned a structured
    /// error envelope.
    ProviderRejected,

    /// Network failure or timeout before a response was received.
    Transport,

    /// Everything else, including unparseable bodies and pagination runs that
    /// hit their page ceiling.
    Unknown,
}

impl ErrorKind {
    /// Stable identifier for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::RateLimited => "rate_limited",
            Self::NotFound => "not_found",
            Self::ProviderRejected => "provider_rejected",
            Self::Transport => "transport",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The uniform error shape surfaced by the request adapter and the
/// pagination engine.
///
/// The display form always carries the kind and the original status code so
/// operators can tell a misconfigured secret (`unauthorized [401]`) from an
/// outage (`transport [no status]`).
///
/// # Examples
///
/// ```rust
/// use hookbridge_sdk::{ErrorKind, NormalizedError};
///
/// let error = NormalizedError::not_found("webhook 42 does not exist");
/// assert_eq!(error.kind, ErrorKind::NotFound);
/// assert_eq!(error.status_code, Some(404));
/// assert_eq!(error.to_string(), "not_found [404]: webhook 42 does not exist");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} [{}]: {}", .kind, display_status(.status_code), .message)]
pub struct NormalizedError {
    /// Error classification.
    pub kind: ErrorKind,

    /// HTTP status returned by the provider, when a response was received.
    pub status_code: Option<u16>,

    /// Human readable description extracted from the provider envelope or
    /// generated locally.
    pub message: String,

    /// Provider specific error code from the error envelope, if present.
    pub provider_code: Option<String>,

    /// How long the provider asked us to wait (rate limiting only).
    pub retry_after: Option<Duration>,
}

fn display_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "no status".to_string(),
    }
}

impl NormalizedError {
    fn new(kind: ErrorKind, status_code: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            kind,
            status_code,
            message: message.into(),
            provider_code: None,
            retry_after: None,
        }
    }

    /// The credential was rejected.
    pub fn unauthorized(status_code: u16, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, Some(status_code), message)
    }

    /// The provider throttled the request.
    pub fn rate_limited(
        status_code: u16,
        retry_after: Option<Duration>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            retry_after,
            ..Self::new(ErrorKind::RateLimited, Some(status_code), message)
        }
    }

    /// The addressed resource does not exist.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, Some(404), message)
    }

    /// The provider answered with a structured error envelope.
    pub fn provider_rejected(
        status_code: u16,
        provider_code: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider_code,
            ..Self::new(ErrorKind::ProviderRejected, Some(status_code), message)
        }
    }

    /// No response was received.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, None, message)
    }

    /// Anything that does not fit another kind.
    pub fn unknown(status_code: Option<u16>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, status_code, message)
    }

    /// A pagination run fetched `max_pages` pages and the provider still
    /// reported more.
    pub fn pagination_ceiling(max_pages: usize) -> Self {
        Self::unknown(
            None,
            format!(
                "pagination ceiling of {} pages reached before the provider signalled the last page",
                max_pages
            ),
        )
    }

    /// The provider indicated another page but the cursor fields needed to
    /// request it were missing or malformed.
    pub fn malformed_cursor(message: impl Into<String>) -> Self {
        Self::unknown(None, format!("malformed pagination cursor: {}", message.into()))
    }

    /// Check whether this error represents a condition that may succeed if
    /// the caller retries later.
    ///
    /// Transient conditions are rate limiting, transport failures and 5xx
    /// responses. Nothing in this crate retries on its own.
    pub fn is_transient(&self) -> bool {
        match self.kind {
            ErrorKind::RateLimited | ErrorKind::Transport => true,
            ErrorKind::ProviderRejected | ErrorKind::Unknown => {
                matches!(self.status_code, Some(status) if status >= 500)
            }
            ErrorKind::Unauthorized | ErrorKind::NotFound => false,
        }
    }

    /// Shorthand for `kind == ErrorKind::NotFound`.
    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }
}

impl From<reqwest::Error> for NormalizedError {
    fn from(error: reqwest::Error) -> Self {
        let status = error.status().map(|s| s.as_u16());

        if error.is_timeout() {
            return Self::transport(format!("request timed out: {}", error));
        }

        if error.is_connect() || error.is_request() || error.is_body() {
            return Self::transport(format!("request failed: {}", error));
        }

        if error.is_decode() {
            return Self::unknown(status, format!("response could not be decoded: {}", error));
        }

        Self::unknown(status, error.to_string())
    }
}

/// Input validation errors.
///
/// These errors occur when validating configuration, identifiers, handshake
/// tokens or signatures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing.
    #[error("Required field missing: {field}")]
    Required { field: String },

    /// A field has an invalid format.
    #[error("Invalid format for {field}: {message}")]
    InvalidFormat { field: String, message: String },

    /// A field value is out of the acceptable range.
    #[error("Value out of range for {field}: {message}")]
    OutOfRange { field: String, message: String },

    /// A signing operation needed a secret that the credential does not hold.
    #[error("Signing secret '{name}' is not available")]
    MissingSecret { name: String },

    /// A signature header could not be parsed.
    #[error("Invalid signature format: {message}")]
    InvalidSignatureFormat { message: String },

    /// The HMAC primitive rejected its key.
    #[error("HMAC computation failed: {message}")]
    HmacError { message: String },
}

/// Errors raised at the credential boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// No credential is configured for the integration.
    #[error("No credential configured for integration '{integration}'")]
    NotFound { integration: String },

    /// The credential exists but lacks a named attribute or secret.
    #[error("Credential for integration '{integration}' has no '{name}' entry")]
    MissingEntry { integration: String, name: String },

    /// The external credential store could not be reached.
    #[error("Credential store unavailable: {0}")]
    StoreUnavailable(String),
}

impl CredentialError {
    /// Only store outages are worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
