//! Error types for the HTTP service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use hookbridge_core::inbound::InboundError;
use tracing::{error, warn};

use crate::sink::SinkError;

/// Inbound webhook handler errors with HTTP status code mapping
///
/// - `400 Bad Request`: malformed payloads, missing handshake parameters
/// - `401 Unauthorized`: bad or missing signatures, wrong verify tokens
/// - `404 Not Found`: unknown integration, or one that takes no inbound calls
/// - `500 Internal Server Error`: credential or registry failures
/// - `503 Service Unavailable`: the event sink refused the events; the
///   provider should redeliver
///
/// Messages for server-side failures are replaced with a generic text; the
/// detail goes to the log.
#[derive(Debug, thiserror::Error)]
pub enum WebhookHandlerError {
    /// The `{integration_id}` path segment matches no configured integration.
    #[error("Integration not found: {integration}")]
    IntegrationNotFound { integration: String },

    /// The inbound pipeline rejected or failed the call.
    #[error(transparent)]
    Inbound(#[from] InboundError),

    /// Accepted events could not be handed to the sink.
    #[error("Event sink unavailable: {0}")]
    SinkUnavailable(#[from] SinkError),
}

impl WebhookHandlerError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::IntegrationNotFound { .. } => StatusCode::NOT_FOUND,
            Self::Inbound(e) => match e {
                InboundError::Unsupported { .. } => StatusCode::NOT_FOUND,
                InboundError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
                e if e.is_caller_error() => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::SinkUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for WebhookHandlerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, retry_after) = match &self {
            Self::SinkUnavailable(e) => {
                warn!(error = %e, "Event sink unavailable");
                (self.to_string(), Some(60))
            }
            _ if status.is_server_error() => {
                error!(error = %self, "Inbound call failed");
                (
                    "Internal server error occurred. Please try again later.".to_string(),
                    None,
                )
            }
            _ => {
                warn!(error = %self, status = status.as_u16(), "Inbound call rejected");
                (self.to_string(), None)
            }
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let mut response = (status, Json(body)).into_response();

        if let Some(retry_seconds) = retry_after {
            if let Ok(header_value) = retry_seconds.to_string().parse() {
                response.headers_mut().insert("Retry-After", header_value);
            }
        }

        response
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Integration '{integration}' is misconfigured: {message}")]
    Integration { integration: String, message: String },

    #[error("Configuration loading failed: {message}")]
    Load { message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(e: config::ConfigError) -> Self {
        Self::Load {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
