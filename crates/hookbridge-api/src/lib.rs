//! # Hookbridge HTTP Service
//!
//! HTTP surface for provider callbacks:
//!
//! | Route                           | Purpose                                     |
//! |---------------------------------|---------------------------------------------|
//! | `GET /webhook/{integration_id}` | Handshake (challenge) answered by the core  |
//! | `POST /webhook/{integration_id}`| Delivery: verified, filtered, sent to sink  |
//! | `GET /health`                   | Liveness                                    |
//!
//! Unknown integrations answer 404, bad signatures 401 and malformed JSON
//! 400. Errors carry a JSON body `{error, status, timestamp}`.

pub mod config;
pub mod errors;
pub mod runtime;
pub mod sink;

pub use config::{IntegrationConfig, ServerConfig, ServiceConfig};
pub use errors::{ConfigError, ServiceError, WebhookHandlerError};
pub use runtime::{IntegrationRuntime, Runtime};
pub use sink::{ChannelSink, DeliveredEvent, EventSink, LoggingSink, SinkError};

use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use bytes::Bytes;
use hookbridge_core::inbound::WebhookEndpoint;
use hookbridge_sdk::webhook::{ChallengeBody, ChallengeResponse};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, future::Future, net::SocketAddr, sync::Arc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, instrument, warn};

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// HTTP server settings
    pub config: Arc<ServerConfig>,

    /// Inbound endpoints keyed by integration id
    pub endpoints: Arc<HashMap<String, WebhookEndpoint>>,

    /// Receives accepted events
    pub sink: Arc<dyn EventSink>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        config: ServerConfig,
        endpoints: HashMap<String, WebhookEndpoint>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            endpoints: Arc::new(endpoints),
            sink,
        }
    }

    /// State serving every inbound endpoint of `runtime`.
    pub fn from_runtime(config: ServerConfig, runtime: &Runtime, sink: Arc<dyn EventSink>) -> Self {
        Self::new(config, runtime.endpoints(), sink)
    }

    fn endpoint(&self, integration_id: &str) -> Result<&WebhookEndpoint, WebhookHandlerError> {
        self.endpoints
            .get(integration_id)
            .ok_or_else(|| WebhookHandlerError::IntegrationNotFound {
                integration: integration_id.to_string(),
            })
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let webhook_routes = Router::new().route(
        "/webhook/{integration_id}",
        get(handle_handshake).post(handle_delivery),
    );

    let health_routes = Router::new().route("/health", get(handle_health_check));

    let mut router = Router::new()
        .merge(webhook_routes)
        .merge(health_routes)
        .layer(DefaultBodyLimit::max(state.config.max_body_size))
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(TraceLayer::new_for_http());

    if state.config.enable_cors {
        router = router.layer(CorsLayer::permissive());
    }

    router.with_state(state)
}

/// Serve until `shutdown` resolves.
///
/// In-flight requests are allowed to finish once the shutdown future
/// completes; new connections are refused.
pub async fn start_server<F>(state: AppState, shutdown: F) -> Result<(), ServiceError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let address = format!("{}:{}", state.config.host, state.config.port);
    let addr: SocketAddr = address.parse().map_err(|e| ServiceError::BindFailed {
        address: address.clone(),
        message: format!("{}", e),
    })?;

    let app = create_router(state);
    let listener =
        tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServiceError::BindFailed {
                address: addr.to_string(),
                message: e.to_string(),
            })?;

    info!("Starting HTTP server on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ServiceError::ServerFailed {
            message: e.to_string(),
        })?;

    info!("HTTP server shutdown complete");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C), initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

// ============================================================================
// Webhook Handlers
// ============================================================================

/// Answer a provider handshake.
#[instrument(skip(state, query))]
pub async fn handle_handshake(
    State(state): State<AppState>,
    Path(integration_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response, WebhookHandlerError> {
    let endpoint = state.endpoint(&integration_id)?;
    let challenge = endpoint.handshake(&query).await?;
    Ok(challenge_response(challenge))
}

/// Verify a delivery and hand its accepted events to the sink.
///
/// A delivery that carries no enabled event still answers 200, so the
/// provider does not redeliver it.
#[instrument(skip(state, headers, body), fields(body_len = body.len()))]
pub async fn handle_delivery(
    State(state): State<AppState>,
    Path(integration_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<DeliveryResponse>, WebhookHandlerError> {
    let endpoint = state.endpoint(&integration_id)?;

    let signature = endpoint
        .signature_header()
        .and_then(|name| headers.get(name))
        .and_then(|value| value.to_str().ok());

    let accepted = endpoint.deliver(signature, &body).await?;
    let event_ids: Vec<String> = accepted.iter().map(|e| e.event_id.to_string()).collect();

    for event in accepted {
        state
            .sink
            .publish(DeliveredEvent {
                integration_id: endpoint.integration().clone(),
                event,
            })
            .await?;
    }

    Ok(Json(DeliveryResponse {
        integration_id,
        accepted: event_ids.len(),
        event_ids,
    }))
}

fn challenge_response(challenge: ChallengeResponse) -> Response {
    let status = StatusCode::from_u16(challenge.status).unwrap_or(StatusCode::OK);
    let mut response = match challenge.body {
        ChallengeBody::Text(text) => (status, text).into_response(),
        ChallengeBody::Json(value) => (status, Json(value)).into_response(),
        ChallengeBody::Empty => status.into_response(),
    };

    for (name, value) in challenge.headers {
        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().insert(name, value);
            }
            _ => warn!("Dropping handshake header that is not valid HTTP"),
        }
    }

    response
}

// ============================================================================
// Health Check Handlers
// ============================================================================

/// Basic health check endpoint
#[instrument(skip(state))]
async fn handle_health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        integrations: state.endpoints.len(),
    })
}

// ============================================================================
// Middleware
// ============================================================================

/// Request logging middleware with correlation ID tracking
///
/// Reuses an incoming `x-correlation-id` or generates one, records it on the
/// span and echoes it in the response headers.
#[instrument(skip(request, next), fields(
    method = %request.method(),
    uri = %request.uri().path(),
    correlation_id
))]
async fn request_logging_middleware(
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let start = std::time::Instant::now();

    let correlation_id = request
        .headers()
        .get("x-correlation-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    tracing::Span::current().record("correlation_id", correlation_id.as_str());

    let mut response = next.run(request).await;
    let duration = start.elapsed();

    if let Ok(header_value) = correlation_id.parse() {
        response
            .headers_mut()
            .insert("x-correlation-id", header_value);
    }

    let status = response.status();
    if status.is_server_error() {
        error!(status = %status, duration_ms = %duration.as_millis(), "Request completed with server error");
    } else if status.is_client_error() {
        warn!(status = %status, duration_ms = %duration.as_millis(), "Request completed with client error");
    } else {
        info!(status = %status, duration_ms = %duration.as_millis(), "Request completed");
    }

    response
}

// ============================================================================
// Response Types
// ============================================================================

/// Delivery response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryResponse {
    pub integration_id: String,
    pub accepted: usize,
    pub event_ids: Vec<String>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub integrations: usize,
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
