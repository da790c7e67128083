//! # Hookbridge Service
//!
//! Binary entry point for the webhook service.
//!
//! This executable:
//! - Loads configuration from files and `HB__` environment variables
//! - Initializes structured logging
//! - Builds every configured integration and reconciles webhook subscriptions
//! - Serves the inbound webhook routes from hookbridge-api until SIGINT/SIGTERM
//! - Optionally removes the subscriptions again on the way out
//!
//! Exit codes: 1 when the listener cannot bind, 2 when the server fails,
//! 3 for configuration errors.

mod reconcile;

use anyhow::Context;
use hookbridge_api::config::LoggingConfig;
use hookbridge_api::{
    shutdown_signal, start_server, AppState, LoggingSink, Runtime, ServiceConfig, ServiceError,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -------------------------------------------------------------------------
    // Load configuration
    //
    // Sources, later ones overriding earlier ones:
    //  1. /etc/hookbridge/service.yaml
    //  2. ./config/service.yaml
    //  3. The file named by HOOKBRIDGE_CONFIG_FILE
    //  4. HB__-prefixed environment variables, e.g. HB__SERVER__PORT=9090
    //
    // Logging depends on the configuration, so a load failure is reported
    // with the default logging settings.
    // -------------------------------------------------------------------------
    let service_config = match ServiceConfig::load(None) {
        Ok(config) => config,
        Err(e) => {
            init_tracing(&LoggingConfig::default())?;
            error!(error = %e, "Failed to load configuration; aborting");
            std::process::exit(3);
        }
    };

    init_tracing(&service_config.logging)?;
    info!(version = env!("CARGO_PKG_VERSION"), "Starting Hookbridge Service");

    let runtime = match Runtime::from_config(&service_config).await {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Service configuration is invalid; aborting");
            std::process::exit(3);
        }
    };

    if service_config.server.register_on_startup {
        let report = reconcile::register_all(&runtime).await;
        if !report.is_clean() {
            warn!(
                registered = report.succeeded.len(),
                incomplete = report.incomplete.len(),
                failed = report.failed.len(),
                "Some webhook subscriptions are not in place; serving anyway"
            );
        }
    }

    let state = AppState::from_runtime(
        service_config.server.clone(),
        &runtime,
        Arc::new(LoggingSink),
    );

    info!(
        host = %service_config.server.host,
        port = service_config.server.port,
        integrations = state.endpoints.len(),
        "Starting HTTP server"
    );

    if let Err(e) = start_server(state, shutdown_signal()).await {
        error!("Server stopped with an error: {}", e);

        let exit_code = match e {
            ServiceError::BindFailed { .. } => 1,
            ServiceError::ServerFailed { .. } => 2,
            ServiceError::Configuration(_) => 3,
        };

        std::process::exit(exit_code);
    }

    if service_config.server.teardown_on_shutdown {
        let timeout = Duration::from_secs(service_config.server.shutdown_timeout_seconds);
        let report = reconcile::teardown_all(&runtime, timeout).await;
        info!(
            removed = report.succeeded.len(),
            kept = report.incomplete.len() + report.failed.len(),
            "Webhook teardown finished"
        );
    }

    info!("Hookbridge Service stopped");
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(logging.default_directives()))
        .context("invalid log filter")?;

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json_format {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .context("failed to install the log subscriber")
    } else {
        registry
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .context("failed to install the log subscriber")
    }
}
