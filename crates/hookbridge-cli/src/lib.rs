//! # Hookbridge CLI
//!
//! Operator commands over the integrations in the service configuration:
//!
//! - `status`: is each webhook subscription in place (`--remote` asks the
//!   provider instead of trusting the local record)
//! - `subscribe` / `unsubscribe`: drive the subscription lifecycle by hand
//! - `fetch`: paginated read of a provider collection
//! - `providers`: the provider catalog
//!
//! Results go to stdout as text or JSON; logs go to stderr.

use clap::{Parser, Subcommand};
use hookbridge_api::{ConfigError, IntegrationRuntime, Runtime, ServiceConfig};
use hookbridge_core::lifecycle::{LifecycleError, WebhookLifecycle};
use hookbridge_core::providers::{ProviderCatalog, ProviderDefinition};
use hookbridge_sdk::client::ApiRequest;
use hookbridge_sdk::{CredentialError, CredentialProvider, NormalizedError, PaginationStyle};
use serde::Serialize;
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// ============================================================================
// CLI Structure
// ============================================================================

/// Hookbridge CLI - manage provider webhook subscriptions
#[derive(Debug, Parser)]
#[command(name = "hookbridge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Manage provider webhook subscriptions and read provider data")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "HOOKBRIDGE_CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Logging level
    #[arg(short, long, default_value = "warn")]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Show the subscription state of integrations
    Status {
        /// Only this integration
        integration: Option<String>,

        /// Confirm the recorded subscription with the provider
        #[arg(short, long)]
        remote: bool,
    },

    /// Register webhook subscriptions that are not in place
    Subscribe {
        /// Only this integration
        integration: Option<String>,
    },

    /// Delete webhook subscriptions
    Unsubscribe {
        /// Only this integration
        integration: Option<String>,
    },

    /// Read every page of a provider collection
    Fetch {
        /// Integration whose credential and provider are used
        integration: String,

        /// Request path relative to the provider base URL
        path: String,

        /// Stop after this many items
        #[arg(short, long)]
        limit: Option<usize>,

        /// Extra query parameters as name=value
        #[arg(short, long = "query", value_parser = parse_query_pair)]
        query: Vec<(String, String)>,
    },

    /// List the provider catalog
    Providers {
        /// Include the event catalog of each provider
        #[arg(short, long)]
        verbose: bool,
    },
}

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
}

fn parse_query_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected name=value, got '{}'", raw)),
    }
}

// ============================================================================
// CLI Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Unknown integration '{integration}'")]
    UnknownIntegration { integration: String },

    #[error("Integration '{integration}' has no webhook subscription to manage")]
    NoWebhook { integration: String },

    #[error("Integration '{integration}': {source}")]
    Lifecycle {
        integration: String,
        #[source]
        source: LifecycleError,
    },

    #[error("Provider request failed: {0}")]
    Provider(#[from] NormalizedError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {0}")]
    Output(#[from] serde_json::Error),
}

// ============================================================================
// Output Types
// ============================================================================

/// Subscription state of one integration as reported by a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    Registered,
    Unregistered,
    /// The provider still lists the recorded subscription.
    Confirmed,
    /// The provider no longer knows the recorded subscription.
    Stale,
    /// The provider cannot list webhooks, so nothing can be confirmed.
    Unverifiable,
    /// The provider answered without a subscription id.
    Incomplete,
    /// The provider refused the delete; the record is kept.
    Kept,
    /// The provider has no webhook API, or no callback URL is configured.
    NoWebhook,
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Registered => "registered",
            Self::Unregistered => "unregistered",
            Self::Confirmed => "confirmed",
            Self::Stale => "stale",
            Self::Unverifiable => "unverifiable",
            Self::Incomplete => "incomplete",
            Self::Kept => "kept",
            Self::NoWebhook => "no-webhook",
        };
        f.pad(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrationStatus {
    pub integration: String,
    pub provider: String,
    pub state: SubscriptionState,
    pub subscription_id: Option<String>,
    pub events: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderSummary {
    pub name: String,
    pub base_url: String,
    pub pagination: &'static str,
    pub webhook: bool,
    pub inbound: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<String>>,
}

impl ProviderSummary {
    fn new(provider: &ProviderDefinition, verbose: bool) -> Self {
        let pagination = match provider.pagination() {
            PaginationStyle::Offset(_) => "offset",
            PaginationStyle::Token(_) => "token",
            PaginationStyle::Link(_) => "link",
            PaginationStyle::Single(_) => "single",
        };
        Self {
            name: provider.name.clone(),
            base_url: provider.base_url.clone(),
            pagination,
            webhook: provider.webhook.is_some(),
            inbound: provider.inbound.is_some(),
            events: verbose.then(|| provider.events.iter().map(|e| e.to_string()).collect()),
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();
    initialize_logging(&cli);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run(&cli, &mut out).await
}

/// Load the configuration named by `cli` and run its command.
pub async fn run(cli: &Cli, out: &mut dyn Write) -> Result<(), CliError> {
    let config = ServiceConfig::load(cli.config.as_deref())?;

    match &cli.command {
        // Listing the catalog needs no secrets.
        Commands::Providers { verbose } => {
            let catalog = config.providers.catalog().await?;
            write_providers(&catalog, *verbose, cli.format, out)
        }
        command => {
            let runtime = Runtime::from_config(&config).await?;
            execute(command, &runtime, cli.format, out).await
        }
    }
}

/// Run one command against a built runtime.
pub async fn execute(
    command: &Commands,
    runtime: &Runtime,
    format: OutputFormat,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    match command {
        Commands::Status {
            integration,
            remote,
        } => {
            let rows = execute_status(runtime, integration.as_deref(), *remote).await?;
            write_statuses(&rows, format, out)
        }
        Commands::Subscribe { integration } => {
            let rows = execute_subscribe(runtime, integration.as_deref()).await?;
            write_statuses(&rows, format, out)
        }
        Commands::Unsubscribe { integration } => {
            let rows = execute_unsubscribe(runtime, integration.as_deref()).await?;
            write_statuses(&rows, format, out)
        }
        Commands::Fetch {
            integration,
            path,
            limit,
            query,
        } => {
            let items = execute_fetch(runtime, integration, path, *limit, query).await?;
            write_items(&items, format, out)
        }
        Commands::Providers { verbose } => write_providers(&runtime.catalog, *verbose, format, out),
    }
}

fn initialize_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &cli.log_level;
        EnvFilter::new(format!(
            "hookbridge_cli={level},hookbridge_api={level},hookbridge_core={level},hookbridge_sdk={level}"
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    // A subscriber installed elsewhere (tests) wins.
    let _ = if cli.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
}

// ============================================================================
// Command Implementations
// ============================================================================

fn select<'a>(
    runtime: &'a Runtime,
    integration: Option<&str>,
) -> Result<Vec<&'a IntegrationRuntime>, CliError> {
    match integration {
        Some(id) => runtime
            .get(id)
            .map(|i| vec![i])
            .ok_or_else(|| CliError::UnknownIntegration {
                integration: id.to_string(),
            }),
        None => Ok(runtime.iter().collect()),
    }
}

/// Integrations with a lifecycle. A named integration without one is an
/// error; without a name the others are skipped.
fn select_webhooks<'a>(
    runtime: &'a Runtime,
    integration: Option<&str>,
) -> Result<Vec<&'a IntegrationRuntime>, CliError> {
    let selected = select(runtime, integration)?;
    if let (Some(id), Some(only)) = (integration, selected.first()) {
        if only.lifecycle.is_none() {
            return Err(CliError::NoWebhook {
                integration: id.to_string(),
            });
        }
    }
    Ok(selected
        .into_iter()
        .filter(|i| i.lifecycle.is_some())
        .collect())
}

fn lifecycle_error(integration: &IntegrationRuntime) -> impl FnOnce(LifecycleError) -> CliError + '_ {
    move |source| CliError::Lifecycle {
        integration: integration.id.to_string(),
        source,
    }
}

async fn status_row(
    integration: &IntegrationRuntime,
    state: SubscriptionState,
) -> Result<IntegrationStatus, CliError> {
    let (subscription_id, events) = match &integration.lifecycle {
        Some(lifecycle) => {
            let record = lifecycle
                .subscription()
                .await
                .map_err(lifecycle_error(integration))?;
            let events = lifecycle.enabled_events().iter().map(|e| e.to_string()).collect();
            (record.and_then(|r| r.provider_subscription_id), events)
        }
        None => (None, Vec::new()),
    };

    Ok(IntegrationStatus {
        integration: integration.id.to_string(),
        provider: integration.provider.name.clone(),
        state,
        subscription_id,
        events,
    })
}

async fn execute_status(
    runtime: &Runtime,
    integration: Option<&str>,
    remote: bool,
) -> Result<Vec<IntegrationStatus>, CliError> {
    let mut rows = Vec::new();

    for integration in select(runtime, integration)? {
        let state = match &integration.lifecycle {
            None => SubscriptionState::NoWebhook,
            Some(lifecycle) if remote => remote_state(lifecycle)
                .await
                .map_err(lifecycle_error(integration))?,
            Some(lifecycle) => match lifecycle.check_exists().await {
                Ok(true) => SubscriptionState::Registered,
                Ok(false) => SubscriptionState::Unregistered,
                Err(e) => return Err(lifecycle_error(integration)(e)),
            },
        };
        rows.push(status_row(integration, state).await?);
    }

    Ok(rows)
}

async fn remote_state(lifecycle: &WebhookLifecycle) -> Result<SubscriptionState, LifecycleError> {
    match lifecycle.verify_remote().await {
        Ok(true) => Ok(SubscriptionState::Confirmed),
        Ok(false) => Ok(SubscriptionState::Unregistered),
        Err(LifecycleError::StaleSubscription { .. }) => Ok(SubscriptionState::Stale),
        Err(LifecycleError::Unsupported { .. }) => Ok(SubscriptionState::Unverifiable),
        Err(e) => Err(e),
    }
}

async fn execute_subscribe(
    runtime: &Runtime,
    integration: Option<&str>,
) -> Result<Vec<IntegrationStatus>, CliError> {
    let mut rows = Vec::new();

    for integration in select_webhooks(runtime, integration)? {
        let Some(lifecycle) = &integration.lifecycle else {
            continue;
        };
        info!(integration_id = %integration.id, "Ensuring webhook subscription");
        let state = match lifecycle.ensure_registered().await {
            Ok(true) => SubscriptionState::Registered,
            Ok(false) => SubscriptionState::Incomplete,
            Err(e) => return Err(lifecycle_error(integration)(e)),
        };
        rows.push(status_row(integration, state).await?);
    }

    Ok(rows)
}

async fn execute_unsubscribe(
    runtime: &Runtime,
    integration: Option<&str>,
) -> Result<Vec<IntegrationStatus>, CliError> {
    let mut rows = Vec::new();

    for integration in select_webhooks(runtime, integration)? {
        let Some(lifecycle) = &integration.lifecycle else {
            continue;
        };
        info!(integration_id = %integration.id, "Deleting webhook subscription");
        let state = match lifecycle.delete().await {
            Ok(true) => SubscriptionState::Unregistered,
            Ok(false) => SubscriptionState::Kept,
            Err(e) => return Err(lifecycle_error(integration)(e)),
        };
        rows.push(status_row(integration, state).await?);
    }

    Ok(rows)
}

async fn execute_fetch(
    runtime: &Runtime,
    integration: &str,
    path: &str,
    limit: Option<usize>,
    query: &[(String, String)],
) -> Result<Vec<serde_json::Value>, CliError> {
    let selected = runtime
        .get(integration)
        .ok_or_else(|| CliError::UnknownIntegration {
            integration: integration.to_string(),
        })?;

    let credential = runtime.credentials.credential(integration).await?;
    let request = query
        .iter()
        .fold(ApiRequest::get(path), |request, (name, value)| {
            request.with_query(name.clone(), value.clone())
        });
    let pagination = selected.provider.pagination();

    debug!(integration_id = %selected.id, path, limit = ?limit, "Fetching collection");
    let items = selected
        .client
        .fetch_up_to(&request, &credential, &pagination, limit)
        .await?;
    info!(integration_id = %selected.id, items = items.len(), "Fetch complete");

    Ok(items)
}

// ============================================================================
// Output
// ============================================================================

fn write_statuses(
    rows: &[IntegrationStatus],
    format: OutputFormat,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, rows)?;
            writeln!(out)?;
        }
        OutputFormat::Text => {
            for row in rows {
                writeln!(
                    out,
                    "{:<24} {:<16} {:<13} {}",
                    row.integration,
                    row.provider,
                    row.state,
                    row.subscription_id.as_deref().unwrap_or("-")
                )?;
            }
        }
    }
    Ok(())
}

fn write_items(
    items: &[serde_json::Value],
    format: OutputFormat,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, items)?;
            writeln!(out)?;
        }
        // One compact item per line.
        OutputFormat::Text => {
            for item in items {
                serde_json::to_writer(&mut *out, item)?;
                writeln!(out)?;
            }
        }
    }
    Ok(())
}

fn write_providers(
    catalog: &ProviderCatalog,
    verbose: bool,
    format: OutputFormat,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let summaries: Vec<ProviderSummary> = catalog
        .iter()
        .map(|p| ProviderSummary::new(p, verbose))
        .collect();

    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &summaries)?;
            writeln!(out)?;
        }
        OutputFormat::Text => {
            for summary in &summaries {
                let mut capabilities = vec![summary.pagination];
                if summary.webhook {
                    capabilities.push("webhook");
                }
                if summary.inbound {
                    capabilities.push("inbound");
                }
                writeln!(
                    out,
                    "{:<16} {:<40} {}",
                    summary.name,
                    summary.base_url,
                    capabilities.join(",")
                )?;
                if let Some(events) = &summary.events {
                    for event in events {
                        writeln!(out, "    {}", event)?;
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
