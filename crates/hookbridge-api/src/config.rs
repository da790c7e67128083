//! # Service Configuration
//!
//! Every section carries serde defaults, so an empty file (or no file at
//! all) produces a usable configuration. Sources are layered by
//! [`ServiceConfig::load`]:
//!
//! 1. `/etc/hookbridge/service.yaml`
//! 2. `./config/service.yaml`
//! 3. The file named by `HOOKBRIDGE_CONFIG_FILE` (or passed explicitly)
//! 4. Environment variables prefixed `HB__`, with `__` as the separator,
//!    e.g. `HB__SERVER__PORT=9090`
//!
//! ## Integrations
//!
//! ```yaml
//! server:
//!   public_url: https://hooks.example.com
//! integrations:
//!   - id: fb-leads
//!     provider: facebook-leads
//!     events: [leadgen]
//!     credential:
//!       auth:
//!         scheme: bearer
//!         token: { source: env, var: FB_PAGE_TOKEN }
//!       attributes:
//!         app_id: "1234"
//!       secrets:
//!         app_secret: { source: env, var: FB_APP_SECRET }
//!         verify_token: { source: env, var: FB_VERIFY_TOKEN }
//! ```
//!
//! Secret values come either from environment variables or, for local
//! development, literal values. Literal values never appear in `Debug`
//! output.

use crate::errors::ConfigError;
use hookbridge_core::adapters::{FilesystemSubscriptionStore, InMemorySubscriptionStore};
use hookbridge_core::providers::ProviderCatalog;
use hookbridge_core::registry::SubscriptionStore;
use hookbridge_core::{EventType, IntegrationId};
use hookbridge_sdk::{
    ApiKeyPlacement, AuthScheme, ClientConfig, Credential, OAuth1Credentials, SecretString,
    StaticCredentialProvider,
};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_FILE_ENV: &str = "HOOKBRIDGE_CONFIG_FILE";

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "HB";

/// Service configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Where subscription records are kept
    pub registry: RegistryConfig,

    /// Additional provider definitions
    pub providers: ProvidersConfig,

    /// Outbound request settings
    pub client: ClientSettings,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Configured integrations
    pub integrations: Vec<IntegrationConfig>,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Externally reachable base URL; callback URLs default to
    /// `{public_url}/webhook/{integration_id}`
    pub public_url: Option<String>,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,

    /// Maximum request size in bytes
    pub max_body_size: usize,

    /// Enable CORS
    pub enable_cors: bool,

    /// Reconcile webhook subscriptions before serving
    pub register_on_startup: bool,

    /// Delete webhook subscriptions when shutting down
    pub teardown_on_shutdown: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            public_url: None,
            shutdown_timeout_seconds: 30,
            max_body_size: 2 * 1024 * 1024, // 2MB
            enable_cors: false,
            register_on_startup: true,
            teardown_on_shutdown: false,
        }
    }
}

/// Subscription registry backend
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegistryConfig {
    /// Records are lost on restart; for tests and dry runs.
    Memory,

    /// One JSON file per integration under `path`.
    Filesystem { path: PathBuf },
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("data/subscriptions"),
        }
    }
}

impl RegistryConfig {
    /// Open the configured store.
    pub async fn open(&self) -> Result<Arc<dyn SubscriptionStore>, ConfigError> {
        match self {
            Self::Memory => Ok(Arc::new(InMemorySubscriptionStore::new())),
            Self::Filesystem { path } => {
                let store = FilesystemSubscriptionStore::new(path.clone())
                    .await
                    .map_err(|e| ConfigError::Invalid {
                        message: format!("registry path {}: {}", path.display(), e),
                    })?;
                Ok(Arc::new(store))
            }
        }
    }
}

/// Provider catalog settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// YAML file with additional provider definitions
    pub definitions_file: Option<PathBuf>,
}

impl ProvidersConfig {
    /// The built-in catalog plus any definitions from `definitions_file`.
    pub async fn catalog(&self) -> Result<ProviderCatalog, ConfigError> {
        let mut catalog = ProviderCatalog::builtin();
        if let Some(path) = &self.definitions_file {
            let added = catalog
                .extend_from_file(path)
                .await
                .map_err(|e| ConfigError::Invalid {
                    message: e.to_string(),
                })?;
            info!(path = %path.display(), added, "Loaded provider definitions");
        }
        Ok(catalog)
    }
}

/// Outbound request settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Per-request timeout in seconds
    pub timeout_seconds: u64,

    /// Pagination ceiling
    pub max_pages: usize,

    /// Fraction of a rate limit window to keep in reserve
    pub rate_limit_margin: f64,

    pub user_agent: Option<String>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        let defaults = ClientConfig::default();
        Self {
            timeout_seconds: defaults.timeout.as_secs(),
            max_pages: defaults.max_pages,
            rate_limit_margin: defaults.rate_limit_margin,
            user_agent: None,
        }
    }
}

impl ClientSettings {
    /// The request adapter configuration.
    pub fn client_config(&self) -> ClientConfig {
        let config = ClientConfig::default()
            .with_timeout(Duration::from_secs(self.timeout_seconds))
            .with_max_pages(self.max_pages)
            .with_rate_limit_margin(self.rate_limit_margin);

        match &self.user_agent {
            Some(user_agent) => config.with_user_agent(user_agent.clone()),
            None => config,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level for the hookbridge crates when `RUST_LOG` is unset
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub fn default_directives(&self) -> String {
        ["hookbridge_service", "hookbridge_core", "hookbridge_api", "hookbridge_cli"]
            .iter()
            .map(|target| format!("{}={}", target, self.level))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Where a secret value comes from.
#[derive(Clone, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum SecretSource {
    /// Value written in the configuration. Development only.
    Literal { value: String },

    /// Value of an environment variable, read at start-up.
    Env { var: String },
}

impl fmt::Debug for SecretSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal { .. } => f
                .debug_struct("Literal")
                .field("value", &"<REDACTED>")
                .finish(),
            Self::Env { var } => f.debug_struct("Env").field("var", var).finish(),
        }
    }
}

impl SecretSource {
    /// Check the source is usable without reading it.
    pub fn validate(&self, field: &str) -> Result<(), String> {
        match self {
            Self::Literal { value } if value.is_empty() => {
                Err(format!("{} has an empty literal value", field))
            }
            Self::Env { var } if var.is_empty() => {
                Err(format!("{} names an empty environment variable", field))
            }
            _ => Ok(()),
        }
    }

    /// Read the secret.
    pub fn resolve(&self) -> Result<SecretString, ConfigError> {
        match self {
            Self::Literal { value } => Ok(SecretString::new(value.clone())),
            Self::Env { var } => match std::env::var(var) {
                Ok(value) if !value.is_empty() => Ok(SecretString::new(value)),
                _ => Err(ConfigError::Missing { key: var.clone() }),
            },
        }
    }
}

/// How an integration authorizes outbound calls.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum AuthConfig {
    #[default]
    None,

    Bearer {
        token: SecretSource,
    },

    ApiKey {
        placement: ApiKeyPlacement,
        key: SecretSource,
    },

    #[serde(rename = "oauth1")]
    OAuth1 {
        consumer_key: String,
        consumer_secret: SecretSource,
        token: SecretSource,
        token_secret: SecretSource,
    },
}

impl AuthConfig {
    fn sources(&self) -> Vec<(&'static str, &SecretSource)> {
        match self {
            Self::None => Vec::new(),
            Self::Bearer { token } => vec![("auth.token", token)],
            Self::ApiKey { key, .. } => vec![("auth.key", key)],
            Self::OAuth1 {
                consumer_secret,
                token,
                token_secret,
                ..
            } => vec![
                ("auth.consumer_secret", consumer_secret),
                ("auth.token", token),
                ("auth.token_secret", token_secret),
            ],
        }
    }

    fn build(&self) -> Result<AuthScheme, ConfigError> {
        Ok(match self {
            Self::None => AuthScheme::None,
            Self::Bearer { token } => AuthScheme::Bearer {
                token: token.resolve()?,
            },
            Self::ApiKey { placement, key } => AuthScheme::ApiKey {
                key: key.resolve()?,
                placement: placement.clone(),
            },
            Self::OAuth1 {
                consumer_key,
                consumer_secret,
                token,
                token_secret,
            } => AuthScheme::OAuth1(OAuth1Credentials {
                consumer_key: consumer_key.clone(),
                consumer_secret: consumer_secret.resolve()?,
                token: token.resolve()?.expose_secret().to_string(),
                token_secret: token_secret.resolve()?,
            }),
        })
    }
}

/// Credential of one integration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CredentialConfig {
    pub auth: AuthConfig,

    /// Named secrets (signing secrets, verify tokens).
    pub secrets: BTreeMap<String, SecretSource>,

    /// Plain values endpoint templates may reference.
    pub attributes: BTreeMap<String, String>,
}

impl CredentialConfig {
    /// Check every secret source without reading it.
    pub fn validate(&self) -> Result<(), String> {
        for (field, source) in self.auth.sources() {
            source.validate(field)?;
        }
        for (name, source) in &self.secrets {
            if name.is_empty() {
                return Err("secret names must not be empty".to_string());
            }
            source.validate(&format!("secrets.{}", name))?;
        }
        Ok(())
    }

    /// Resolve every secret and build the credential.
    pub fn build(&self) -> Result<Credential, ConfigError> {
        let mut credential = Credential::new(self.auth.build()?);
        for (name, source) in &self.secrets {
            credential = credential.with_secret(name.clone(), source.resolve()?);
        }
        for (name, value) in &self.attributes {
            credential = credential.with_attribute(name.clone(), value.clone());
        }
        Ok(credential)
    }
}

/// One integration instance.
#[derive(Debug, Clone, Deserialize)]
pub struct IntegrationConfig {
    /// URL-safe id; also the webhook route segment.
    pub id: String,

    /// Provider name from the catalog.
    pub provider: String,

    /// Enabled events.
    #[serde(default)]
    pub events: Vec<String>,

    /// Overrides the callback URL derived from `server.public_url`.
    #[serde(default)]
    pub callback_url: Option<String>,

    /// Overrides the provider's default verification secret name.
    #[serde(default)]
    pub verification_secret: Option<String>,

    #[serde(default)]
    pub credential: CredentialConfig,
}

impl IntegrationConfig {
    /// The validated integration id.
    pub fn integration_id(&self) -> Result<IntegrationId, ConfigError> {
        IntegrationId::new(self.id.clone()).map_err(|e| self.invalid(e.to_string()))
    }

    /// The enabled events as a set.
    pub fn enabled_events(&self) -> Result<BTreeSet<EventType>, ConfigError> {
        self.events
            .iter()
            .map(|event| EventType::new(event.clone()).map_err(|e| self.invalid(e.to_string())))
            .collect()
    }

    fn invalid(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::Integration {
            integration: self.id.clone(),
            message: message.into(),
        }
    }
}

impl ServiceConfig {
    /// Load the layered configuration.
    ///
    /// `explicit` takes precedence over `HOOKBRIDGE_CONFIG_FILE`. Missing
    /// default files are fine; a named file that is missing or malformed is
    /// an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(
                config::File::with_name("/etc/hookbridge/service")
                    .required(false)
                    .format(config::FileFormat::Yaml),
            )
            .add_source(
                config::File::with_name("config/service")
                    .required(false)
                    .format(config::FileFormat::Yaml),
            );

        let named = explicit.map(Path::to_path_buf).or_else(|| {
            std::env::var(CONFIG_FILE_ENV)
                .ok()
                .filter(|path| !path.is_empty())
                .map(PathBuf::from)
        });

        if let Some(path) = named {
            info!(path = %path.display(), "Loading configuration from explicit path");
            builder = builder.add_source(
                config::File::from(path)
                    .required(true)
                    .format(config::FileFormat::Yaml),
            );
        }

        let config = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Parse a configuration from YAML text alone.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Look up an integration by id.
    pub fn integration(&self, id: &str) -> Option<&IntegrationConfig> {
        self.integrations.iter().find(|i| i.id == id)
    }

    /// Callback URL of an integration: the explicit one, or one derived from
    /// `server.public_url`.
    pub fn callback_url(&self, integration: &IntegrationConfig) -> Option<String> {
        integration.callback_url.clone().or_else(|| {
            self.server
                .public_url
                .as_ref()
                .map(|base| format!("{}/webhook/{}", base.trim_end_matches('/'), integration.id))
        })
    }

    /// Build the credential provider, reading every secret.
    pub fn credential_provider(&self) -> Result<StaticCredentialProvider, ConfigError> {
        let mut provider = StaticCredentialProvider::new();
        for integration in &self.integrations {
            let credential = integration
                .credential
                .build()
                .map_err(|e| integration.invalid(e.to_string()))?;
            provider.insert(integration.id.clone(), credential);
        }
        Ok(provider)
    }

    /// Check the configuration against the provider catalog.
    ///
    /// Secrets are only checked for shape here; they are read when the
    /// credential provider is built.
    pub fn validate(&self, catalog: &ProviderCatalog) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::Invalid { message };

        if self.server.port == 0 {
            return Err(invalid("server.port must not be 0".to_string()));
        }
        if self.server.max_body_size == 0 {
            return Err(invalid("server.max_body_size must not be 0".to_string()));
        }
        if let Some(url) = &self.server.public_url {
            if !is_http_url(url) {
                return Err(invalid(format!(
                    "server.public_url must be an http(s) URL, got '{}'",
                    url
                )));
            }
        }
        if self.client.timeout_seconds == 0 {
            return Err(invalid("client.timeout_seconds must not be 0".to_string()));
        }
        if !(0.0..1.0).contains(&self.client.rate_limit_margin) {
            return Err(invalid(
                "client.rate_limit_margin must be in [0, 1)".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for integration in &self.integrations {
            integration.integration_id()?;
            if !seen.insert(integration.id.as_str()) {
                return Err(integration.invalid("id is used twice"));
            }

            let provider = catalog
                .require(&integration.provider)
                .map_err(|e| integration.invalid(e.to_string()))?;

            let events = integration.enabled_events()?;
            provider
                .validate_events(&events)
                .map_err(|e| integration.invalid(e.to_string()))?;

            if provider.webhook.is_some() {
                if events.is_empty() {
                    return Err(integration.invalid("webhook providers need enabled events"));
                }
                match self.callback_url(integration) {
                    Some(url) if is_http_url(&url) => {}
                    Some(url) => {
                        return Err(integration
                            .invalid(format!("callback_url must be http(s), got '{}'", url)))
                    }
                    None => {
                        return Err(integration
                            .invalid("set callback_url or server.public_url"))
                    }
                }
            }

            integration
                .credential
                .validate()
                .map_err(|message| integration.invalid(message))?;
        }

        Ok(())
    }
}

fn is_http_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    matches!(rest, Some(host) if !host.is_empty())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
