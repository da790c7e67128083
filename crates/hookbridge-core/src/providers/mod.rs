//! # Provider Definitions
//!
//! Everything that differs between providers is declared as data:
//!
//! | Section        | Drives                                                   |
//! |----------------|----------------------------------------------------------|
//! | `base_url`     | Request adapter base (versioned)                         |
//! | `error_mapping`| Where the error envelope keeps its message and code      |
//! | `pagination`   | The cursor contract for bulk reads                       |
//! | `events`       | The closed event catalog integrations choose from        |
//! | `webhook`      | Lifecycle endpoints (create, dependent subscribe, delete, list) |
//! | `inbound`      | Handshake, delivery signature and event tag source       |
//!
//! Definitions are plain serde types, so operators can add providers from a
//! YAML file without touching code. The built-in catalog lives in
//! [`builtin`].
//!
//! # Examples
//!
//! ```rust
//! use hookbridge_core::providers::ProviderCatalog;
//!
//! let catalog = ProviderCatalog::builtin();
//! let twitter = catalog.get("twitter").unwrap();
//! assert!(twitter.webhook.is_some());
//! assert!(twitter.validate().is_ok());
//! ```

pub mod builtin;

use crate::dispatch::TagSource;
use crate::template::EndpointTemplate;
use crate::{EventType, ValidationError};
use hookbridge_sdk::client::{
    ClientConfig, ErrorMapping, PaginationStyle, ProviderClient, SinglePage,
};
use hookbridge_sdk::webhook::{ChallengeMode, SignatureScheme};
use hookbridge_sdk::{FieldPath, NormalizedError};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Errors raised while loading or validating provider definitions.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider '{provider}' is invalid: {message}")]
    InvalidDefinition { provider: String, message: String },

    #[error("Failed to parse provider definitions: {message}")]
    Parse { message: String },

    #[error("Failed to read provider definitions: {message}")]
    Io { message: String },
}

/// How the provider-side id of a new subscription is obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "from", rename_all = "snake_case")]
pub enum IdSource {
    /// Read from the create response.
    Response { path: FieldPath },

    /// Rendered from a template, for providers whose create call answers
    /// `{"success": true}` and address the subscription by a known key.
    ///
    /// With `success_path` set, the id is only produced when that field of
    /// the response is `true`.
    Template {
        value: String,

        #[serde(default)]
        success_path: Option<FieldPath>,
    },
}

/// Endpoint listing the provider's current webhooks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListEndpoint {
    #[serde(flatten)]
    pub request: EndpointTemplate,

    /// Where the webhook entries live in the response.
    #[serde(default = "FieldPath::root")]
    pub items_path: FieldPath,

    /// Id of an entry.
    pub id_path: FieldPath,

    /// Callback URL of an entry, matched against the integration's.
    pub callback_path: FieldPath,
}

/// Lifecycle endpoints of a provider that pushes events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookApi {
    /// Registers the callback URL.
    pub create: EndpointTemplate,

    /// Where the new subscription's id comes from.
    pub id: IdSource,

    /// Dependent call for providers that separate the webhook from the
    /// subscription (Twitter). Sent only after `create` succeeds; the
    /// `{subscription_id}` placeholder is available.
    #[serde(default)]
    pub subscribe: Option<EndpointTemplate>,

    pub delete: EndpointTemplate,

    #[serde(default)]
    pub list: Option<ListEndpoint>,

    /// Upper bound on enabled events per integration (ConvertKit registers
    /// one hook per event).
    #[serde(default)]
    pub max_events: Option<usize>,
}

/// Optional verify token a provider sends with its handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyTokenSpec {
    /// Query parameter carrying the token, e.g. `hub.verify_token`.
    pub param: String,

    /// Credential secret the token must equal.
    pub secret: String,
}

/// How a provider performs its handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeSpec {
    /// Query parameter carrying the challenge token, e.g. `crc_token`.
    pub token_param: String,

    #[serde(flatten)]
    pub response: ChallengeMode,

    /// Credential secret used by signed handshakes.
    #[serde(default)]
    pub secret: Option<String>,

    #[serde(default)]
    pub verify_token: Option<VerifyTokenSpec>,
}

/// Inbound call handling for a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundSpec {
    pub tag: TagSource,

    #[serde(default)]
    pub challenge: Option<ChallengeSpec>,

    #[serde(default)]
    pub signature: Option<SignatureScheme>,
}

/// Declarative description of one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderDefinition {
    /// URL-safe provider name (`[a-z0-9\-_]+`).
    pub name: String,

    /// API base URL including the version segment.
    pub base_url: String,

    #[serde(default)]
    pub error_mapping: ErrorMapping,

    /// Defaults to a single page whose body is the item array.
    #[serde(default)]
    pub pagination: Option<PaginationStyle>,

    /// Events integrations of this provider may enable.
    #[serde(default)]
    pub events: Vec<EventType>,

    #[serde(default)]
    pub webhook: Option<WebhookApi>,

    #[serde(default)]
    pub inbound: Option<InboundSpec>,
}

impl ProviderDefinition {
    /// Validate this definition for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidDefinition`] describing the first
    /// problem found.
    pub fn validate(&self) -> Result<(), ProviderError> {
        let invalid = |message: String| ProviderError::InvalidDefinition {
            provider: self.name.clone(),
            message,
        };

        if self.name.is_empty()
            || !self
                .name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        {
            return Err(invalid(
                "name must be non-empty lowercase alphanumeric, hyphens or underscores"
                    .to_string(),
            ));
        }

        let url = Url::parse(&self.base_url)
            .map_err(|e| invalid(format!("base_url '{}' is not a URL: {}", self.base_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!(
                "base_url must be http or https, got '{}'",
                url.scheme()
            )));
        }

        let unique: BTreeSet<&EventType> = self.events.iter().collect();
        if unique.len() != self.events.len() {
            return Err(invalid("event catalog lists an event twice".to_string()));
        }

        if let Some(webhook) = &self.webhook {
            if self.events.is_empty() {
                return Err(invalid(
                    "providers with a webhook API need an event catalog".to_string(),
                ));
            }
            if webhook.max_events == Some(0) {
                return Err(invalid("max_events must be at least 1".to_string()));
            }
        }

        if let Some(inbound) = &self.inbound {
            if inbound.tag == TagSource::Registered
                && self.webhook.as_ref().and_then(|w| w.max_events) != Some(1)
            {
                return Err(invalid(
                    "registered tags need a webhook API limited to one event".to_string(),
                ));
            }

            if let Some(challenge) = &inbound.challenge {
                if challenge.token_param.is_empty() {
                    return Err(invalid("challenge token_param must not be empty".to_string()));
                }
                if challenge.response.requires_secret() && challenge.secret.is_none() {
                    return Err(invalid(
                        "signed challenges must name the credential secret".to_string(),
                    ));
                }
            }

            if let Some(signature) = &inbound.signature {
                if signature.header.is_empty() || signature.secret.is_empty() {
                    return Err(invalid(
                        "signature header and secret must not be empty".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Whether `event` is in the catalog.
    pub fn supports_event(&self, event: &EventType) -> bool {
        self.events.contains(event)
    }

    /// Check a set of enabled events against the catalog and the per
    /// integration limit.
    pub fn validate_events(&self, events: &BTreeSet<EventType>) -> Result<(), ValidationError> {
        if let Some(unknown) = events.iter().find(|e| !self.supports_event(e)) {
            return Err(ValidationError::UnsupportedEvent {
                provider: self.name.clone(),
                event: unknown.to_string(),
            });
        }

        if let Some(max) = self.webhook.as_ref().and_then(|w| w.max_events) {
            if events.len() > max {
                return Err(ValidationError::InvalidFormat {
                    field: "events".to_string(),
                    message: format!(
                        "provider '{}' allows at most {} event(s) per integration, got {}",
                        self.name,
                        max,
                        events.len()
                    ),
                });
            }
        }

        Ok(())
    }

    /// The cursor contract for bulk reads.
    pub fn pagination(&self) -> PaginationStyle {
        self.pagination.clone().unwrap_or_else(|| {
            PaginationStyle::Single(SinglePage {
                items_path: FieldPath::root(),
            })
        })
    }

    /// Build the request adapter for this provider.
    pub fn client(&self, config: ClientConfig) -> Result<ProviderClient, NormalizedError> {
        ProviderClient::builder(self.base_url.clone())
            .config(config)
            .error_mapping(self.error_mapping.clone())
            .build()
    }
}

/// Provider definitions by name.
#[derive(Debug, Clone, Default)]
pub struct ProviderCatalog {
    providers: BTreeMap<String, ProviderDefinition>,
}

impl ProviderCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in providers.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        for definition in builtin::all() {
            catalog.providers.insert(definition.name.clone(), definition);
        }
        catalog
    }

    /// Add or replace a definition after validating it.
    pub fn insert(&mut self, definition: ProviderDefinition) -> Result<(), ProviderError> {
        definition.validate()?;
        self.providers.insert(definition.name.clone(), definition);
        Ok(())
    }

    /// Add every definition from a YAML list.
    ///
    /// Nothing is added unless every definition is valid.
    pub fn extend_from_yaml(&mut self, yaml: &str) -> Result<usize, ProviderError> {
        let definitions: Vec<ProviderDefinition> =
            serde_yaml::from_str(yaml).map_err(|e| ProviderError::Parse {
                message: e.to_string(),
            })?;

        for definition in &definitions {
            definition.validate()?;
        }

        let count = definitions.len();
        for definition in definitions {
            self.providers.insert(definition.name.clone(), definition);
        }
        Ok(count)
    }

    /// Add every definition from a YAML file.
    pub async fn extend_from_file(&mut self, path: &Path) -> Result<usize, ProviderError> {
        let yaml = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ProviderError::Io {
                message: format!("{}: {}", path.display(), e),
            })?;
        self.extend_from_yaml(&yaml)
    }

    /// Look up a provider.
    pub fn get(&self, name: &str) -> Option<&ProviderDefinition> {
        self.providers.get(name)
    }

    /// Look up a provider, failing with a validation error.
    pub fn require(&self, name: &str) -> Result<&ProviderDefinition, ValidationError> {
        self.get(name).ok_or_else(|| ValidationError::UnknownProvider {
            provider: name.to_string(),
        })
    }

    /// All definitions in name order.
    pub fn iter(&self) -> impl Iterator<Item = &ProviderDefinition> {
        self.providers.values()
    }

    /// Number of definitions.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
