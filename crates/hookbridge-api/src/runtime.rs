//! Wiring from configuration to live components.
//!
//! [`Runtime::from_config`] resolves credentials, opens the registry and
//! builds, per integration, the request adapter, the lifecycle manager (for
//! providers with a webhook API) and the inbound endpoint (for providers that
//! call back). Both binaries start from here.

use crate::config::ServiceConfig;
use crate::errors::ConfigError;
use hookbridge_core::inbound::WebhookEndpoint;
use hookbridge_core::lifecycle::{LifecycleSettings, WebhookLifecycle};
use hookbridge_core::providers::{ProviderCatalog, ProviderDefinition};
use hookbridge_core::registry::SubscriptionStore;
use hookbridge_core::IntegrationId;
use hookbridge_sdk::client::ProviderClient;
use hookbridge_sdk::{CredentialProvider, SecretRef};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::info;

/// Live components of one integration.
#[derive(Debug, Clone)]
pub struct IntegrationRuntime {
    pub id: IntegrationId,
    pub provider: ProviderDefinition,
    pub client: ProviderClient,
    pub lifecycle: Option<WebhookLifecycle>,
    pub endpoint: Option<WebhookEndpoint>,
}

/// Every configured integration, ready to use.
#[derive(Clone)]
pub struct Runtime {
    pub catalog: ProviderCatalog,
    pub store: Arc<dyn SubscriptionStore>,
    pub credentials: Arc<dyn CredentialProvider>,
    integrations: BTreeMap<String, IntegrationRuntime>,
}

impl Runtime {
    /// Validate `config` and build every integration.
    pub async fn from_config(config: &ServiceConfig) -> Result<Self, ConfigError> {
        let catalog = config.providers.catalog().await?;
        config.validate(&catalog)?;

        let store = config.registry.open().await?;
        let credentials: Arc<dyn CredentialProvider> = Arc::new(config.credential_provider()?);

        Self::build(config, catalog, store, credentials)
    }

    /// Build with injected store and credentials. `config` must already be
    /// valid for `catalog`.
    pub fn build(
        config: &ServiceConfig,
        catalog: ProviderCatalog,
        store: Arc<dyn SubscriptionStore>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, ConfigError> {
        let mut integrations = BTreeMap::new();

        for integration in &config.integrations {
            let id = integration.integration_id()?;
            let invalid = |message: String| ConfigError::Integration {
                integration: integration.id.clone(),
                message,
            };

            let provider = catalog
                .require(&integration.provider)
                .map_err(|e| invalid(e.to_string()))?
                .clone();
            let client = provider
                .client(config.client.client_config())
                .map_err(|e| invalid(e.to_string()))?;

            let lifecycle = match (&provider.webhook, config.callback_url(integration)) {
                (Some(_), Some(callback_url)) => Some(
                    WebhookLifecycle::new(
                        LifecycleSettings {
                            integration: id.clone(),
                            callback_url,
                            events: integration.enabled_events()?,
                            verification_secret: integration
                                .verification_secret
                                .clone()
                                .map(SecretRef::new),
                        },
                        &provider,
                        client.clone(),
                        credentials.clone(),
                        store.clone(),
                    )
                    .map_err(|e| invalid(e.to_string()))?,
                ),
                _ => None,
            };

            let endpoint = match provider.inbound {
                Some(_) => Some(
                    WebhookEndpoint::new(id.clone(), &provider, credentials.clone(), store.clone())
                        .map_err(|e| invalid(e.to_string()))?,
                ),
                None => None,
            };

            info!(
                integration_id = %id,
                provider = %provider.name,
                webhook = lifecycle.is_some(),
                inbound = endpoint.is_some(),
                "Configured integration"
            );

            integrations.insert(
                integration.id.clone(),
                IntegrationRuntime {
                    id,
                    provider,
                    client,
                    lifecycle,
                    endpoint,
                },
            );
        }

        Ok(Self {
            catalog,
            store,
            credentials,
            integrations,
        })
    }

    /// Look up an integration.
    pub fn get(&self, id: &str) -> Option<&IntegrationRuntime> {
        self.integrations.get(id)
    }

    /// All integrations in id order.
    pub fn iter(&self) -> impl Iterator<Item = &IntegrationRuntime> {
        self.integrations.values()
    }

    /// Lifecycle managers of every webhook integration.
    pub fn lifecycles(&self) -> impl Iterator<Item = &WebhookLifecycle> {
        self.integrations.values().filter_map(|i| i.lifecycle.as_ref())
    }

    /// Inbound endpoints keyed by integration id.
    pub fn endpoints(&self) -> HashMap<String, WebhookEndpoint> {
        self.integrations
            .iter()
            .filter_map(|(id, i)| i.endpoint.clone().map(|e| (id.clone(), e)))
            .collect()
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
