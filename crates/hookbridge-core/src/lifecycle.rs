//! # Webhook Lifecycle Manager
//!
//! Keeps one integration's provider-side subscription in step with its
//! registry record. The state machine has two states:
//!
//! ```text
//!                 create() ok
//!   Unregistered ─────────────► Registered
//!        ▲                          │
//!        └──────────────────────────┘
//!          delete() ok or NotFound
//! ```
//!
//! `check_exists` never transitions on its own, except when it discovers a
//! subscription the provider already holds for this callback URL and adopts
//! its id (self-healing).
//!
//! Nothing here retries. `RateLimited` and `Transport` failures surface to
//! the caller, who owns backoff.

use crate::providers::{IdSource, ListEndpoint, ProviderDefinition, WebhookApi};
use crate::registry::{StoreError, Subscription, SubscriptionStore};
use crate::template::{TemplateContext, TemplateError};
use crate::{EventType, IntegrationId, ValidationError};
use hookbridge_sdk::client::ProviderClient;
use hookbridge_sdk::{Credential, CredentialError, CredentialProvider, NormalizedError, SecretRef};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Errors surfaced by lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// A provider call failed; the display carries kind and status code.
    #[error("Provider call '{operation}' failed: {source}")]
    Provider {
        operation: &'static str,
        #[source]
        source: NormalizedError,
    },

    #[error("Provider accepted the registration of '{integration}' but returned no subscription id")]
    RegistrationIncomplete { integration: String },

    #[error("Subscription '{subscription_id}' of '{integration}' is no longer known to the provider")]
    StaleSubscription {
        integration: String,
        subscription_id: String,
    },

    #[error("Provider '{provider}' does not support {operation}")]
    Unsupported {
        provider: String,
        operation: &'static str,
    },

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl LifecycleError {
    fn provider(operation: &'static str, source: NormalizedError) -> Self {
        Self::Provider { operation, source }
    }

    /// The normalized provider error, if this is one.
    pub fn normalized(&self) -> Option<&NormalizedError> {
        match self {
            Self::Provider { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Per-integration settings of a lifecycle manager.
#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    pub integration: IntegrationId,

    /// Public URL the provider should deliver to.
    pub callback_url: String,

    pub events: BTreeSet<EventType>,

    /// Credential secret inbound calls are verified with, recorded on the
    /// subscription. Defaults to the provider's declared secret.
    pub verification_secret: Option<SecretRef>,
}

/// A webhook as listed by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteWebhook {
    pub id: String,
    pub callback_url: Option<String>,
}

/// Lifecycle manager for one integration.
///
/// # Examples
///
/// ```rust,no_run
/// use hookbridge_core::adapters::InMemorySubscriptionStore;
/// use hookbridge_core::lifecycle::{LifecycleSettings, WebhookLifecycle};
/// use hookbridge_core::providers::ProviderCatalog;
/// use hookbridge_core::{EventType, IntegrationId};
/// use hookbridge_sdk::client::ClientConfig;
/// use hookbridge_sdk::StaticCredentialProvider;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let catalog = ProviderCatalog::builtin();
/// let provider = catalog.require("twitter")?;
///
/// let lifecycle = WebhookLifecycle::new(
///     LifecycleSettings {
///         integration: IntegrationId::new("twitter")?,
///         callback_url: "https://hooks.example.com/webhook/twitter".to_string(),
///         events: [EventType::new("likedTweet")?].into(),
///         verification_secret: None,
///     },
///     provider,
///     provider.client(ClientConfig::default())?,
///     Arc::new(StaticCredentialProvider::new()),
///     Arc::new(InMemorySubscriptionStore::new()),
/// )?;
///
/// if lifecycle.ensure_registered().await? {
///     println!("subscribed");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct WebhookLifecycle {
    settings: LifecycleSettings,
    provider_name: String,
    webhook: WebhookApi,
    client: ProviderClient,
    credentials: Arc<dyn CredentialProvider>,
    store: Arc<dyn SubscriptionStore>,
}

impl WebhookLifecycle {
    /// Create a lifecycle manager.
    ///
    /// # Errors
    ///
    /// Fails when the provider has no webhook API or when an enabled event is
    /// not in the provider's catalog.
    pub fn new(
        mut settings: LifecycleSettings,
        provider: &ProviderDefinition,
        client: ProviderClient,
        credentials: Arc<dyn CredentialProvider>,
        store: Arc<dyn SubscriptionStore>,
    ) -> Result<Self, LifecycleError> {
        let webhook = provider
            .webhook
            .clone()
            .ok_or_else(|| LifecycleError::Unsupported {
                provider: provider.name.clone(),
                operation: "webhook subscriptions",
            })?;

        if settings.callback_url.is_empty() {
            return Err(ValidationError::Required {
                field: "callback_url".to_string(),
            }
            .into());
        }
        if settings.events.is_empty() {
            return Err(ValidationError::Required {
                field: "events".to_string(),
            }
            .into());
        }
        provider.validate_events(&settings.events)?;

        if settings.verification_secret.is_none() {
            settings.verification_secret = provider
                .inbound
                .as_ref()
                .and_then(|inbound| inbound.signature.as_ref())
                .map(|signature| SecretRef::new(signature.secret.clone()));
        }

        Ok(Self {
            settings,
            provider_name: provider.name.clone(),
            webhook,
            client,
            credentials,
            store,
        })
    }

    /// The integration this manager owns.
    pub fn integration(&self) -> &IntegrationId {
        &self.settings.integration
    }

    /// Name of the provider.
    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    /// The callback URL registered with the provider.
    pub fn callback_url(&self) -> &str {
        &self.settings.callback_url
    }

    /// Events this integration enables.
    pub fn enabled_events(&self) -> &BTreeSet<EventType> {
        &self.settings.events
    }

    /// The current registry record.
    pub async fn subscription(&self) -> Result<Option<Subscription>, LifecycleError> {
        Ok(self.store.get(&self.settings.integration).await?)
    }

    /// Whether a provider-side subscription exists for this integration.
    ///
    /// Cache-first: a locally known subscription id answers `true` without a
    /// provider call. Otherwise the provider's webhook list (if it has one)
    /// is searched for this integration's callback URL, and a match is
    /// adopted into the registry together with the enabled events.
    ///
    /// # Errors
    ///
    /// A provider `NotFound` means "does not exist" and yields `Ok(false)`.
    /// Every other provider failure is surfaced.
    #[instrument(skip(self), fields(integration_id = %self.settings.integration, provider = %self.provider_name))]
    pub async fn check_exists(&self) -> Result<bool, LifecycleError> {
        let record = self.subscription().await?;
        if let Some(id) = record.as_ref().and_then(|r| r.provider_subscription_id.as_ref()) {
            debug!(subscription_id = %id, "Subscription known locally");
            return Ok(true);
        }

        self.discover(record).await
    }

    /// Register the callback URL with the provider.
    ///
    /// Issues the registration call and, for providers that separate the two
    /// resources, the dependent subscription call. The id and enabled events
    /// are then written in one registry `put`.
    ///
    /// Returns `Ok(false)` when the provider answers without an id.
    ///
    /// # Errors
    ///
    /// Provider failures surface. If the dependent call fails, the webhook
    /// just created is deleted on a best-effort basis and nothing is
    /// persisted.
    #[instrument(skip(self), fields(integration_id = %self.settings.integration, provider = %self.provider_name))]
    pub async fn create(&self) -> Result<bool, LifecycleError> {
        let credential = self.credential().await?;
        let context = self.context(&credential, None);

        let request = self.webhook.create.render(&context)?;
        let response = self
            .client
            .request(&request, &credential)
            .await
            .map_err(|e| LifecycleError::provider("create", e))?;

        let Some(subscription_id) = self.extract_id(&response, &context)? else {
            let incomplete = LifecycleError::RegistrationIncomplete {
                integration: self.settings.integration.to_string(),
            };
            warn!(error = %incomplete, "Registration returned no subscription id");
            return Ok(false);
        };

        if let Some(subscribe) = &self.webhook.subscribe {
            let context = self.context(&credential, Some(&subscription_id));
            let request = subscribe.render(&context)?;

            if let Err(error) = self.client.request(&request, &credential).await {
                warn!(
                    subscription_id = %subscription_id,
                    error_kind = %error.kind,
                    status_code = ?error.status_code,
                    "Dependent subscription call failed; removing the new webhook"
                );
                self.rollback(&credential, &subscription_id).await;
                return Err(LifecycleError::provider("subscribe", error));
            }
        }

        let record = Subscription::registered(
            subscription_id.clone(),
            self.settings.events.clone(),
            self.settings.verification_secret.clone(),
        );
        self.store.put(&self.settings.integration, &record).await?;

        info!(
            subscription_id = %subscription_id,
            events = self.settings.events.len(),
            "Webhook registered"
        );
        Ok(true)
    }

    /// Remove the provider-side subscription.
    ///
    /// Idempotent: without a local id nothing is sent and the result is
    /// `Ok(true)`. A provider `NotFound` counts as success and clears the
    /// record. Any other provider failure leaves the record untouched and
    /// returns `Ok(false)` so the caller can retry later.
    #[instrument(skip(self), fields(integration_id = %self.settings.integration, provider = %self.provider_name))]
    pub async fn delete(&self) -> Result<bool, LifecycleError> {
        let record = self.subscription().await?;
        let Some(subscription_id) = record.and_then(|r| r.provider_subscription_id) else {
            debug!("No subscription id recorded; nothing to delete");
            return Ok(true);
        };

        let credential = self.credential().await?;
        let context = self.context(&credential, Some(&subscription_id));
        let request = self.webhook.delete.render(&context)?;

        match self.client.request(&request, &credential).await {
            Ok(_) => info!(subscription_id = %subscription_id, "Webhook deleted"),
            Err(error) if error.is_not_found() => {
                info!(subscription_id = %subscription_id, "Webhook already gone at provider")
            }
            Err(error) => {
                warn!(
                    subscription_id = %subscription_id,
                    error_kind = %error.kind,
                    status_code = ?error.status_code,
                    error = %error,
                    "Webhook delete failed; keeping local record"
                );
                return Ok(false);
            }
        }

        self.store.delete(&self.settings.integration).await?;
        Ok(true)
    }

    /// Check the local record against the provider, bypassing the cache.
    ///
    /// Without a local id this behaves like the remote half of
    /// [`check_exists`](Self::check_exists).
    ///
    /// # Errors
    ///
    /// [`LifecycleError::StaleSubscription`] when the provider no longer
    /// lists the recorded id; [`LifecycleError::Unsupported`] when the
    /// provider has no list endpoint.
    #[instrument(skip(self), fields(integration_id = %self.settings.integration, provider = %self.provider_name))]
    pub async fn verify_remote(&self) -> Result<bool, LifecycleError> {
        let list = self.list_endpoint()?;
        let record = self.subscription().await?;

        let Some(subscription_id) = record
            .as_ref()
            .and_then(|r| r.provider_subscription_id.clone())
        else {
            return self.discover(record).await;
        };

        let credential = self.credential().await?;
        let remote = match self.list_remote(list, &credential).await {
            Ok(remote) => remote,
            Err(error) if error.is_not_found() => Vec::new(),
            Err(error) => return Err(LifecycleError::provider("list", error)),
        };

        if remote.iter().any(|webhook| webhook.id == subscription_id) {
            debug!(subscription_id = %subscription_id, "Subscription confirmed by provider");
            Ok(true)
        } else {
            Err(LifecycleError::StaleSubscription {
                integration: self.settings.integration.to_string(),
                subscription_id,
            })
        }
    }

    /// `check_exists`, then `create` when nothing exists.
    pub async fn ensure_registered(&self) -> Result<bool, LifecycleError> {
        if self.check_exists().await? {
            return Ok(true);
        }
        self.create().await
    }

    /// The provider's current webhooks.
    pub async fn remote_webhooks(&self) -> Result<Vec<RemoteWebhook>, LifecycleError> {
        let list = self.list_endpoint()?;
        let credential = self.credential().await?;
        self.list_remote(list, &credential)
            .await
            .map_err(|e| LifecycleError::provider("list", e))
    }

    async fn discover(&self, record: Option<Subscription>) -> Result<bool, LifecycleError> {
        let Some(list) = &self.webhook.list else {
            debug!("Provider has no list endpoint; assuming no subscription");
            return Ok(false);
        };

        let credential = self.credential().await?;
        let remote = match self.list_remote(list, &credential).await {
            Ok(remote) => remote,
            Err(error) if error.is_not_found() => {
                debug!("Provider reports no webhooks");
                return Ok(false);
            }
            Err(error) => return Err(LifecycleError::provider("list", error)),
        };

        let Some(found) = remote
            .into_iter()
            .find(|webhook| webhook.callback_url.as_deref() == Some(self.callback_url()))
        else {
            return Ok(false);
        };

        let adopted = Subscription {
            verification_secret: record
                .and_then(|r| r.verification_secret)
                .or_else(|| self.settings.verification_secret.clone()),
            ..Subscription::registered(found.id.clone(), self.settings.events.clone(), None)
        };
        self.store.put(&self.settings.integration, &adopted).await?;

        info!(subscription_id = %found.id, "Adopted existing provider subscription");
        Ok(true)
    }

    async fn list_remote(
        &self,
        list: &ListEndpoint,
        credential: &Credential,
    ) -> Result<Vec<RemoteWebhook>, NormalizedError> {
        let context = self.context(credential, None);
        let request = list
            .request
            .render(&context)
            .map_err(|e| NormalizedError::unknown(None, e.to_string()))?;
        let body = self.client.request(&request, credential).await?;

        let entries = match list.items_path.lookup(&body) {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(single @ Value::Object(_)) => vec![single.clone()],
            Some(other) => {
                return Err(NormalizedError::unknown(
                    None,
                    format!(
                        "webhook list at '{}' should be an array, got {}",
                        list.items_path, other
                    ),
                ))
            }
        };

        Ok(entries
            .iter()
            .filter_map(|entry| {
                Some(RemoteWebhook {
                    id: list.id_path.lookup_string(entry)?,
                    callback_url: list.callback_path.lookup_string(entry),
                })
            })
            .collect())
    }

    async fn rollback(&self, credential: &Credential, subscription_id: &str) {
        let context = self.context(credential, Some(subscription_id));
        let request = match self.webhook.delete.render(&context) {
            Ok(request) => request,
            Err(error) => {
                warn!(error = %error, "Cannot render rollback delete");
                return;
            }
        };

        match self.client.request(&request, credential).await {
            Ok(_) => debug!(subscription_id = %subscription_id, "Rolled back new webhook"),
            Err(error) => warn!(
                subscription_id = %subscription_id,
                error_kind = %error.kind,
                status_code = ?error.status_code,
                "Rollback delete failed; provider may hold an orphaned webhook"
            ),
        }
    }

    fn extract_id(
        &self,
        response: &Value,
        context: &TemplateContext,
    ) -> Result<Option<String>, TemplateError> {
        match &self.webhook.id {
            IdSource::Response { path } => {
                Ok(path.lookup_string(response).filter(|id| !id.is_empty()))
            }
            IdSource::Template {
                value,
                success_path,
            } => {
                let confirmed = success_path
                    .as_ref()
                    .map_or(true, |path| path.lookup(response) == Some(&Value::Bool(true)));
                if confirmed {
                    Ok(Some(context.render_str(value)?))
                } else {
                    Ok(None)
                }
            }
        }
    }

    fn list_endpoint(&self) -> Result<&ListEndpoint, LifecycleError> {
        self.webhook
            .list
            .as_ref()
            .ok_or_else(|| LifecycleError::Unsupported {
                provider: self.provider_name.clone(),
                operation: "listing webhooks",
            })
    }

    async fn credential(&self) -> Result<Credential, CredentialError> {
        self.credentials
            .credential(self.settings.integration.as_str())
            .await
    }

    fn context(&self, credential: &Credential, subscription_id: Option<&str>) -> TemplateContext {
        TemplateContext::for_integration(
            credential,
            &self.settings.callback_url,
            subscription_id,
            &self.settings.events,
        )
    }
}

impl fmt::Debug for WebhookLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookLifecycle")
            .field("integration", &self.settings.integration)
            .field("provider", &self.provider_name)
            .field("callback_url", &self.settings.callback_url)
            .field("events", &self.settings.events)
            .finish()
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
