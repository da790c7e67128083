//! # Subscription Registry
//!
//! One durable record per integration instance describing the provider-side
//! subscription the integration believes exists.
//!
//! The record is read and written through [`SubscriptionStore`]; a whole
//! record is always written in one `put`, so a reader never sees a
//! subscription id without its event filter or the reverse.
//!
//! Records written by older versions may lack fields, hold `null` or carry
//! tags that are no longer valid. Such records still load: missing or null
//! parts are empty and invalid tags are dropped, so the record accepts less
//! rather than failing every read.

use crate::{EventType, IntegrationId, Timestamp};
use async_trait::async_trait;
use hookbridge_sdk::SecretRef;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// The registry record of one integration.
///
/// `provider_subscription_id` is present exactly when a live provider-side
/// subscription is believed to exist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(default, deserialize_with = "lenient_subscription_id")]
    pub provider_subscription_id: Option<String>,

    #[serde(default, deserialize_with = "lenient_events")]
    pub enabled_events: BTreeSet<EventType>,

    /// Name of the credential secret inbound calls are verified with.
    #[serde(default)]
    pub verification_secret: Option<SecretRef>,

    #[serde(default)]
    pub registered_at: Option<Timestamp>,
}

impl Subscription {
    /// A record for a freshly registered subscription.
    pub fn registered(
        provider_subscription_id: impl Into<String>,
        enabled_events: BTreeSet<EventType>,
        verification_secret: Option<SecretRef>,
    ) -> Self {
        Self {
            provider_subscription_id: Some(provider_subscription_id.into()),
            enabled_events,
            verification_secret,
            registered_at: Some(Timestamp::now()),
        }
    }

    /// Whether a provider-side subscription is believed to exist.
    pub fn is_registered(&self) -> bool {
        self.provider_subscription_id.is_some()
    }

    /// Whether deliveries tagged `event` should be accepted.
    pub fn accepts(&self, event: &EventType) -> bool {
        self.enabled_events.contains(event)
    }
}

/// Blank ids count as absent; numeric ids are kept as text.
fn lenient_subscription_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(id)) if !id.trim().is_empty() => Some(id),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    })
}

/// `null` is an empty set; entries that are not valid tags are dropped.
fn lenient_events<'de, D>(deserializer: D) -> Result<BTreeSet<EventType>, D::Error>
where
    D: Deserializer<'de>,
{
    let events = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(events)) => events,
        _ => return Ok(BTreeSet::new()),
    };

    Ok(events
        .into_iter()
        .filter_map(|event| match event {
            Value::String(tag) => EventType::new(tag).ok(),
            _ => None,
        })
        .collect())
}

/// Errors raised by subscription stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Subscription store I/O failed: {message}")]
    Io { message: String },

    #[error("Subscription record for '{integration}' is unreadable: {message}")]
    Corrupt {
        integration: String,
        message: String,
    },

    #[error("Subscription store lock was poisoned")]
    LockPoisoned,
}

/// Persistence boundary for subscription records, keyed by integration.
///
/// Durability and cross-process concurrency are the implementation's
/// concern. `put` must replace the whole record atomically.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Load the record, `None` if the integration has none.
    async fn get(&self, integration: &IntegrationId) -> Result<Option<Subscription>, StoreError>;

    /// Replace the record.
    async fn put(
        &self,
        integration: &IntegrationId,
        subscription: &Subscription,
    ) -> Result<(), StoreError>;

    /// Remove the record. Removing an absent record is not an error.
    async fn delete(&self, integration: &IntegrationId) -> Result<(), StoreError>;
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
