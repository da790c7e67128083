//! # In-Memory Subscription Store
//!
//! Thread-safe in-memory implementation for testing and development.

use crate::registry::{StoreError, Subscription, SubscriptionStore};
use crate::IntegrationId;
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

/// In-memory subscription store.
///
/// Uses RwLock for concurrent access; clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct InMemorySubscriptionStore {
    records: Arc<RwLock<HashMap<IntegrationId, Subscription>>>,
}

impl InMemorySubscriptionStore {
    /// Create new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with records
    pub fn with_records(records: HashMap<IntegrationId, Subscription>) -> Self {
        Self {
            records: Arc::new(RwLock::new(records)),
        }
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn get(&self, integration: &IntegrationId) -> Result<Option<Subscription>, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(records.get(integration).cloned())
    }

    async fn put(
        &self,
        integration: &IntegrationId,
        subscription: &Subscription,
    ) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::LockPoisoned)?;
        records.insert(integration.clone(), subscription.clone());
        Ok(())
    }

    async fn delete(&self, integration: &IntegrationId) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::LockPoisoned)?;
        records.remove(integration);
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_store_tests.rs"]
mod tests;
