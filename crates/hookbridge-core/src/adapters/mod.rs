//! # Infrastructure Adapters
//!
//! Implementations of the [`SubscriptionStore`](crate::registry::SubscriptionStore)
//! boundary.

pub mod filesystem_store;
pub mod memory_store;

pub use filesystem_store::FilesystemSubscriptionStore;
pub use memory_store::InMemorySubscriptionStore;
