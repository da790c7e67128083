//! # Hookbridge Core
//!
//! Domain logic shared by every connector: the provider catalog, the
//! subscription registry, the webhook lifecycle state machine, event
//! dispatch and the inbound webhook endpoint.
//!
//! ## Architecture
//!
//! - Outbound calls go through the SDK's single request adapter
//!   ([`hookbridge_sdk::client::ProviderClient`])
//! - Credentials and subscription records sit behind traits
//!   ([`hookbridge_sdk::CredentialProvider`], [`registry::SubscriptionStore`])
//!   and are injected at runtime
//! - Provider differences are data ([`providers::ProviderDefinition`]), not
//!   code
//!
//! ## Usage
//!
//! ```rust
//! use hookbridge_core::{EventType, IntegrationId};
//!
//! let id = IntegrationId::new("twitter-mentions").unwrap();
//! let event = EventType::new("likedTweet").unwrap();
//! assert_eq!(id.as_str(), "twitter-mentions");
//! assert_eq!(event.to_string(), "likedTweet");
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod adapters;
pub mod dispatch;
pub mod inbound;
pub mod lifecycle;
pub mod providers;
pub mod registry;
pub mod template;

pub use ulid::Ulid;

// ============================================================================
// Domain Identifier Types
// ============================================================================

/// Unique identifier for an accepted event.
///
/// Uses ULID for lexicographic sorting and global uniqueness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(Ulid);

impl EventId {
    /// Generate a new unique event ID
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Get string representation of event ID
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EventId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ulid = s.parse::<Ulid>().map_err(|_| ValidationError::InvalidFormat {
            field: "event_id".to_string(),
            message: format!("expected ULID, got '{}'", s),
        })?;
        Ok(Self(ulid))
    }
}

/// Identity of one configured integration instance.
///
/// Keys the subscription registry and appears verbatim in the inbound route
/// `/webhook/{integration_id}`, so it must be URL-safe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IntegrationId(String);

impl IntegrationId {
    /// Create new integration ID with validation
    ///
    /// # Validation Rules
    /// - Must be 1-64 characters
    /// - Must contain only lowercase alphanumeric characters, hyphens and
    ///   underscores
    /// - Must not start or end with a hyphen
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();

        if id.is_empty() {
            return Err(ValidationError::Required {
                field: "integration_id".to_string(),
            });
        }

        if id.len() > 64 {
            return Err(ValidationError::TooLong {
                field: "integration_id".to_string(),
                max_length: 64,
            });
        }

        if !id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        {
            return Err(ValidationError::InvalidCharacters {
                field: "integration_id".to_string(),
                invalid_chars: "anything but lowercase alphanumeric, hyphens or underscores"
                    .to_string(),
            });
        }

        if id.starts_with('-') || id.ends_with('-') {
            return Err(ValidationError::InvalidFormat {
                field: "integration_id".to_string(),
                message: "cannot start or end with a hyphen".to_string(),
            });
        }

        Ok(Self(id))
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IntegrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for IntegrationId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for IntegrationId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<IntegrationId> for String {
    fn from(id: IntegrationId) -> Self {
        id.0
    }
}

/// A tag from a provider's closed event catalog, e.g. `likedTweet` or
/// `leadgen`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventType(String);

impl EventType {
    /// Create an event type. Tags are case sensitive and may not be blank.
    pub fn new(tag: impl Into<String>) -> Result<Self, ValidationError> {
        let tag = tag.into();

        if tag.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "event_type".to_string(),
            });
        }

        if tag.len() > 128 {
            return Err(ValidationError::TooLong {
                field: "event_type".to_string(),
                max_length: 128,
            });
        }

        Ok(Self(tag))
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EventType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for EventType {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EventType> for String {
    fn from(event: EventType) -> Self {
        event.0
    }
}

// ============================================================================
// Time Types
// ============================================================================

/// UTC timestamp with microsecond precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current moment
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Parse timestamp from RFC3339 string
    pub fn from_rfc3339(s: &str) -> Result<Self, ValidationError> {
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|_| ValidationError::InvalidFormat {
                field: "timestamp".to_string(),
                message: format!("expected RFC3339 datetime, got '{}'", s),
            })?
            .with_timezone(&Utc);
        Ok(Self(dt))
    }

    /// Convert to RFC3339 string
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// Get underlying DateTime
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error type for input and configuration validation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' has invalid format: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Field '{field}' exceeds maximum length of {max_length}")]
    TooLong { field: String, max_length: usize },

    #[error("Field '{field}' contains invalid characters: {invalid_chars}")]
    InvalidCharacters {
        field: String,
        invalid_chars: String,
    },

    #[error("Provider '{provider}' does not offer event '{event}'")]
    UnsupportedEvent { provider: String, event: String },

    #[error("Unknown provider '{provider}'")]
    UnknownProvider { provider: String },
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
