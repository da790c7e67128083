//! Event filtering for inbound deliveries.
//!
//! A delivery is accepted only when its event tag is one of the integration's
//! enabled events. The dispatcher is a filter, not a validator: anything it
//! cannot tag, or any subscription it cannot read, results in nothing being
//! accepted rather than an error.

use crate::registry::Subscription;
use crate::{EventId, EventType, Timestamp};
use hookbridge_sdk::FieldPath;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Maps a top-level key to the tag its presence implies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyTag {
    pub key: String,
    pub tag: EventType,
}

/// Where a provider puts the event tag of a delivery.
///
/// | Source         | Example                                               |
/// |----------------|-------------------------------------------------------|
/// | `Field`        | Facebook `entry.0.changes.0.field` (`leadgen`)        |
/// | `KeyPresence`  | Twitter `favorite_events` present means `likedTweet`  |
/// | `Registered`   | ConvertKit: one hook per event, so the tag is the integration's only enabled event |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "from", rename_all = "snake_case")]
pub enum TagSource {
    Field { path: FieldPath },
    KeyPresence { keys: Vec<KeyTag> },
    Registered,
}

/// A delivery that passed the event filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptedEvent {
    pub event_id: EventId,
    pub event_type: EventType,
    pub received_at: Timestamp,
    pub payload: Value,
}

/// Filters deliveries by the subscription's enabled events.
///
/// # Examples
///
/// ```rust
/// use hookbridge_core::dispatch::{EventDispatcher, TagSource};
/// use hookbridge_core::registry::Subscription;
/// use hookbridge_core::EventType;
/// use serde_json::json;
///
/// let dispatcher = EventDispatcher::new(TagSource::Field { path: "type".into() });
/// let subscription = Subscription::registered(
///     "hook-1",
///     [EventType::new("contact.creation").unwrap()].into(),
///     None,
/// );
///
/// let accepted = dispatcher.dispatch(&json!({"type": "contact.creation"}), Some(&subscription));
/// assert_eq!(accepted.len(), 1);
///
/// let dropped = dispatcher.dispatch(&json!({"type": "deal.creation"}), Some(&subscription));
/// assert!(dropped.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    source: TagSource,
}

impl EventDispatcher {
    /// Create a dispatcher reading tags from `source`.
    pub fn new(source: TagSource) -> Self {
        Self { source }
    }

    /// The tag source in use.
    pub fn source(&self) -> &TagSource {
        &self.source
    }

    /// Extract the event tag of a delivery.
    ///
    /// `Registered` needs the subscription to name exactly one event.
    pub fn tag(&self, payload: &Value, subscription: Option<&Subscription>) -> Option<EventType> {
        match &self.source {
            TagSource::Field { path } => path
                .lookup_string(payload)
                .and_then(|tag| EventType::new(tag).ok()),
            TagSource::KeyPresence { keys } => {
                let object = payload.as_object()?;
                keys.iter()
                    .find(|entry| object.contains_key(&entry.key))
                    .map(|entry| entry.tag.clone())
            }
            TagSource::Registered => {
                let events = &subscription?.enabled_events;
                if events.len() == 1 {
                    events.iter().next().cloned()
                } else {
                    None
                }
            }
        }
    }

    /// Accept the delivery iff its tag is enabled on the subscription.
    ///
    /// An absent subscription, an empty event set or an untaggable payload
    /// all yield an empty result.
    pub fn dispatch(
        &self,
        payload: &Value,
        subscription: Option<&Subscription>,
    ) -> Vec<AcceptedEvent> {
        let Some(subscription) = subscription else {
            debug!("No subscription record; delivery dropped");
            return Vec::new();
        };

        let Some(event_type) = self.tag(payload, Some(subscription)) else {
            debug!("Delivery carries no recognizable event tag; dropped");
            return Vec::new();
        };

        if !subscription.accepts(&event_type) {
            debug!(event_type = %event_type, "Event not enabled; delivery dropped");
            return Vec::new();
        }

        vec![AcceptedEvent {
            event_id: EventId::new(),
            event_type,
            received_at: Timestamp::now(),
            payload: payload.clone(),
        }]
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
