//! Event sink boundary.
//!
//! Accepted events leave the service through an [`EventSink`], which stands
//! in for the host's workflow trigger. Two implementations ship here: a sink
//! that only logs, and a sink that forwards into a tokio channel for an
//! in-process consumer.

use async_trait::async_trait;
use hookbridge_core::dispatch::AcceptedEvent;
use hookbridge_core::IntegrationId;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;

/// Errors raised when handing events to a sink.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Event sink is closed")]
    Closed,

    #[error("Event sink rejected the event: {message}")]
    Rejected { message: String },
}

/// An accepted event together with the integration it arrived on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveredEvent {
    pub integration_id: IntegrationId,
    pub event: AcceptedEvent,
}

/// Receives accepted events.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: DeliveredEvent) -> Result<(), SinkError>;
}

/// Logs each event and drops it.
#[derive(Debug, Clone, Default)]
pub struct LoggingSink;

#[async_trait]
impl EventSink for LoggingSink {
    async fn publish(&self, event: DeliveredEvent) -> Result<(), SinkError> {
        info!(
            integration_id = %event.integration_id,
            event_id = %event.event.event_id,
            event_type = %event.event.event_type,
            "Accepted event"
        );
        Ok(())
    }
}

/// Forwards events into a bounded channel.
///
/// `publish` waits for capacity, so a slow consumer applies backpressure to
/// the inbound handler instead of events being dropped.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<DeliveredEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiving end of its channel.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<DeliveredEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn publish(&self, event: DeliveredEvent) -> Result<(), SinkError> {
        self.sender.send(event).await.map_err(|_| SinkError::Closed)
    }
}

#[cfg(test)]
#[path = "sink_tests.rs"]
mod tests;
