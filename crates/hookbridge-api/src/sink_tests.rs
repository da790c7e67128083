//! Tests for event sinks.

use super::*;
use hookbridge_core::dispatch::{EventDispatcher, TagSource};
use hookbridge_core::registry::Subscription;
use hookbridge_core::EventType;
use serde_json::json;

fn delivered() -> DeliveredEvent {
    let subscription = Subscription::registered(
        "1",
        [EventType::new("leadgen").unwrap()].into(),
        None,
    );
    let dispatcher = EventDispatcher::new(TagSource::Field {
        path: "entry.0.changes.0.field".into(),
    });
    let mut accepted = dispatcher.dispatch(
        &json!({ "entry": [{ "changes": [{ "field": "leadgen" }] }] }),
        Some(&subscription),
    );

    DeliveredEvent {
        integration_id: IntegrationId::new("fb").unwrap(),
        event: accepted.remove(0),
    }
}

#[tokio::test]
async fn test_logging_sink_accepts_everything() {
    assert!(LoggingSink.publish(delivered()).await.is_ok());
}

#[tokio::test]
async fn test_channel_sink_forwards_in_order() {
    let (sink, mut receiver) = ChannelSink::new(4);
    let first = delivered();
    let second = delivered();

    sink.publish(first.clone()).await.unwrap();
    sink.publish(second.clone()).await.unwrap();

    assert_eq!(receiver.recv().await.unwrap(), first);
    assert_eq!(receiver.recv().await.unwrap(), second);
}

#[tokio::test]
async fn test_channel_sink_reports_closed_receiver() {
    let (sink, receiver) = ChannelSink::new(1);
    drop(receiver);

    assert!(matches!(
        sink.publish(delivered()).await,
        Err(SinkError::Closed)
    ));
}
