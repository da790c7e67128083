//! Common test utilities for hookbridge integration tests
//!
//! This module provides:
//! - Provider definitions pointed at a wiremock server
//! - A configuration with Twitter and Facebook integrations using literal
//!   secrets
//! - Router and request helpers

#![allow(dead_code)]

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use hookbridge_api::{create_router, AppState, ChannelSink, DeliveredEvent, Runtime, ServiceConfig};
use hookbridge_core::providers::{builtin, ProviderCatalog, ProviderDefinition};
use hookbridge_sdk::webhook::PayloadVerifier;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use wiremock::MockServer;

pub const TWITTER_ENV: &str = "/account_activity/all/prod";
pub const TWITTER_CALLBACK: &str = "https://hooks.example.com/webhook/tw";
pub const FACEBOOK_CALLBACK: &str = "https://hooks.example.com/webhook/fb";

/// Two integrations: Twitter (`tw`) and Facebook lead ads (`fb`).
pub const SERVICE_YAML: &str = r#"
server:
  public_url: https://hooks.example.com
registry:
  kind: memory
integrations:
  - id: tw
    provider: twitter
    events: [likedTweet, newFollower]
    credential:
      auth:
        scheme: oauth1
        consumer_key: ck
        consumer_secret: { source: literal, value: twitter-consumer-secret }
        token: { source: literal, value: access-token }
        token_secret: { source: literal, value: access-token-secret }
      attributes:
        env_name: prod
  - id: fb
    provider: facebook-leads
    events: [leadgen]
    credential:
      auth:
        scheme: bearer
        token: { source: literal, value: page-token }
      attributes:
        app_id: "1234"
      secrets:
        app_secret: { source: literal, value: facebook-app-secret }
        verify_token: { source: literal, value: let-me-in }
"#;

pub fn service_config() -> ServiceConfig {
    ServiceConfig::from_yaml(SERVICE_YAML).unwrap()
}

/// `definition` with its base URL replaced by the mock server's.
pub fn at(server: &MockServer, mut definition: ProviderDefinition) -> ProviderDefinition {
    definition.base_url = server.uri();
    definition
}

/// The built-in catalog with every provider pointed at `server`.
pub fn catalog_at(server: &MockServer) -> ProviderCatalog {
    let mut catalog = ProviderCatalog::new();
    for definition in builtin::all() {
        catalog.insert(at(server, definition)).unwrap();
    }
    catalog
}

/// Runtime for [`SERVICE_YAML`] whose providers live on `server`.
pub fn runtime_at(server: &MockServer) -> Runtime {
    let config = service_config();
    let catalog = catalog_at(server);
    config.validate(&catalog).unwrap();
    let store = Arc::new(hookbridge_core::adapters::InMemorySubscriptionStore::new());

    Runtime::build(
        &config,
        catalog,
        store,
        Arc::new(config.credential_provider().unwrap()),
    )
    .unwrap()
}

/// Router serving `runtime`, with a channel standing in for the workflow
/// trigger.
pub fn app(runtime: &Runtime) -> (Router, mpsc::Receiver<DeliveredEvent>) {
    let (sink, events) = ChannelSink::new(16);
    let state = AppState::from_runtime(
        service_config().server,
        runtime,
        Arc::new(sink),
    );
    (create_router(state), events)
}

/// Signature header value a provider would send for `body`.
pub fn sign(definition: &ProviderDefinition, body: &[u8], secret: &str) -> String {
    let scheme = definition
        .inbound
        .as_ref()
        .and_then(|inbound| inbound.signature.clone())
        .unwrap();
    PayloadVerifier::new(scheme).sign(body, secret).unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post(uri: &str, signature: (&str, &str), body: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header(signature.0, signature.1)
        .body(Body::from(body.to_vec()))
        .unwrap()
}

pub async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
