//! Integration tests for building a running service from configuration files
//!
//! These tests write a service file and a provider definitions file to disk,
//! load them the way the service binary does and check that the result
//! registers, persists and serves.

mod common;

use axum::http::StatusCode;
use common::*;
use hookbridge_api::{ConfigError, Runtime, ServiceConfig};
use hookbridge_core::providers::builtin;
use serde_json::json;
use std::path::Path;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Twitter only, with the definition's base URL overridden from a file.
fn write_config(dir: &Path, server: &MockServer) -> std::path::PathBuf {
    let definitions = dir.join("providers.yaml");
    let yaml = serde_yaml::to_string(&vec![at(server, builtin::twitter())]).unwrap();
    std::fs::write(&definitions, yaml).unwrap();

    let service = dir.join("service.yaml");
    std::fs::write(
        &service,
        format!(
            r#"
server:
  public_url: https://hooks.example.com
registry:
  kind: filesystem
  path: {registry}
providers:
  definitions_file: {definitions}
integrations:
  - id: tw
    provider: twitter
    events: [likedTweet]
    credential:
      auth:
        scheme: oauth1
        consumer_key: ck
        consumer_secret: {{ source: literal, value: twitter-consumer-secret }}
        token: {{ source: literal, value: access-token }}
        token_secret: {{ source: literal, value: access-token-secret }}
      attributes:
        env_name: prod
"#,
            registry = dir.join("subscriptions").display(),
            definitions = definitions.display(),
        ),
    )
    .unwrap();
    service
}

#[tokio::test]
async fn test_service_from_files_registers_and_survives_restart() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/webhooks.json", TWITTER_ENV)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}/webhooks.json", TWITTER_ENV)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "55",
            "url": TWITTER_CALLBACK
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}/subscriptions.json", TWITTER_ENV)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = write_config(dir.path(), &server);
    let config = ServiceConfig::load(Some(&file)).unwrap();

    let runtime = Runtime::from_config(&config).await.unwrap();
    assert_eq!(
        runtime.catalog.require("twitter").unwrap().base_url,
        server.uri()
    );
    let lifecycle = runtime.get("tw").unwrap().lifecycle.clone().unwrap();
    assert!(lifecycle.ensure_registered().await.unwrap());

    // A fresh runtime reads the record back and does not register again.
    let restarted = Runtime::from_config(&config).await.unwrap();
    let lifecycle = restarted.get("tw").unwrap().lifecycle.clone().unwrap();
    assert!(lifecycle.ensure_registered().await.unwrap());
    let record = lifecycle.subscription().await.unwrap().unwrap();
    assert_eq!(record.provider_subscription_id.as_deref(), Some("55"));

    let (router, _events) = app(&restarted);
    let response = router.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["integrations"], 1);
}

#[tokio::test]
async fn test_missing_explicit_file_fails_to_load() {
    let dir = tempfile::tempdir().unwrap();

    let result = ServiceConfig::load(Some(&dir.path().join("absent.yaml")));

    assert!(matches!(result, Err(ConfigError::Load { .. })));
}

#[tokio::test]
async fn test_unreadable_definitions_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let definitions = dir.path().join("providers.yaml");
    std::fs::write(&definitions, "- name: Not Valid\n  base_url: nope\n").unwrap();
    let config = ServiceConfig::from_yaml(&format!(
        "registry:\n  kind: memory\nproviders:\n  definitions_file: {}\n",
        definitions.display()
    ))
    .unwrap();

    let result = Runtime::from_config(&config).await;

    assert!(matches!(result, Err(ConfigError::Invalid { .. })));
}

#[tokio::test]
async fn test_integration_with_unset_secret_env_is_rejected() {
    let config = ServiceConfig::from_yaml(
        r#"
registry:
  kind: memory
integrations:
  - id: music
    provider: spotify
    credential:
      auth:
        scheme: bearer
        token: { source: env, var: HOOKBRIDGE_TEST_NEVER_SET_TOKEN }
"#,
    )
    .unwrap();

    let result = Runtime::from_config(&config).await;

    assert!(matches!(result, Err(ConfigError::Missing { .. })));
}

#[tokio::test]
async fn test_shared_fixture_validates_against_builtin_catalog() {
    let config = service_config();

    let runtime = Runtime::from_config(&config).await.unwrap();

    assert_eq!(runtime.lifecycles().count(), 2);
    assert_eq!(runtime.endpoints().len(), 2);
}
