use super::*;
use crate::config::IntegrationConfig;
use hookbridge_core::adapters::InMemorySubscriptionStore;
use hookbridge_sdk::{AuthScheme, Credential, StaticCredentialProvider};

fn integration(id: &str, provider: &str, events: &[&str]) -> IntegrationConfig {
    IntegrationConfig {
        id: id.to_string(),
        provider: provider.to_string(),
        events: events.iter().map(|e| e.to_string()).collect(),
        callback_url: None,
        verification_secret: None,
        credential: Default::default(),
    }
}

fn config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.server.public_url = Some("https://hooks.example.com".to_string());
    config.integrations = vec![
        integration("tw", "twitter", &["likedTweet"]),
        integration("hub", "hubspot", &["contact.creation"]),
        integration("music", "spotify", &[]),
    ];
    config
}

fn build(config: &ServiceConfig) -> Result<Runtime, ConfigError> {
    let credentials = StaticCredentialProvider::new()
        .with("tw", Credential::new(AuthScheme::bearer("t")))
        .with("hub", Credential::new(AuthScheme::api_key_query("hapikey", "k")));

    Runtime::build(
        config,
        ProviderCatalog::builtin(),
        Arc::new(InMemorySubscriptionStore::new()),
        Arc::new(credentials),
    )
}

#[test]
fn test_components_follow_provider_capabilities() {
    let runtime = build(&config()).unwrap();

    let twitter = runtime.get("tw").unwrap();
    assert!(twitter.lifecycle.is_some());
    assert!(twitter.endpoint.is_some());
    assert_eq!(
        twitter.lifecycle.as_ref().unwrap().callback_url(),
        "https://hooks.example.com/webhook/tw"
    );

    let spotify = runtime.get("music").unwrap();
    assert!(spotify.lifecycle.is_none());
    assert!(spotify.endpoint.is_none());
    assert_eq!(spotify.provider.name, "spotify");
}

#[test]
fn test_iteration_is_in_id_order() {
    let runtime = build(&config()).unwrap();

    let ids: Vec<&str> = runtime.iter().map(|i| i.id.as_str()).collect();

    assert_eq!(ids, vec!["hub", "music", "tw"]);
    assert_eq!(runtime.lifecycles().count(), 2);
}

#[test]
fn test_endpoints_cover_inbound_integrations() {
    let runtime = build(&config()).unwrap();

    let endpoints = runtime.endpoints();

    assert_eq!(endpoints.len(), 2);
    assert_eq!(endpoints["tw"].provider_name(), "twitter");
    assert_eq!(endpoints["hub"].provider_name(), "hubspot");
    assert!(!endpoints.contains_key("music"));
}

#[test]
fn test_missing_callback_skips_lifecycle() {
    let mut config = config();
    config.server.public_url = None;

    let runtime = build(&config).unwrap();

    assert!(runtime.get("tw").unwrap().lifecycle.is_none());
    assert!(runtime.get("tw").unwrap().endpoint.is_some());
}

#[test]
fn test_unknown_provider_is_rejected() {
    let mut config = config();
    config.integrations.push(integration("old", "myspace", &[]));

    let result = build(&config);

    assert!(matches!(
        result,
        Err(ConfigError::Integration { ref integration, .. }) if integration == "old"
    ));
}

#[tokio::test]
async fn test_from_config_with_literal_secrets() {
    let config = ServiceConfig::from_yaml(
        r#"
server:
  public_url: https://hooks.example.com
registry:
  kind: memory
integrations:
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
        app_secret: { source: literal, value: app-shh }
        verify_token: { source: literal, value: let-me-in }
"#,
    )
    .unwrap();

    let runtime = Runtime::from_config(&config).await.unwrap();

    let facebook = runtime.get("fb").unwrap();
    assert!(facebook.lifecycle.is_some());
    assert_eq!(
        facebook.endpoint.as_ref().unwrap().signature_header(),
        Some("x-hub-signature-256")
    );
    let credential = runtime.credentials.credential("fb").await.unwrap();
    assert_eq!(credential.attribute("app_id"), Some("1234"));
}

#[tokio::test]
async fn test_from_config_validates_first() {
    let mut config = config();
    config.registry = crate::config::RegistryConfig::Memory;
    config.integrations.push(integration("tw", "twitter", &["myTweet"]));

    let result = Runtime::from_config(&config).await;

    assert!(result.is_err());
}
