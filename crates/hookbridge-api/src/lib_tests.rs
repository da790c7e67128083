//! Tests for the inbound webhook routes.

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use hookbridge_core::adapters::InMemorySubscriptionStore;
use hookbridge_core::providers::{builtin, ProviderDefinition};
use hookbridge_core::registry::{Subscription, SubscriptionStore};
use hookbridge_core::{EventType, IntegrationId};
use hookbridge_sdk::webhook::{sign_token, PayloadVerifier};
use hookbridge_sdk::{AuthScheme, Credential, StaticCredentialProvider};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;

// ============================================================================
// Test helpers
// ============================================================================

struct TestApp {
    state: AppState,
    store: InMemorySubscriptionStore,
    events: mpsc::Receiver<DeliveredEvent>,
}

fn credentials() -> Arc<StaticCredentialProvider> {
    Arc::new(
        StaticCredentialProvider::new()
            .with(
                "tw",
                Credential::new(AuthScheme::bearer("t"))
                    .with_attribute("env_name", "prod")
                    .with_secret("consumer_secret", "shh"),
            )
            .with(
                "fb",
                Credential::new(AuthScheme::bearer("t"))
                    .with_attribute("app_id", "1234")
                    .with_secret("verify_token", "let-me-in")
                    .with_secret("app_secret", "app-shh"),
            ),
    )
}

fn test_app() -> TestApp {
    let store = InMemorySubscriptionStore::new();
    let credentials = credentials();
    let endpoint = |id: &str, provider: ProviderDefinition| {
        let endpoint = WebhookEndpoint::new(
            IntegrationId::new(id).unwrap(),
            &provider,
            credentials.clone(),
            Arc::new(store.clone()),
        )
        .unwrap();
        (id.to_string(), endpoint)
    };

    let endpoints = HashMap::from([
        endpoint("tw", builtin::twitter()),
        endpoint("fb", builtin::facebook_leads()),
    ]);
    let (sink, events) = ChannelSink::new(16);

    TestApp {
        state: AppState::new(ServerConfig::default(), endpoints, Arc::new(sink)),
        store,
        events,
    }
}

async fn register(store: &InMemorySubscriptionStore, id: &str, tags: &[&str]) {
    let events = tags.iter().map(|t| EventType::new(*t).unwrap()).collect();
    store
        .put(
            &IntegrationId::new(id).unwrap(),
            &Subscription::registered("sub-1", events, None),
        )
        .await
        .unwrap();
}

fn sign(provider: ProviderDefinition, body: &[u8], secret: &str) -> String {
    let scheme = provider.inbound.unwrap().signature.unwrap();
    PayloadVerifier::new(scheme).sign(body, secret).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, header: Option<(&str, &str)>, body: &'static [u8]) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some((name, value)) = header {
        builder = builder.header(name, value);
    }
    builder.body(Body::from(body)).unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_reports_integrations() {
    let app = create_router(test_app().state);

    let response = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["integrations"], 2);
}

#[tokio::test]
async fn test_correlation_id_is_echoed() {
    let app = create_router(test_app().state);
    let request = Request::builder()
        .uri("/health")
        .header("x-correlation-id", "abc-123")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(
        response.headers().get("x-correlation-id").unwrap(),
        "abc-123"
    );
}

// ============================================================================
// Handshakes
// ============================================================================

mod handshake_tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_integration_is_404() {
        let app = create_router(test_app().state);

        let response = app
            .oneshot(get("/webhook/nobody?crc_token=abc"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_body(response).await;
        assert_eq!(body["status"], 404);
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_twitter_crc() {
        let app = create_router(test_app().state);

        let response = app
            .oneshot(get("/webhook/tw?crc_token=abc123"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let expected = format!("sha256={}", sign_token("abc123", "shh").unwrap());
        assert_eq!(json_body(response).await, json!({ "response_token": expected }));
    }

    #[tokio::test]
    async fn test_facebook_hub_challenge() {
        let app = create_router(test_app().state);

        let response = app
            .oneshot(get(
                "/webhook/fb?hub.mode=subscribe&hub.challenge=1158201444&hub.verify_token=let-me-in",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({ "hub_challenge": "1158201444" })
        );
    }

    #[tokio::test]
    async fn test_wrong_verify_token_is_401() {
        let app = create_router(test_app().state);

        let response = app
            .oneshot(get("/webhook/fb?hub.challenge=1&hub.verify_token=nope"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_missing_challenge_is_400() {
        let app = create_router(test_app().state);

        let response = app.oneshot(get("/webhook/tw")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

// ============================================================================
// Deliveries
// ============================================================================

mod delivery_tests {
    use super::*;

    const LIKE: &[u8] = br#"{"for_user_id":"1","favorite_events":[{"id":"f1"}]}"#;

    #[tokio::test]
    async fn test_signed_delivery_reaches_sink() {
        let mut app = test_app();
        register(&app.store, "tw", &["likedTweet"]).await;
        let signature = sign(builtin::twitter(), LIKE, "shh");

        let response = create_router(app.state.clone())
            .oneshot(post(
                "/webhook/tw",
                Some(("x-twitter-webhooks-signature", signature.as_str())),
                LIKE,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["accepted"], 1);

        let delivered = app.events.recv().await.unwrap();
        assert_eq!(delivered.integration_id.as_str(), "tw");
        assert_eq!(delivered.event.event_type.as_str(), "likedTweet");
        assert_eq!(body["event_ids"][0], delivered.event.event_id.to_string());
    }

    #[tokio::test]
    async fn test_disabled_event_answers_200_with_nothing_accepted() {
        let mut app = test_app();
        register(&app.store, "tw", &["newFollower"]).await;
        let signature = sign(builtin::twitter(), LIKE, "shh");

        let response = create_router(app.state.clone())
            .oneshot(post(
                "/webhook/tw",
                Some(("x-twitter-webhooks-signature", signature.as_str())),
                LIKE,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["accepted"], 0);
        assert!(app.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_bad_signature_is_401() {
        let app = test_app();
        register(&app.store, "tw", &["likedTweet"]).await;
        let signature = sign(builtin::twitter(), LIKE, "wrong");

        let response = create_router(app.state)
            .oneshot(post(
                "/webhook/tw",
                Some(("x-twitter-webhooks-signature", signature.as_str())),
                LIKE,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_missing_signature_is_401() {
        let app = create_router(test_app().state);

        let response = app.oneshot(post("/webhook/tw", None, LIKE)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_malformed_json_is_400() {
        let app = test_app();
        let body: &'static [u8] = b"{not json";
        let signature = sign(builtin::facebook_leads(), body, "app-shh");

        let response = create_router(app.state)
            .oneshot(post(
                "/webhook/fb",
                Some(("x-hub-signature-256", signature.as_str())),
                body,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_closed_sink_is_503_with_retry_after() {
        let app = test_app();
        register(&app.store, "tw", &["likedTweet"]).await;
        let signature = sign(builtin::twitter(), LIKE, "shh");
        let TestApp { state, events, .. } = app;
        drop(events);

        let response = create_router(state)
            .oneshot(post(
                "/webhook/tw",
                Some(("x-twitter-webhooks-signature", signature.as_str())),
                LIKE,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers().get("Retry-After").unwrap(), "60");
    }
}
