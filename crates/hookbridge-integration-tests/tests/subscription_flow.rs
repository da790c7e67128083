//! End-to-end subscription flows
//!
//! Each test registers a webhook against a mocked provider, answers the
//! provider's handshake and routes a signed delivery to the sink, all through
//! the same runtime the service builds from configuration.

mod common;

use axum::http::StatusCode;
use common::*;
use hookbridge_core::providers::builtin;
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, body_string_contains, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LIKE: &[u8] = br#"{"for_user_id":"42","favorite_events":[{"id":"fav-1"}]}"#;
const LEAD: &[u8] =
    br#"{"object":"page","entry":[{"id":"p1","changes":[{"field":"leadgen","value":{"leadgen_id":"l1"}}]}]}"#;

async fn mount_twitter_registration(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(format!("{}/webhooks.json", TWITTER_ENV)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}/webhooks.json", TWITTER_ENV)))
        .and(header_exists("authorization"))
        .and(body_string_contains("url=https%3A%2F%2Fhooks.example.com%2Fwebhook%2Ftw"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "1234",
            "url": TWITTER_CALLBACK,
            "valid": true
        })))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}/subscriptions.json", TWITTER_ENV)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_twitter_register_handshake_deliver_teardown() {
    let server = MockServer::start().await;
    mount_twitter_registration(&server).await;
    Mock::given(method("DELETE"))
        .and(path(format!("{}/webhooks/1234.json", TWITTER_ENV)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let runtime = runtime_at(&server);
    let lifecycle = runtime.get("tw").unwrap().lifecycle.clone().unwrap();

    // Register
    assert!(lifecycle.ensure_registered().await.unwrap());
    assert!(lifecycle.check_exists().await.unwrap());

    // Handshake
    let (router, mut events) = app(&runtime);
    let response = router
        .clone()
        .oneshot(get("/webhook/tw?crc_token=challenge-1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let crc = json_body(response).await;
    assert!(crc["response_token"]
        .as_str()
        .unwrap()
        .starts_with("sha256="));

    // Delivery
    let signature = sign(&builtin::twitter(), LIKE, "twitter-consumer-secret");
    let response = router
        .clone()
        .oneshot(post(
            "/webhook/tw",
            ("x-twitter-webhooks-signature", signature.as_str()),
            LIKE,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["accepted"], 1);

    let delivered = events.recv().await.unwrap();
    assert_eq!(delivered.integration_id.as_str(), "tw");
    assert_eq!(delivered.event.event_type.as_str(), "likedTweet");
    assert_eq!(delivered.event.payload["favorite_events"][0]["id"], "fav-1");

    // Teardown: deliveries are no longer accepted
    assert!(lifecycle.delete().await.unwrap());
    assert!(lifecycle.delete().await.unwrap());
    let response = router
        .oneshot(post(
            "/webhook/tw",
            ("x-twitter-webhooks-signature", signature.as_str()),
            LIKE,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["accepted"], 0);
}

#[tokio::test]
async fn test_twitter_adopts_existing_webhook() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/webhooks.json", TWITTER_ENV)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "777", "url": TWITTER_CALLBACK, "valid": true }
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let runtime = runtime_at(&server);
    let lifecycle = runtime.get("tw").unwrap().lifecycle.clone().unwrap();

    assert!(lifecycle.ensure_registered().await.unwrap());

    let record = lifecycle.subscription().await.unwrap().unwrap();
    assert_eq!(record.provider_subscription_id.as_deref(), Some("777"));
    assert_eq!(record.enabled_events.len(), 2);
}

#[tokio::test]
async fn test_facebook_register_handshake_deliver() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1234/subscriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/1234/subscriptions"))
        .and(body_partial_json(json!({
            "object": "page",
            "callback_url": FACEBOOK_CALLBACK,
            "fields": "leadgen",
            "verify_token": "let-me-in"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/1234/subscriptions"))
        .and(query_param("object", "page"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    let runtime = runtime_at(&server);
    let lifecycle = runtime.get("fb").unwrap().lifecycle.clone().unwrap();
    assert!(lifecycle.ensure_registered().await.unwrap());

    let (router, mut events) = app(&runtime);

    let response = router
        .clone()
        .oneshot(get(
            "/webhook/fb?hub.mode=subscribe&hub.challenge=98765&hub.verify_token=let-me-in",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "hub_challenge": "98765" }));

    let signature = sign(&builtin::facebook_leads(), LEAD, "facebook-app-secret");
    let response = router
        .oneshot(post("/webhook/fb", ("x-hub-signature-256", signature.as_str()), LEAD))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let delivered = events.recv().await.unwrap();
    assert_eq!(delivered.integration_id.as_str(), "fb");
    assert_eq!(delivered.event.event_type.as_str(), "leadgen");

    assert!(lifecycle.delete().await.unwrap());
    assert!(lifecycle.subscription().await.unwrap().is_none());
}

#[tokio::test]
async fn test_delivery_signed_with_wrong_integration_secret_is_rejected() {
    let server = MockServer::start().await;
    mount_twitter_registration(&server).await;
    let runtime = runtime_at(&server);
    runtime
        .get("tw")
        .unwrap()
        .lifecycle
        .as_ref()
        .unwrap()
        .ensure_registered()
        .await
        .unwrap();
    let (router, mut events) = app(&runtime);

    let signature = sign(&builtin::twitter(), LIKE, "facebook-app-secret");
    let response = router
        .oneshot(post(
            "/webhook/tw",
            ("x-twitter-webhooks-signature", signature.as_str()),
            LIKE,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(events.try_recv().is_err());
}
