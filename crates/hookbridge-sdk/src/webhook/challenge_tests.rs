//! Tests for handshake challenge responses.

use super::*;
use serde_json::json;

fn twitter_crc() -> ChallengeMode {
    ChallengeMode::Signed {
        prefix: "sha256=".to_string(),
        delivery: SignedDelivery::JsonField {
            name: "response_token".to_string(),
        },
    }
}

#[test]
fn test_echo_returns_token_unchanged() {
    let response = verify_challenge("abc123", None, &ChallengeMode::Echo).unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body, ChallengeBody::Text("abc123".to_string()));
    assert!(response.headers.is_empty());
}

#[test]
fn test_json_echo_uses_declared_field() {
    let mode = ChallengeMode::JsonEcho {
        field: "hub_challenge".to_string(),
    };

    let response = verify_challenge("1158201444", None, &mode).unwrap();

    assert_eq!(
        response.body,
        ChallengeBody::Json(json!({ "hub_challenge": "1158201444" }))
    );
}

#[test]
fn test_signed_json_field() {
    let response = verify_challenge("abc123", Some("shh"), &twitter_crc()).unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(
        response.body,
        ChallengeBody::Json(json!({
            "response_token": "sha256=JwbJ7rk5zCPrcSDEAf7XRfEWKNiJMHqxJa0Va4Yd7KU="
        }))
    );
}

#[test]
fn test_signed_header_delivery() {
    let mode = ChallengeMode::Signed {
        prefix: "sha256=".to_string(),
        delivery: SignedDelivery::Header {
            name: "x-response-token".to_string(),
        },
    };

    let response = verify_challenge("abc123", Some("shh"), &mode).unwrap();

    assert_eq!(response.body, ChallengeBody::Empty);
    assert_eq!(
        response.headers,
        vec![(
            "x-response-token".to_string(),
            "sha256=JwbJ7rk5zCPrcSDEAf7XRfEWKNiJMHqxJa0Va4Yd7KU=".to_string()
        )]
    );
}

#[test]
fn test_signed_without_secret_is_error() {
    let error = verify_challenge("abc123", None, &twitter_crc()).unwrap_err();

    assert!(matches!(error, ValidationError::MissingSecret { .. }));
}

#[test]
fn test_empty_token_is_rejected() {
    assert!(verify_challenge("", None, &ChallengeMode::Echo).is_err());
}

#[test]
fn test_sign_token_is_deterministic() {
    assert_eq!(
        sign_token("abc123", "shh").unwrap(),
        "JwbJ7rk5zCPrcSDEAf7XRfEWKNiJMHqxJa0Va4Yd7KU="
    );
    assert_ne!(
        sign_token("abc123", "shh").unwrap(),
        sign_token("abc123", "other").unwrap()
    );
}

#[test]
fn test_requires_secret() {
    assert!(twitter_crc().requires_secret());
    assert!(!ChallengeMode::Echo.requires_secret());
}

#[test]
fn test_mode_deserializes_from_tagged_config() {
    let mode: ChallengeMode = serde_json::from_value(json!({
        "mode": "signed",
        "delivery": { "via": "json_field", "name": "response_token" }
    }))
    .unwrap();

    assert_eq!(mode, twitter_crc());
}

#[test]
fn test_verify_token_matches() {
    assert!(verify_token_matches("my-verify-token", Some("my-verify-token")));
    assert!(!verify_token_matches("my-verify-token", Some("wrong")));
    assert!(!verify_token_matches("my-verify-token", None));
}
