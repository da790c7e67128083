//! Tests for HTTP error mapping.

use super::*;
use axum::http::StatusCode;
use hookbridge_sdk::CredentialError;

fn inbound(error: InboundError) -> WebhookHandlerError {
    WebhookHandlerError::Inbound(error)
}

#[test]
fn test_caller_errors_map_to_4xx() {
    let cases = [
        (
            WebhookHandlerError::IntegrationNotFound {
                integration: "x".to_string(),
            },
            StatusCode::NOT_FOUND,
        ),
        (
            inbound(InboundError::Unsupported {
                provider: "spotify".to_string(),
            }),
            StatusCode::NOT_FOUND,
        ),
        (
            inbound(InboundError::Unauthorized {
                reason: "signature mismatch".to_string(),
            }),
            StatusCode::UNAUTHORIZED,
        ),
        (
            inbound(InboundError::MalformedPayload {
                message: "eof".to_string(),
            }),
            StatusCode::BAD_REQUEST,
        ),
        (
            inbound(InboundError::MissingChallenge {
                param: "crc_token".to_string(),
            }),
            StatusCode::BAD_REQUEST,
        ),
    ];

    for (error, status) in cases {
        assert_eq!(error.status(), status, "{}", error);
    }
}

#[test]
fn test_local_failures_map_to_5xx() {
    let credential = inbound(InboundError::Credential(CredentialError::NotFound {
        integration: "tw".to_string(),
    }));
    let sink = WebhookHandlerError::SinkUnavailable(SinkError::Closed);

    assert_eq!(credential.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(sink.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_server_error_body_hides_detail() {
    let error = inbound(InboundError::Credential(CredentialError::MissingEntry {
        integration: "tw".to_string(),
        name: "consumer_secret".to_string(),
    }));

    let response = error.into_response();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(body["status"], 500);
    assert!(!body["error"].as_str().unwrap().contains("consumer_secret"));
}

#[test]
fn test_config_crate_errors_convert() {
    let error: ConfigError = config::ConfigError::Message("bad".to_string()).into();

    assert!(matches!(error, ConfigError::Load { .. }));
}
