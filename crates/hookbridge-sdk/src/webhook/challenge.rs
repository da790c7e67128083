//! Handshake challenge responses.
//!
//! Providers confirm that a callback URL belongs to the subscriber before
//! (and periodically after) delivering events:
//!
//! - Facebook sends `hub.challenge` and expects it back, plain or as JSON.
//! - Twitter sends `crc_token` and expects
//!   `{"response_token": "sha256=" + base64(HMAC-SHA256(consumer_secret, crc_token))}`.

use super::validation::{compute_hmac_sha256, constant_time_compare};
use crate::error::ValidationError;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

fn default_prefix() -> String {
    "sha256=".to_string()
}

/// How a signed challenge response is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "via", rename_all = "snake_case")]
pub enum SignedDelivery {
    /// As a field of a JSON object body.
    JsonField { name: String },

    /// As a response header; the body is empty.
    Header { name: String },
}

/// The handshake protocol of a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ChallengeMode {
    /// Return the token as a plain text body.
    Echo,

    /// Return `{ field: token }`.
    JsonEcho { field: String },

    /// Return `prefix + base64(HMAC-SHA256(secret, token))`.
    Signed {
        #[serde(default = "default_prefix")]
        prefix: String,
        delivery: SignedDelivery,
    },
}

impl ChallengeMode {
    /// Whether answering needs a signing secret.
    pub fn requires_secret(&self) -> bool {
        matches!(self, Self::Signed { .. })
    }
}

/// Body of a handshake response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeBody {
    Text(String),
    Json(Value),
    Empty,
}

/// A complete handshake response. The status is always 200.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: ChallengeBody,
}

fn single_field(name: &str, value: String) -> Value {
    let mut body = Map::new();
    body.insert(name.to_string(), Value::String(value));
    Value::Object(body)
}

/// Compute `base64(HMAC-SHA256(secret, token))`.
pub fn sign_token(token: &str, secret: &str) -> Result<String, ValidationError> {
    let mac = compute_hmac_sha256(secret, token.as_bytes())?;
    Ok(base64::engine::general_purpose::STANDARD.encode(mac))
}

/// Build the handshake response for `token`.
///
/// # Errors
///
/// An empty token, or a signed mode without a secret, is rejected.
///
/// # Examples
///
/// ```rust
/// use hookbridge_sdk::webhook::{verify_challenge, ChallengeBody, ChallengeMode, SignedDelivery};
///
/// let mode = ChallengeMode::Signed {
///     prefix: "sha256=".to_string(),
///     delivery: SignedDelivery::JsonField { name: "response_token".to_string() },
/// };
///
/// let response = verify_challenge("abc123", Some("shh"), &mode).unwrap();
/// match response.body {
///     ChallengeBody::Json(body) => {
///         assert!(body["response_token"].as_str().unwrap().starts_with("sha256="));
///     }
///     other => panic!("unexpected body {:?}", other),
/// }
/// ```
pub fn verify_challenge(
    token: &str,
    secret: Option<&str>,
    mode: &ChallengeMode,
) -> Result<ChallengeResponse, ValidationError> {
    if token.is_empty() {
        return Err(ValidationError::Required {
            field: "challenge token".to_string(),
        });
    }

    let (headers, body) = match mode {
        ChallengeMode::Echo => (Vec::new(), ChallengeBody::Text(token.to_string())),
        ChallengeMode::JsonEcho { field } => (
            Vec::new(),
            ChallengeBody::Json(single_field(field, token.to_string())),
        ),
        ChallengeMode::Signed { prefix, delivery } => {
            let secret = secret.ok_or_else(|| ValidationError::MissingSecret {
                name: "challenge signing secret".to_string(),
            })?;
            let signed = format!("{}{}", prefix, sign_token(token, secret)?);

            match delivery {
                SignedDelivery::JsonField { name } => (
                    Vec::new(),
                    ChallengeBody::Json(single_field(name, signed)),
                ),
                SignedDelivery::Header { name } => {
                    (vec![(name.clone(), signed)], ChallengeBody::Empty)
                }
            }
        }
    };

    Ok(ChallengeResponse {
        status: 200,
        headers,
        body,
    })
}

/// Compare a presented verify token with the configured one in constant time.
///
/// A missing presented token never matches.
pub fn verify_token_matches(expected: &str, presented: Option<&str>) -> bool {
    match presented {
        Some(presented) => constant_time_compare(expected.as_bytes(), presented.as_bytes()),
        None => false,
    }
}

#[cfg(test)]
#[path = "challenge_tests.rs"]
mod tests;
