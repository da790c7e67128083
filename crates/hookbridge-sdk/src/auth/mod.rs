//! Credential types consumed by the request adapter and the webhook verifier.
//!
//! Credentials are resolved by the host (see [`CredentialProvider`]) and are
//! read-only here: nothing in this crate persists, mutates or logs them. Secret
//! material lives in [`SecretString`], which redacts itself from `Debug`
//! output and is zeroized on drop.

pub mod oauth1;

use crate::error::CredentialError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A secret value that never appears in logs.
///
/// # Examples
///
/// ```rust
/// use hookbridge_sdk::SecretString;
///
/// let secret = SecretString::new("consumer-secret");
/// assert_eq!(secret.expose_secret(), "consumer-secret");
/// assert_eq!(format!("{:?}", secret), "SecretString(<REDACTED>)");
/// ```
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretString(String);

impl SecretString {
    /// Wrap a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the secret. Callers must not log the returned value.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// Whether the secret is the empty string.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(<REDACTED>)")
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Name of a secret held by a [`Credential`].
///
/// Subscriptions store this reference instead of the secret itself, so the
/// persisted record never contains key material.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretRef(String);

impl SecretRef {
    /// Reference a secret by name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The secret name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SecretRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where an API key is attached to outbound requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "in", content = "name")]
pub enum ApiKeyPlacement {
    /// Sent as a request header with the given name.
    Header(String),

    /// Sent as a query parameter with the given name.
    Query(String),
}

/// OAuth 1.0a consumer and token credentials.
#[derive(Clone)]
pub struct OAuth1Credentials {
    /// Consumer (application) key.
    pub consumer_key: String,

    /// Consumer (application) secret.
    pub consumer_secret: SecretString,

    /// Access token.
    pub token: String,

    /// Access token secret.
    pub token_secret: SecretString,
}

impl fmt::Debug for OAuth1Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth1Credentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"<REDACTED>")
            .field("token", &"<REDACTED>")
            .field("token_secret", &"<REDACTED>")
            .finish()
    }
}

/// How a credential authorizes outbound requests.
#[derive(Debug, Clone)]
pub enum AuthScheme {
    /// No authorization is attached.
    None,

    /// A static API key.
    ApiKey {
        key: SecretString,
        placement: ApiKeyPlacement,
    },

    /// An OAuth2 access token sent as `Authorization: Bearer`.
    Bearer { token: SecretString },

    /// OAuth 1.0a HMAC-SHA1 signed requests.
    OAuth1(OAuth1Credentials),
}

impl AuthScheme {
    /// Bearer token shorthand.
    pub fn bearer(token: impl Into<SecretString>) -> Self {
        Self::Bearer {
            token: token.into(),
        }
    }

    /// API key sent as a query parameter.
    pub fn api_key_query(name: impl Into<String>, key: impl Into<SecretString>) -> Self {
        Self::ApiKey {
            key: key.into(),
            placement: ApiKeyPlacement::Query(name.into()),
        }
    }

    /// API key sent as a header.
    pub fn api_key_header(name: impl Into<String>, key: impl Into<SecretString>) -> Self {
        Self::ApiKey {
            key: key.into(),
            placement: ApiKeyPlacement::Header(name.into()),
        }
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ApiKey { .. } => "api_key",
            Self::Bearer { .. } => "bearer",
            Self::OAuth1(_) => "oauth1",
        }
    }
}

/// A resolved credential for one provider integration.
///
/// Besides the authorization scheme a credential carries named secrets (for
/// example the webhook signing secret) and plain attributes that endpoint
/// templates may reference (for example a Facebook `app_id`).
///
/// # Examples
///
/// ```rust
/// use hookbridge_sdk::{AuthScheme, Credential};
///
/// let credential = Credential::new(AuthScheme::bearer("token"))
///     .with_attribute("app_id", "1234")
///     .with_secret("app_secret", "shh");
///
/// assert_eq!(credential.attribute("app_id"), Some("1234"));
/// assert_eq!(credential.secret("app_secret").map(|s| s.expose_secret()), Some("shh"));
/// assert!(!format!("{:?}", credential).contains("shh"));
/// ```
#[derive(Clone)]
pub struct Credential {
    scheme: AuthScheme,
    secrets: HashMap<String, SecretString>,
    attributes: HashMap<String, String>,
}

impl Credential {
    /// Create a credential with the given authorization scheme.
    pub fn new(scheme: AuthScheme) -> Self {
        Self {
            scheme,
            secrets: HashMap::new(),
            attributes: HashMap::new(),
        }
    }

    /// Attach a named secret.
    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<SecretString>) -> Self {
        self.secrets.insert(name.into(), value.into());
        self
    }

    /// Attach a plain attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// The authorization scheme.
    pub fn scheme(&self) -> &AuthScheme {
        &self.scheme
    }

    /// Look up a named secret.
    ///
    /// The OAuth1 consumer secret is also reachable under the name
    /// `consumer_secret`, which is what Twitter signs CRC challenges with.
    pub fn secret(&self, name: &str) -> Option<&SecretString> {
        if let Some(secret) = self.secrets.get(name) {
            return Some(secret);
        }
        match (&self.scheme, name) {
            (AuthScheme::OAuth1(oauth), "consumer_secret") => Some(&oauth.consumer_secret),
            _ => None,
        }
    }

    /// Names of the attached secrets, sorted. Values stay hidden.
    pub fn secret_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.secrets.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve a [`SecretRef`].
    pub fn resolve(&self, reference: &SecretRef) -> Option<&SecretString> {
        self.secret(reference.as_str())
    }

    /// Look up a plain attribute.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// All plain attributes.
    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("scheme", &self.scheme.kind())
            .field("secrets", &self.secret_names())
            .field("attributes", &self.attributes)
            .finish()
    }
}

/// Interface to the host's credential store.
///
/// Implementations resolve the credential of one integration instance. The
/// core calls this on every lifecycle operation and inbound delivery, so
/// implementations should cache where the backing store is slow.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Resolve the credential for an integration.
    async fn credential(&self, integration: &str) -> Result<Credential, CredentialError>;
}

/// Credential provider backed by a fixed map, populated from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialProvider {
    credentials: HashMap<String, Credential>,
}

impl StaticCredentialProvider {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the credential for an integration, replacing any previous one.
    pub fn insert(&mut self, integration: impl Into<String>, credential: Credential) {
        self.credentials.insert(integration.into(), credential);
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, integration: impl Into<String>, credential: Credential) -> Self {
        self.insert(integration, credential);
        self
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn credential(&self, integration: &str) -> Result<Credential, CredentialError> {
        self.credentials
            .get(integration)
            .cloned()
            .ok_or_else(|| CredentialError::NotFound {
                integration: integration.to_string(),
            })
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
