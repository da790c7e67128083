//! # Hookbridge SDK
//!
//! Provider-agnostic building blocks for SaaS connector plugins.
//!
//! This SDK provides:
//! - Credential types with redacted debug output and OAuth 1.0a request signing
//! - A single request adapter that normalizes every provider failure into a
//!   [`NormalizedError`]
//! - A pagination engine driven by per-provider cursor extractors, bounded by a
//!   hard page ceiling
//! - Webhook handshake (challenge) responses and payload signature verification
//!
//! # Examples
//!
//! ## Issuing a request
//!
//! ```rust,no_run
//! use hookbridge_sdk::auth::{AuthScheme, Credential};
//! use hookbridge_sdk::client::{ApiRequest, ProviderClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ProviderClient::builder("https://api.spotify.com/v1").build()?;
//! let credential = Credential::new(AuthScheme::bearer("access-token"));
//!
//! let me = client.request(&ApiRequest::get("/me"), &credential).await?;
//! println!("{}", me["display_name"]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Answering a handshake
//!
//! ```rust
//! use hookbridge_sdk::webhook::{verify_challenge, ChallengeBody, ChallengeMode};
//!
//! let response = verify_challenge("abc123", None, &ChallengeMode::Echo).unwrap();
//! assert_eq!(response.status, 200);
//! assert_eq!(response.body, ChallengeBody::Text("abc123".to_string()));
//! ```

// Public modules
pub mod auth;
pub mod client;
pub mod error;
pub mod field_path;
pub mod webhook;

// Re-export commonly used types at crate root for convenience
pub use error::{CredentialError, ErrorKind, NormalizedError, ValidationError};
pub use field_path::FieldPath;

pub use auth::{
    ApiKeyPlacement, AuthScheme, Credential, CredentialProvider, OAuth1Credentials, SecretRef,
    SecretString, StaticCredentialProvider,
};
pub use client::{
    ApiRequest, ClientConfig, CursorExtractor, PageCursor, PageStep, PaginationStyle,
    ProviderClient, RequestBody,
};
