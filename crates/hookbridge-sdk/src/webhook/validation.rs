//! Delivery signature validation.
//!
//! Providers sign each delivery with HMAC-SHA256 over the raw body and send
//! the result in a header, hex encoded (Facebook `X-Hub-Signature-256`) or
//! base64 encoded (Twitter `X-Twitter-Webhooks-Signature`), usually behind a
//! `sha256=` prefix.

use crate::error::ValidationError;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub(crate) fn compute_hmac_sha256(secret: &str, payload: &[u8]) -> Result<Vec<u8>, ValidationError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| ValidationError::HmacError {
            message: format!("Failed to create HMAC instance: {}", e),
        })?;
    mac.update(payload);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn default_prefix() -> String {
    "sha256=".to_string()
}

/// How the signature bytes are written in the header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureEncoding {
    #[default]
    Hex,
    Base64,
}

/// Where a provider puts its delivery signature and how it encodes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureScheme {
    /// Header carrying the signature (matched case-insensitively).
    pub header: String,

    /// Literal prefix in front of the encoded signature.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    #[serde(default)]
    pub encoding: SignatureEncoding,

    /// Name of the credential secret the provider signs with.
    pub secret: String,
}

/// Validates delivery signatures for one provider.
///
/// # Examples
///
/// ```rust
/// use hookbridge_sdk::webhook::{PayloadVerifier, SignatureEncoding, SignatureScheme};
///
/// let verifier = PayloadVerifier::new(SignatureScheme {
///     header: "x-hub-signature-256".to_string(),
///     prefix: "sha256=".to_string(),
///     encoding: SignatureEncoding::Hex,
///     secret: "app_secret".to_string(),
/// });
///
/// let payload = br#"{"object":"page"}"#;
/// let signature = verifier.sign(payload, "app-secret").unwrap();
/// assert!(verifier.verify(payload, &signature, "app-secret").unwrap());
/// assert!(!verifier.verify(b"tampered", &signature, "app-secret").unwrap());
/// ```
#[derive(Debug, Clone)]
pub struct PayloadVerifier {
    scheme: SignatureScheme,
}

impl PayloadVerifier {
    /// Create a verifier for the given scheme.
    pub fn new(scheme: SignatureScheme) -> Self {
        Self { scheme }
    }

    /// The scheme in use.
    pub fn scheme(&self) -> &SignatureScheme {
        &self.scheme
    }

    /// Check a signature header value against the payload.
    ///
    /// * `Ok(true)` - signature matches
    /// * `Ok(false)` - payload tampered or wrong secret
    /// * `Err` - the header is malformed or the secret unusable
    pub fn verify(
        &self,
        payload: &[u8],
        signature: &str,
        secret: &str,
    ) -> Result<bool, ValidationError> {
        let presented = self.parse_signature(signature)?;
        let expected = compute_hmac_sha256(secret, payload)?;

        Ok(constant_time_compare(&presented, &expected))
    }

    /// Produce the header value a provider would send for `payload`.
    pub fn sign(&self, payload: &[u8], secret: &str) -> Result<String, ValidationError> {
        let mac = compute_hmac_sha256(secret, payload)?;
        let encoded = match self.scheme.encoding {
            SignatureEncoding::Hex => hex::encode(mac),
            SignatureEncoding::Base64 => base64::engine::general_purpose::STANDARD.encode(mac),
        };
        Ok(format!("{}{}", self.scheme.prefix, encoded))
    }

    fn parse_signature(&self, signature: &str) -> Result<Vec<u8>, ValidationError> {
        let prefix = self.scheme.prefix.as_str();
        let encoded = signature.trim().strip_prefix(prefix).ok_or_else(|| {
            ValidationError::InvalidSignatureFormat {
                message: format!(
                    "Signature must start with '{}', got: '{}'",
                    prefix,
                    signature.chars().take(10).collect::<String>()
                ),
            }
        })?;

        match self.scheme.encoding {
            SignatureEncoding::Hex => {
                hex::decode(encoded).map_err(|e| ValidationError::InvalidSignatureFormat {
                    message: format!("Invalid hex encoding in signature: {}", e),
                })
            }
            SignatureEncoding::Base64 => base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| ValidationError::InvalidSignatureFormat {
                    message: format!("Invalid base64 encoding in signature: {}", e),
                }),
        }
    }
}

pub(crate) fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    // Length is not secret.
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
#[path = "validation_tests.rs"]
mod tests;
