//! OAuth 1.0a request signing (HMAC-SHA1).
//!
//! Only the signing step is implemented; token acquisition happens outside
//! this crate and the resulting token pair arrives in [`OAuth1Credentials`].
//! Parameters are encoded per RFC 3986 (unreserved characters are
//! `A-Z a-z 0-9 - . _ ~`), which is exactly what `urlencoding::encode`
//! produces.

use super::OAuth1Credentials;
use crate::error::ValidationError;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use url::Url;

type HmacSha1 = Hmac<Sha1>;

const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const OAUTH_VERSION: &str = "1.0";

fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// The base URI of a request: scheme, host, non-default port and path.
fn base_uri(url: &Url) -> String {
    let mut base = format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default());
    if let Some(port) = url.port() {
        base.push(':');
        base.push_str(&port.to_string());
    }
    base.push_str(url.path());
    base
}

/// Build the signature base string.
///
/// `params` holds the oauth protocol parameters plus any form-encoded body
/// parameters. Query parameters are read from `url` itself.
pub fn signature_base_string(method: &str, url: &Url, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (encode(&k), encode(&v)))
        .chain(params.iter().map(|(k, v)| (encode(k), encode(v))))
        .collect();
    encoded.sort();

    let parameter_string = encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        encode(&base_uri(url)),
        encode(&parameter_string)
    )
}

/// Sign a base string with the consumer and token secrets.
pub fn sign(
    base_string: &str,
    consumer_secret: &str,
    token_secret: &str,
) -> Result<String, ValidationError> {
    let key = format!("{}&{}", encode(consumer_secret), encode(token_secret));
    let mut mac =
        HmacSha1::new_from_slice(key.as_bytes()).map_err(|e| ValidationError::HmacError {
            message: e.to_string(),
        })?;
    mac.update(base_string.as_bytes());

    Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

/// Build the `Authorization` header for a request with a fresh nonce and the
/// current timestamp.
pub fn authorization_header(
    credentials: &OAuth1Credentials,
    method: &str,
    url: &Url,
    form_params: &[(String, String)],
) -> Result<String, ValidationError> {
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    let timestamp = chrono::Utc::now().timestamp();

    authorization_header_with(credentials, method, url, form_params, &nonce, timestamp)
}

/// Build the `Authorization` header with an explicit nonce and timestamp.
pub fn authorization_header_with(
    credentials: &OAuth1Credentials,
    method: &str,
    url: &Url,
    form_params: &[(String, String)],
    nonce: &str,
    timestamp: i64,
) -> Result<String, ValidationError> {
    let mut oauth_params = vec![
        ("oauth_consumer_key".to_string(), credentials.consumer_key.clone()),
        ("oauth_nonce".to_string(), nonce.to_string()),
        (
            "oauth_signature_method".to_string(),
            SIGNATURE_METHOD.to_string(),
        ),
        ("oauth_timestamp".to_string(), timestamp.to_string()),
        ("oauth_token".to_string(), credentials.token.clone()),
        ("oauth_version".to_string(), OAUTH_VERSION.to_string()),
    ];

    let mut signed_params = oauth_params.clone();
    signed_params.extend(form_params.iter().cloned());

    let base = signature_base_string(method, url, &signed_params);
    let signature = sign(
        &base,
        credentials.consumer_secret.expose_secret(),
        credentials.token_secret.expose_secret(),
    )?;

    oauth_params.push(("oauth_signature".to_string(), signature));
    oauth_params.sort();

    let fields = oauth_params
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join(", ");

    Ok(format!("OAuth {}", fields))
}

#[cfg(test)]
#[path = "oauth1_tests.rs"]
mod tests;
