//! The request adapter shared by every provider.
//!
//! [`ProviderClient`] is the only place outbound HTTP happens. It applies
//! credentials, sends the body only when there is one, records rate limit
//! headers, parses JSON responses and turns every failure into a
//! [`NormalizedError`] through the provider's [`ErrorMapping`].

mod error_mapping;
mod pagination;
mod rate_limit;

use crate::auth::{oauth1, ApiKeyPlacement, AuthScheme, Credential};
use crate::error::NormalizedError;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

pub use error_mapping::{retry_after, ErrorMapping};
pub use pagination::{
    CursorExtractor, LinkCursor, OffsetLimitCursor, PageCursor, PageStep, PaginationStyle,
    SinglePage, TokenCursor,
};
pub use rate_limit::{
    parse_rate_limit_from_headers, parse_reset_delay, RateLimit, RateLimiter, DEFAULT_RESOURCE,
};

/// Default ceiling on pages fetched by one pagination run.
pub const DEFAULT_MAX_PAGES: usize = 1000;

/// Configuration for provider client behaviour.
///
/// # Examples
///
/// ```
/// use hookbridge_sdk::client::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::default()
///     .with_timeout(Duration::from_secs(10))
///     .with_max_pages(20);
/// assert_eq!(config.max_pages, 20);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// User agent sent with every request.
    pub user_agent: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Hard ceiling on pages fetched by one pagination run. Never below 1.
    pub max_pages: usize,
    /// Fraction of a rate limit window to keep in reserve.
    pub rate_limit_margin: f64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("hookbridge/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_secs(30),
            max_pages: DEFAULT_MAX_PAGES,
            rate_limit_margin: 0.1,
        }
    }
}

impl ClientConfig {
    /// Set the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the pagination ceiling.
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Set the rate limit safety margin.
    pub fn with_rate_limit_margin(mut self, margin: f64) -> Self {
        self.rate_limit_margin = margin.clamp(0.0, 1.0);
        self
    }
}

/// Body of an outbound request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// No body.
    Empty,
    /// JSON document.
    Json(Value),
    /// `application/x-www-form-urlencoded` pairs.
    Form(Vec<(String, String)>),
}

impl RequestBody {
    /// Whether the body would send nothing.
    ///
    /// `null` and `{}` count as empty, so a request built from a template with
    /// no body fields goes out without one.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Json(Value::Null) => true,
            Self::Json(Value::Object(map)) => map.is_empty(),
            Self::Json(_) => false,
            Self::Form(pairs) => pairs.is_empty(),
        }
    }
}

/// One outbound call, relative to the client's base URL.
///
/// A `path` that is already an absolute `http(s)` URL is used as-is; this is
/// how link-style pagination follows the provider's `next` URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
}

impl ApiRequest {
    /// Create a request with no query and no body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    /// `GET path`.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// `POST path`.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// `DELETE path`.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body.
    pub fn with_json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    /// Attach a form body.
    pub fn with_form(mut self, pairs: Vec<(String, String)>) -> Self {
        self.body = RequestBody::Form(pairs);
        self
    }

    /// Set a query parameter, replacing any existing value for the name.
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_query(name, value);
        self
    }

    /// In-place form of [`with_query`](Self::with_query).
    pub fn set_query(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.query.retain(|(existing, _)| *existing != name);
        self.query.push((name, value.into()));
    }

    /// Value of a query parameter.
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.as_str())
    }

    fn form_params(&self) -> &[(String, String)] {
        match &self.body {
            RequestBody::Form(pairs) => pairs,
            _ => &[],
        }
    }
}

/// HTTP client for one provider.
///
/// # Examples
///
/// ```no_run
/// # use hookbridge_sdk::client::{ApiRequest, ClientConfig, ProviderClient};
/// # use hookbridge_sdk::auth::{AuthScheme, Credential};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ProviderClient::builder("https://api.hubapi.com")
///     .config(ClientConfig::default())
///     .build()?;
///
/// let credential = Credential::new(AuthScheme::api_key_query("hapikey", "demo"));
/// let contacts = client
///     .request(&ApiRequest::get("/contacts/v1/lists/all/contacts/all"), &credential)
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ProviderClient {
    http_client: reqwest::Client,
    base_url: String,
    config: ClientConfig,
    error_mapping: ErrorMapping,
    rate_limiter: RateLimiter,
}

impl ProviderClient {
    /// Start building a client for the given API base URL.
    pub fn builder(base_url: impl Into<String>) -> ProviderClientBuilder {
        ProviderClientBuilder::new(base_url)
    }

    /// The API base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Rate limit state observed so far.
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// The error mapping in use.
    pub fn error_mapping(&self) -> &ErrorMapping {
        &self.error_mapping
    }

    fn resolve_url(&self, request: &ApiRequest, scheme: &AuthScheme) -> Result<Url, NormalizedError> {
        let raw = if request.path.starts_with("http://") || request.path.starts_with("https://") {
            request.path.clone()
        } else {
            format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                request.path.trim_start_matches('/')
            )
        };

        let mut url = Url::parse(&raw).map_err(|e| {
            NormalizedError::unknown(None, format!("invalid request URL '{}': {}", raw, e))
        })?;

        let mut extra: Vec<(&str, &str)> = request
            .query
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        if let AuthScheme::ApiKey {
            key,
            placement: ApiKeyPlacement::Query(name),
        } = scheme
        {
            let already_present = url.query_pairs().any(|(k, _)| k == name.as_str())
                || extra.iter().any(|(k, _)| *k == name.as_str());
            if !already_present {
                extra.push((name.as_str(), key.expose_secret()));
            }
        }

        if !extra.is_empty() {
            url.query_pairs_mut().extend_pairs(extra);
        }
        Ok(url)
    }

    /// Issue one request and return the parsed JSON body.
    ///
    /// An empty success body yields `Value::Null`. A success body that is not
    /// JSON, and every non-success response, yields a [`NormalizedError`].
    #[instrument(
        skip(self, request, credential),
        fields(method = %request.method, path = %request.path, auth = credential.scheme().kind())
    )]
    pub async fn request(
        &self,
        request: &ApiRequest,
        credential: &Credential,
    ) -> Result<Value, NormalizedError> {
        let scheme = credential.scheme();
        let url = self.resolve_url(request, scheme)?;

        let mut builder = self
            .http_client
            .request(request.method.clone(), url.clone())
            .header(ACCEPT, "application/json");

        builder = match scheme {
            AuthScheme::None => builder,
            AuthScheme::ApiKey {
                key,
                placement: ApiKeyPlacement::Header(name),
            } => builder.header(name.as_str(), key.expose_secret()),
            AuthScheme::ApiKey { .. } => builder,
            AuthScheme::Bearer { token } => {
                builder.header(AUTHORIZATION, format!("Bearer {}", token.expose_secret()))
            }
            AuthScheme::OAuth1(oauth) => {
                let header = oauth1::authorization_header(
                    oauth,
                    request.method.as_str(),
                    &url,
                    request.form_params(),
                )
                .map_err(|e| NormalizedError::unknown(None, e.to_string()))?;
                builder.header(AUTHORIZATION, header)
            }
        };

        if !request.body.is_empty() {
            builder = match &request.body {
                RequestBody::Json(body) => builder.json(body),
                RequestBody::Form(pairs) => builder.form(pairs),
                RequestBody::Empty => builder,
            };
        }

        let response = builder.send().await.map_err(NormalizedError::from)?;
        let status = response.status();
        let headers = response.headers().clone();
        self.rate_limiter.update_from_headers(&headers);

        let body = response.bytes().await.map_err(NormalizedError::from)?;

        if !status.is_success() {
            let error = self
                .error_mapping
                .normalize(status.as_u16(), &headers, &body);
            warn!(
                status = status.as_u16(),
                kind = %error.kind,
                provider_code = error.provider_code.as_deref().unwrap_or(""),
                "Provider request failed"
            );
            return Err(error);
        }

        debug!(status = status.as_u16(), bytes = body.len(), "Provider request succeeded");

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }

        serde_json::from_slice(&body).map_err(|e| {
            NormalizedError::unknown(
                Some(status.as_u16()),
                format!("response body is not valid JSON: {}", e),
            )
        })
    }
}

impl std::fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderClient")
            .field("base_url", &self.base_url)
            .field("config", &self.config)
            .finish()
    }
}

/// Builder for [`ProviderClient`].
#[derive(Debug)]
pub struct ProviderClientBuilder {
    base_url: String,
    config: Option<ClientConfig>,
    error_mapping: Option<ErrorMapping>,
}

impl ProviderClientBuilder {
    fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            config: None,
            error_mapping: None,
        }
    }

    /// Set the client configuration. Defaults to `ClientConfig::default()`.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the error mapping. Defaults to `ErrorMapping::default()`.
    pub fn error_mapping(mut self, mapping: ErrorMapping) -> Self {
        self.error_mapping = Some(mapping);
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Fails when the base URL does not parse or the HTTP client cannot be
    /// created.
    pub fn build(self) -> Result<ProviderClient, NormalizedError> {
        let config = self.config.unwrap_or_default();

        Url::parse(&self.base_url).map_err(|e| {
            NormalizedError::unknown(None, format!("invalid base URL '{}': {}", self.base_url, e))
        })?;

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                NormalizedError::unknown(None, format!("failed to create HTTP client: {}", e))
            })?;

        Ok(ProviderClient {
            http_client,
            base_url: self.base_url,
            rate_limiter: RateLimiter::new(config.rate_limit_margin),
            error_mapping: self.error_mapping.unwrap_or_default(),
            config,
        })
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
