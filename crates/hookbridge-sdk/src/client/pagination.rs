//! The pagination engine.
//!
//! Providers disagree on how they signal "there is another page". Each one
//! declares its contract as a [`PaginationStyle`]; the engine in
//! [`ProviderClient::fetch_all`] is written once and only asks the style two
//! questions: which items are on this page, and how to request the next one.
//!
//! Every run is bounded by [`ClientConfig::max_pages`](super::ClientConfig).
//! Reaching the ceiling while the provider still reports more pages is an
//! error, never a silent truncation.

use super::{ApiRequest, ProviderClient};
use crate::auth::Credential;
use crate::error::NormalizedError;
use crate::field_path::FieldPath;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

/// How to request the page after the current one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCursor {
    /// Numeric offset sent in `param`; the page size stays on the request.
    Offset { param: String, offset: u64 },

    /// Opaque continuation token sent in `param`.
    Token { param: String, value: String },

    /// An absolute URL that replaces the current path and query.
    Url(String),
}

impl PageCursor {
    /// Derive the next request from the current one.
    pub fn apply(&self, request: &ApiRequest) -> ApiRequest {
        match self {
            Self::Offset { param, offset } => {
                request.clone().with_query(param.clone(), offset.to_string())
            }
            Self::Token { param, value } => request.clone().with_query(param.clone(), value.clone()),
            Self::Url(url) => ApiRequest {
                method: request.method.clone(),
                path: url.clone(),
                query: Vec::new(),
                body: request.body.clone(),
            },
        }
    }
}

/// The result of inspecting one page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageStep {
    /// Items on this page, in provider order.
    pub items: Vec<Value>,

    /// Cursor for the next page; `None` on the last page.
    pub next: Option<PageCursor>,
}

/// A provider's pagination contract.
pub trait CursorExtractor: Send + Sync {
    /// Prepare the first request, e.g. by adding page size parameters.
    fn first_page(&self, request: &ApiRequest) -> ApiRequest {
        request.clone()
    }

    /// Split a page body into items and the next cursor.
    ///
    /// Returns an error when the body claims there are more pages but the
    /// cursor needed to fetch them is missing or malformed.
    fn extract(&self, request: &ApiRequest, body: &Value) -> Result<PageStep, NormalizedError>;
}

fn default_items_path() -> FieldPath {
    FieldPath::new("items")
}

fn items_at(path: &FieldPath, body: &Value) -> Result<Vec<Value>, NormalizedError> {
    match path.lookup(body) {
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(Value::Null) => Ok(Vec::new()),
        Some(_) => Err(NormalizedError::unknown(
            None,
            format!("expected an array of items at '{}'", path),
        )),
        None => Err(NormalizedError::unknown(
            None,
            format!("page body has no items at '{}'", path),
        )),
    }
}

/// Offset/limit pagination, e.g. Spotify.
///
/// The next offset is `offset + limit`. Stops when the page is empty, when
/// `next_path` is null or absent, or (if `next_path` is unset) when
/// `total_path` is reached or a page comes back short.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetLimitCursor {
    #[serde(default = "default_items_path")]
    pub items_path: FieldPath,

    #[serde(default = "default_limit_param")]
    pub limit_param: String,

    #[serde(default = "default_offset_param")]
    pub offset_param: String,

    #[serde(default = "default_page_size")]
    pub page_size: u64,

    /// Field that is null on the last page.
    #[serde(default = "default_next_path")]
    pub next_path: Option<FieldPath>,

    /// Field holding the total number of items.
    #[serde(default)]
    pub total_path: Option<FieldPath>,
}

fn default_limit_param() -> String {
    "limit".to_string()
}

fn default_offset_param() -> String {
    "offset".to_string()
}

fn default_page_size() -> u64 {
    50
}

fn default_next_path() -> Option<FieldPath> {
    Some(FieldPath::new("next"))
}

impl Default for OffsetLimitCursor {
    fn default() -> Self {
        Self {
            items_path: default_items_path(),
            limit_param: default_limit_param(),
            offset_param: default_offset_param(),
            page_size: default_page_size(),
            next_path: default_next_path(),
            total_path: None,
        }
    }
}

impl OffsetLimitCursor {
    fn has_more(&self, offset: u64, limit: u64, fetched: u64, body: &Value) -> Result<bool, NormalizedError> {
        if let Some(next_path) = &self.next_path {
            return match next_path.lookup(body) {
                None | Some(Value::Null) => Ok(false),
                Some(Value::String(next)) => Ok(!next.is_empty()),
                Some(Value::Bool(more)) => Ok(*more),
                Some(other) => Err(NormalizedError::malformed_cursor(format!(
                    "'{}' should be a URL, boolean or null, got {}",
                    next_path, other
                ))),
            };
        }

        if let Some(total_path) = &self.total_path {
            let total = total_path.lookup_u64(body).ok_or_else(|| {
                NormalizedError::malformed_cursor(format!("no numeric total at '{}'", total_path))
            })?;
            let seen = offset.checked_add(fetched).ok_or_else(|| {
                NormalizedError::malformed_cursor(format!(
                    "offset {} plus {} items overflows",
                    offset, fetched
                ))
            })?;
            return Ok(seen < total);
        }

        Ok(fetched >= limit)
    }
}

fn query_number(request: &ApiRequest, name: &str) -> Result<Option<u64>, NormalizedError> {
    match request.query_value(name) {
        None => Ok(None),
        Some(raw) => raw.parse::<u64>().map(Some).map_err(|_| {
            NormalizedError::malformed_cursor(format!("'{}' is not a number: '{}'", name, raw))
        }),
    }
}

impl CursorExtractor for OffsetLimitCursor {
    fn first_page(&self, request: &ApiRequest) -> ApiRequest {
        let mut first = request.clone();
        if first.query_value(&self.limit_param).is_none() {
            first.set_query(self.limit_param.clone(), self.page_size.to_string());
        }
        if first.query_value(&self.offset_param).is_none() {
            first.set_query(self.offset_param.clone(), "0");
        }
        first
    }

    fn extract(&self, request: &ApiRequest, body: &Value) -> Result<PageStep, NormalizedError> {
        let items = items_at(&self.items_path, body)?;
        let fetched = items.len() as u64;
        if fetched == 0 {
            return Ok(PageStep { items, next: None });
        }

        let offset = query_number(request, &self.offset_param)?.unwrap_or(0);
        let limit = query_number(request, &self.limit_param)?.unwrap_or(self.page_size);
        if limit == 0 {
            return Err(NormalizedError::malformed_cursor(format!(
                "'{}' must be positive",
                self.limit_param
            )));
        }

        let next = if self.has_more(offset, limit, fetched, body)? {
            let next_offset = offset.checked_add(limit).ok_or_else(|| {
                NormalizedError::malformed_cursor(format!(
                    "'{}' {} plus '{}' {} overflows",
                    self.offset_param, offset, self.limit_param, limit
                ))
            })?;
            Some(PageCursor::Offset {
                param: self.offset_param.clone(),
                offset: next_offset,
            })
        } else {
            None
        };

        Ok(PageStep { items, next })
    }
}

/// Opaque continuation token pagination, e.g. Hubspot `paging.next.after`,
/// Twitter `next_cursor_str` or Facebook `paging.cursors.after`.
///
/// Stops when the token is absent, null, empty or `0`, or when the guard at
/// `has_more_path` is `false`, null or absent. A guard may be a boolean
/// (`has-more`) or a value whose presence means "more" (Facebook
/// `paging.next`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCursor {
    #[serde(default = "default_items_path")]
    pub items_path: FieldPath,

    /// Where the next token lives in the body.
    pub token_path: FieldPath,

    /// Query parameter the token is sent back in.
    pub token_param: String,

    /// Optional guard such as Hubspot's `has-more` or Facebook's `paging.next`.
    #[serde(default)]
    pub has_more_path: Option<FieldPath>,
}

fn token_value(value: Option<&Value>) -> Result<Option<String>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(token)) if token.is_empty() || token == "0" => Ok(None),
        Some(Value::String(token)) => Ok(Some(token.clone())),
        Some(Value::Number(n)) if n.as_u64() == Some(0) => Ok(None),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(format!("token should be a string or number, got {}", other)),
    }
}

impl CursorExtractor for TokenCursor {
    fn extract(&self, request: &ApiRequest, body: &Value) -> Result<PageStep, NormalizedError> {
        let items = items_at(&self.items_path, body)?;

        let guard = match &self.has_more_path {
            Some(path) => match path.lookup(body) {
                None | Some(Value::Null) => Some(false),
                Some(Value::Bool(more)) => Some(*more),
                Some(Value::String(next)) => Some(!next.is_empty()),
                Some(other) => {
                    return Err(NormalizedError::malformed_cursor(format!(
                        "guard '{}' should be a boolean or URL, got {}",
                        path, other
                    )))
                }
            },
            None => None,
        };

        if guard == Some(false) {
            return Ok(PageStep { items, next: None });
        }

        let token = token_value(self.token_path.lookup(body))
            .map_err(|e| NormalizedError::malformed_cursor(format!("'{}': {}", self.token_path, e)))?;

        let next = match token {
            Some(token) => {
                if request.query_value(&self.token_param) == Some(token.as_str()) {
                    return Err(NormalizedError::malformed_cursor(format!(
                        "provider returned the same '{}' token twice",
                        self.token_path
                    )));
                }
                Some(PageCursor::Token {
                    param: self.token_param.clone(),
                    value: token,
                })
            }
            None if guard == Some(true) => {
                return Err(NormalizedError::malformed_cursor(format!(
                    "more pages reported but '{}' is missing",
                    self.token_path
                )))
            }
            None => None,
        };

        Ok(PageStep { items, next })
    }
}

/// Next-URL pagination, e.g. Facebook Graph `paging.next`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkCursor {
    #[serde(default = "default_link_items_path")]
    pub items_path: FieldPath,

    #[serde(default = "default_link_next_path")]
    pub next_path: FieldPath,
}

fn default_link_items_path() -> FieldPath {
    FieldPath::new("data")
}

fn default_link_next_path() -> FieldPath {
    FieldPath::new("paging.next")
}

impl Default for LinkCursor {
    fn default() -> Self {
        Self {
            items_path: default_link_items_path(),
            next_path: default_link_next_path(),
        }
    }
}

impl CursorExtractor for LinkCursor {
    fn extract(&self, request: &ApiRequest, body: &Value) -> Result<PageStep, NormalizedError> {
        let items = items_at(&self.items_path, body)?;

        let next = match self.next_path.lookup(body) {
            None | Some(Value::Null) => None,
            Some(Value::String(next)) if next.is_empty() => None,
            Some(Value::String(next)) => {
                Url::parse(next).map_err(|e| {
                    NormalizedError::malformed_cursor(format!(
                        "'{}' is not an absolute URL: {}",
                        self.next_path, e
                    ))
                })?;
                if *next == request.path {
                    return Err(NormalizedError::malformed_cursor(format!(
                        "'{}' points at the page just fetched",
                        self.next_path
                    )));
                }
                Some(PageCursor::Url(next.clone()))
            }
            Some(other) => {
                return Err(NormalizedError::malformed_cursor(format!(
                    "'{}' should be a URL, got {}",
                    self.next_path, other
                )))
            }
        };

        Ok(PageStep { items, next })
    }
}

/// An endpoint that returns everything in one response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinglePage {
    /// Where the items live; the root if the body is itself an array.
    #[serde(default = "FieldPath::root")]
    pub items_path: FieldPath,
}

impl CursorExtractor for SinglePage {
    fn extract(&self, _request: &ApiRequest, body: &Value) -> Result<PageStep, NormalizedError> {
        Ok(PageStep {
            items: items_at(&self.items_path, body)?,
            next: None,
        })
    }
}

/// The pagination contract declared by a provider definition.
///
/// # Examples
///
/// ```rust
/// use hookbridge_sdk::client::PaginationStyle;
///
/// let style: PaginationStyle = serde_json::from_value(serde_json::json!({
///     "style": "token",
///     "items_path": "contacts",
///     "token_path": "vid-offset",
///     "token_param": "vidOffset",
///     "has_more_path": "has-more"
/// })).unwrap();
///
/// assert!(matches!(style, PaginationStyle::Token(_)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "style", rename_all = "snake_case")]
pub enum PaginationStyle {
    Offset(OffsetLimitCursor),
    Token(TokenCursor),
    Link(LinkCursor),
    Single(SinglePage),
}

impl CursorExtractor for PaginationStyle {
    fn first_page(&self, request: &ApiRequest) -> ApiRequest {
        match self {
            Self::Offset(cursor) => cursor.first_page(request),
            Self::Token(cursor) => cursor.first_page(request),
            Self::Link(cursor) => cursor.first_page(request),
            Self::Single(cursor) => cursor.first_page(request),
        }
    }

    fn extract(&self, request: &ApiRequest, body: &Value) -> Result<PageStep, NormalizedError> {
        match self {
            Self::Offset(cursor) => cursor.extract(request, body),
            Self::Token(cursor) => cursor.extract(request, body),
            Self::Link(cursor) => cursor.extract(request, body),
            Self::Single(cursor) => cursor.extract(request, body),
        }
    }
}

impl ProviderClient {
    /// Fetch every page and return the items in provider order.
    ///
    /// # Errors
    ///
    /// Any request failure aborts the run. Hitting the page ceiling while the
    /// provider still reports more pages yields an `Unknown` error.
    pub async fn fetch_all(
        &self,
        request: &ApiRequest,
        credential: &Credential,
        extractor: &dyn CursorExtractor,
    ) -> Result<Vec<Value>, NormalizedError> {
        self.fetch_up_to(request, credential, extractor, None).await
    }

    /// Like [`fetch_all`](Self::fetch_all) but stops once `limit` items have
    /// been collected.
    #[instrument(skip_all, fields(path = %request.path, limit = ?limit))]
    pub async fn fetch_up_to(
        &self,
        request: &ApiRequest,
        credential: &Credential,
        extractor: &dyn CursorExtractor,
        limit: Option<usize>,
    ) -> Result<Vec<Value>, NormalizedError> {
        let max_pages = self.config().max_pages;
        let mut current = extractor.first_page(request);
        let mut items = Vec::new();

        for page in 1..=max_pages {
            let body = self.request(&current, credential).await?;
            let step = extractor.extract(&current, &body)?;
            items.extend(step.items);

            if let Some(limit) = limit {
                if items.len() >= limit {
                    items.truncate(limit);
                    debug!(pages = page, items = items.len(), "Item limit reached");
                    return Ok(items);
                }
            }

            match step.next {
                Some(cursor) => current = cursor.apply(&current),
                None => {
                    debug!(pages = page, items = items.len(), "Pagination complete");
                    return Ok(items);
                }
            }
        }

        Err(NormalizedError::pagination_ceiling(max_pages))
    }
}

#[cfg(test)]
#[path = "pagination_tests.rs"]
mod tests;
