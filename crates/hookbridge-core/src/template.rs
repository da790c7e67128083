//! `{name}` placeholder templates for provider endpoints.
//!
//! Lifecycle endpoints differ per provider only in their paths and bodies,
//! so those are declared as templates and rendered against a
//! [`TemplateContext`]:
//!
//! | Placeholder         | Value                                                |
//! |---------------------|------------------------------------------------------|
//! | `{callback_url}`    | The integration's public webhook URL                 |
//! | `{subscription_id}` | The provider-side id, once known                     |
//! | `{events}`          | Enabled events; a JSON array when it is a whole string |
//! | `{events_csv}`      | Enabled events joined with `,`                       |
//! | `{event}`           | The first enabled event                              |
//! | `{<attribute>}`     | Any plain credential attribute, e.g. `{app_id}`      |
//! | `{secret.<name>}`   | A credential secret, e.g. `{secret.verify_token}`    |

use crate::EventType;
use hookbridge_sdk::auth::{Credential, SecretString};
use hookbridge_sdk::client::{ApiRequest, RequestBody};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Errors raised while rendering a template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("Template placeholder '{{{name}}}' has no value")]
    UnknownPlaceholder { name: String },

    #[error("Template '{template}' has an unterminated placeholder")]
    Unterminated { template: String },
}

#[derive(Clone)]
enum TemplateValue {
    Text(String),
    List(Vec<String>),
    Secret(SecretString),
}

impl TemplateValue {
    fn as_text(&self) -> String {
        match self {
            Self::Text(value) => value.clone(),
            Self::List(values) => values.join(","),
            Self::Secret(secret) => secret.expose_secret().to_string(),
        }
    }
}

/// The values available to a template.
#[derive(Clone, Default)]
pub struct TemplateContext {
    values: HashMap<String, TemplateValue>,
}

impl TemplateContext {
    /// An empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the context a lifecycle call renders against.
    pub fn for_integration(
        credential: &Credential,
        callback_url: &str,
        subscription_id: Option<&str>,
        events: &BTreeSet<EventType>,
    ) -> Self {
        let mut context = Self::new();

        for (name, value) in credential.attributes() {
            context = context.with_text(name.clone(), value.clone());
        }
        for name in credential.secret_names() {
            if let Some(secret) = credential.secret(name) {
                context = context.with_secret(format!("secret.{}", name), secret.clone());
            }
        }

        let events: Vec<String> = events.iter().map(|e| e.as_str().to_string()).collect();
        if let Some(first) = events.first() {
            context = context.with_text("event", first.clone());
        }

        context = context
            .with_text("callback_url", callback_url)
            .with_text("events_csv", events.join(","))
            .with_list("events", events);

        if let Some(id) = subscription_id {
            context = context.with_text("subscription_id", id);
        }

        context
    }

    /// Add a plain value.
    pub fn with_text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values
            .insert(name.into(), TemplateValue::Text(value.into()));
        self
    }

    /// Add a list; rendered as a JSON array when it fills a whole string.
    pub fn with_list(mut self, name: impl Into<String>, values: Vec<String>) -> Self {
        self.values.insert(name.into(), TemplateValue::List(values));
        self
    }

    /// Add a secret value.
    pub fn with_secret(mut self, name: impl Into<String>, value: SecretString) -> Self {
        self.values
            .insert(name.into(), TemplateValue::Secret(value));
        self
    }

    /// Render a string, substituting every placeholder verbatim.
    pub fn render_str(&self, template: &str) -> Result<String, TemplateError> {
        self.render_with(template, |value| value)
    }

    /// Render a URL path; substitutions are percent-encoded.
    pub fn render_path(&self, template: &str) -> Result<String, TemplateError> {
        self.render_with(template, |value| urlencoding::encode(&value).into_owned())
    }

    /// Render every string inside a JSON document.
    ///
    /// A string that is exactly one list placeholder (`"{events}"`) becomes a
    /// JSON array.
    pub fn render_value(&self, template: &Value) -> Result<Value, TemplateError> {
        match template {
            Value::String(text) => {
                if let Some(TemplateValue::List(values)) = whole_placeholder(text)
                    .and_then(|name| self.values.get(name))
                {
                    return Ok(Value::Array(
                        values.iter().cloned().map(Value::String).collect(),
                    ));
                }
                Ok(Value::String(self.render_str(text)?))
            }
            Value::Array(items) => items
                .iter()
                .map(|item| self.render_value(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(map) => {
                let mut rendered = serde_json::Map::with_capacity(map.len());
                for (key, value) in map {
                    rendered.insert(key.clone(), self.render_value(value)?);
                }
                Ok(Value::Object(rendered))
            }
            other => Ok(other.clone()),
        }
    }

    fn render_with(
        &self,
        template: &str,
        encode: impl Fn(String) -> String,
    ) -> Result<String, TemplateError> {
        let mut output = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find('{') {
            output.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let end = after.find('}').ok_or_else(|| TemplateError::Unterminated {
                template: template.to_string(),
            })?;

            let name = &after[..end];
            let value = self
                .values
                .get(name)
                .ok_or_else(|| TemplateError::UnknownPlaceholder {
                    name: name.to_string(),
                })?;
            output.push_str(&encode(value.as_text()));
            rest = &after[end + 1..];
        }

        output.push_str(rest);
        Ok(output)
    }
}

impl fmt::Debug for TemplateContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.values.keys().collect();
        names.sort();
        f.debug_struct("TemplateContext")
            .field("placeholders", &names)
            .finish()
    }
}

fn whole_placeholder(text: &str) -> Option<&str> {
    let name = text.strip_prefix('{')?.strip_suffix('}')?;
    if name.contains(['{', '}']) {
        return None;
    }
    Some(name)
}

/// HTTP methods a provider endpoint may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        }
    }
}

/// Body of an endpoint template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BodyTemplate {
    #[default]
    Empty,
    Json(Value),
    Form(BTreeMap<String, String>),
}

/// One provider endpoint: method, path, query and body, all templated.
///
/// # Examples
///
/// ```rust
/// use hookbridge_core::template::{EndpointTemplate, TemplateContext};
///
/// let endpoint: EndpointTemplate = serde_yaml::from_str(r#"
/// method: DELETE
/// path: /account_activity/all/{env_name}/webhooks/{subscription_id}.json
/// "#).unwrap();
///
/// let context = TemplateContext::new()
///     .with_text("env_name", "prod")
///     .with_text("subscription_id", "1234");
///
/// let request = endpoint.render(&context).unwrap();
/// assert_eq!(request.path, "/account_activity/all/prod/webhooks/1234.json");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointTemplate {
    pub method: HttpMethod,
    pub path: String,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    #[serde(default)]
    pub body: BodyTemplate,
}

impl EndpointTemplate {
    /// Endpoint without query or body.
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: BTreeMap::new(),
            body: BodyTemplate::Empty,
        }
    }

    /// Add a query parameter.
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    /// Set a JSON body.
    pub fn with_json(mut self, body: Value) -> Self {
        self.body = BodyTemplate::Json(body);
        self
    }

    /// Set a form body.
    pub fn with_form(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut fields = match std::mem::take(&mut self.body) {
            BodyTemplate::Form(fields) => fields,
            _ => BTreeMap::new(),
        };
        fields.insert(name.into(), value.into());
        self.body = BodyTemplate::Form(fields);
        self
    }

    /// Render into a request for the adapter.
    pub fn render(&self, context: &TemplateContext) -> Result<ApiRequest, TemplateError> {
        let mut request = ApiRequest::new(self.method.into(), context.render_path(&self.path)?);

        for (name, value) in &self.query {
            request.set_query(name.clone(), context.render_str(value)?);
        }

        request.body = match &self.body {
            BodyTemplate::Empty => RequestBody::Empty,
            BodyTemplate::Json(body) => RequestBody::Json(context.render_value(body)?),
            BodyTemplate::Form(fields) => RequestBody::Form(
                fields
                    .iter()
                    .map(|(name, value)| Ok((name.clone(), context.render_str(value)?)))
                    .collect::<Result<Vec<_>, TemplateError>>()?,
            ),
        };

        Ok(request)
    }
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
