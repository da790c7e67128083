//! Built-in provider definitions.
//!
//! Credential attributes the templates below expect:
//!
//! - Twitter: `env_name` (Account Activity environment label)
//! - Facebook Leads: `app_id`; secrets `app_secret`, `verify_token`
//! - Hubspot: `app_id`

use super::{
    ChallengeSpec, IdSource, InboundSpec, ListEndpoint, ProviderDefinition, VerifyTokenSpec,
    WebhookApi,
};
use crate::dispatch::{KeyTag, TagSource};
use crate::template::{EndpointTemplate, HttpMethod};
use crate::EventType;
use hookbridge_sdk::client::{
    ErrorMapping, OffsetLimitCursor, PaginationStyle, SinglePage, TokenCursor,
};
use hookbridge_sdk::webhook::{ChallengeMode, SignatureEncoding, SignatureScheme, SignedDelivery};
use hookbridge_sdk::FieldPath;
use serde_json::json;

/// Every built-in definition.
pub fn all() -> Vec<ProviderDefinition> {
    vec![
        convertkit(),
        discord(),
        facebook_leads(),
        hubspot(),
        spotify(),
        twitter(),
    ]
}

fn catalog(tags: &[&str]) -> Vec<EventType> {
    tags.iter()
        .filter_map(|tag| EventType::new(*tag).ok())
        .collect()
}

fn key_tag(key: &str, tag: &str) -> Option<KeyTag> {
    Some(KeyTag {
        key: key.to_string(),
        tag: EventType::new(tag).ok()?,
    })
}

/// Spotify Web API. Bulk reads only, offset/limit pages of 50.
pub fn spotify() -> ProviderDefinition {
    ProviderDefinition {
        name: "spotify".to_string(),
        base_url: "https://api.spotify.com/v1".to_string(),
        error_mapping: ErrorMapping::default(),
        pagination: Some(PaginationStyle::Offset(OffsetLimitCursor::default())),
        events: Vec::new(),
        webhook: None,
        inbound: None,
    }
}

/// Twitter Account Activity API.
///
/// Registration is two calls: the webhook (form-encoded `url`) and then the
/// user subscription. Handshakes are CRC checks signed with the consumer
/// secret; deliveries are tagged by which event array they carry.
pub fn twitter() -> ProviderDefinition {
    let env = "/account_activity/all/{env_name}";

    ProviderDefinition {
        name: "twitter".to_string(),
        base_url: "https://api.twitter.com/1.1".to_string(),
        error_mapping: ErrorMapping::default(),
        pagination: Some(PaginationStyle::Token(TokenCursor {
            items_path: FieldPath::new("users"),
            token_path: FieldPath::new("next_cursor"),
            token_param: "cursor".to_string(),
            has_more_path: None,
        })),
        events: catalog(&[
            "likedTweet",
            "newFollower",
            "myTweet",
            "searchMention",
            "userTweet",
        ]),
        webhook: Some(WebhookApi {
            create: EndpointTemplate::new(HttpMethod::Post, format!("{}/webhooks.json", env))
                .with_form("url", "{callback_url}"),
            id: IdSource::Response {
                path: FieldPath::new("id"),
            },
            subscribe: Some(EndpointTemplate::new(
                HttpMethod::Post,
                format!("{}/subscriptions.json", env),
            )),
            delete: EndpointTemplate::new(
                HttpMethod::Delete,
                format!("{}/webhooks/{{subscription_id}}.json", env),
            ),
            list: Some(ListEndpoint {
                request: EndpointTemplate::new(HttpMethod::Get, format!("{}/webhooks.json", env)),
                items_path: FieldPath::root(),
                id_path: FieldPath::new("id"),
                callback_path: FieldPath::new("url"),
            }),
            max_events: None,
        }),
        inbound: Some(InboundSpec {
            tag: TagSource::KeyPresence {
                keys: [
                    key_tag("favorite_events", "likedTweet"),
                    key_tag("follow_events", "newFollower"),
                    key_tag("tweet_create_events", "myTweet"),
                ]
                .into_iter()
                .flatten()
                .collect(),
            },
            challenge: Some(ChallengeSpec {
                token_param: "crc_token".to_string(),
                response: ChallengeMode::Signed {
                    prefix: "sha256=".to_string(),
                    delivery: SignedDelivery::JsonField {
                        name: "response_token".to_string(),
                    },
                },
                secret: Some("consumer_secret".to_string()),
                verify_token: None,
            }),
            signature: Some(SignatureScheme {
                header: "x-twitter-webhooks-signature".to_string(),
                prefix: "sha256=".to_string(),
                encoding: SignatureEncoding::Base64,
                secret: "consumer_secret".to_string(),
            }),
        }),
    }
}

/// Facebook Graph app subscriptions for lead ads.
///
/// The create call answers `{"success": true}`; the subscription is
/// addressed by its object type (`page`) afterwards.
pub fn facebook_leads() -> ProviderDefinition {
    ProviderDefinition {
        name: "facebook-leads".to_string(),
        base_url: "https://graph.facebook.com/v18.0".to_string(),
        error_mapping: ErrorMapping::default(),
        pagination: Some(PaginationStyle::Token(TokenCursor {
            items_path: FieldPath::new("data"),
            token_path: FieldPath::new("paging.cursors.after"),
            token_param: "after".to_string(),
            has_more_path: Some(FieldPath::new("paging.next")),
        })),
        events: catalog(&["leadgen"]),
        webhook: Some(WebhookApi {
            create: EndpointTemplate::new(HttpMethod::Post, "/{app_id}/subscriptions").with_json(
                json!({
                    "object": "page",
                    "callback_url": "{callback_url}",
                    "fields": "{events_csv}",
                    "verify_token": "{secret.verify_token}",
                    "include_values": true
                }),
            ),
            id: IdSource::Template {
                value: "page".to_string(),
                success_path: Some(FieldPath::new("success")),
            },
            subscribe: None,
            delete: EndpointTemplate::new(HttpMethod::Delete, "/{app_id}/subscriptions")
                .with_query("object", "{subscription_id}"),
            list: Some(ListEndpoint {
                request: EndpointTemplate::new(HttpMethod::Get, "/{app_id}/subscriptions"),
                items_path: FieldPath::new("data"),
                id_path: FieldPath::new("object"),
                callback_path: FieldPath::new("callback_url"),
            }),
            max_events: None,
        }),
        inbound: Some(InboundSpec {
            tag: TagSource::Field {
                path: FieldPath::new("entry.0.changes.0.field"),
            },
            challenge: Some(ChallengeSpec {
                token_param: "hub.challenge".to_string(),
                response: ChallengeMode::JsonEcho {
                    field: "hub_challenge".to_string(),
                },
                secret: None,
                verify_token: Some(VerifyTokenSpec {
                    param: "hub.verify_token".to_string(),
                    secret: "verify_token".to_string(),
                }),
            }),
            signature: Some(SignatureScheme {
                header: "x-hub-signature-256".to_string(),
                prefix: "sha256=".to_string(),
                encoding: SignatureEncoding::Hex,
                secret: "app_secret".to_string(),
            }),
        }),
    }
}

/// Hubspot webhook settings (API key in the `hapikey` query parameter).
///
/// The app has one target URL; events are filtered locally.
pub fn hubspot() -> ProviderDefinition {
    ProviderDefinition {
        name: "hubspot".to_string(),
        base_url: "https://api.hubapi.com".to_string(),
        error_mapping: ErrorMapping::default(),
        pagination: Some(PaginationStyle::Token(TokenCursor {
            items_path: FieldPath::new("results"),
            token_path: FieldPath::new("paging.next.after"),
            token_param: "after".to_string(),
            has_more_path: None,
        })),
        events: catalog(&[
            "contact.creation",
            "contact.deletion",
            "contact.propertyChange",
            "contact.privacyDeletion",
            "company.creation",
            "company.deletion",
            "company.propertyChange",
            "deal.creation",
            "deal.deletion",
            "deal.propertyChange",
        ]),
        webhook: Some(WebhookApi {
            create: EndpointTemplate::new(HttpMethod::Put, "/webhooks/v1/{app_id}/settings")
                .with_json(json!({
                    "webhookUrl": "{callback_url}",
                    "maxConcurrentRequests": 5
                })),
            id: IdSource::Template {
                value: "{app_id}".to_string(),
                success_path: None,
            },
            subscribe: None,
            delete: EndpointTemplate::new(HttpMethod::Delete, "/webhooks/v1/{app_id}/settings"),
            list: None,
            max_events: None,
        }),
        inbound: Some(InboundSpec {
            tag: TagSource::Field {
                path: FieldPath::new("0.subscriptionType"),
            },
            challenge: None,
            signature: None,
        }),
    }
}

/// ConvertKit automation hooks (API secret in the `api_secret` query
/// parameter). One hook carries exactly one event.
pub fn convertkit() -> ProviderDefinition {
    ProviderDefinition {
        name: "convertkit".to_string(),
        base_url: "https://api.convertkit.com/v3".to_string(),
        error_mapping: ErrorMapping::default(),
        pagination: Some(PaginationStyle::Single(SinglePage {
            items_path: FieldPath::new("subscribers"),
        })),
        events: catalog(&[
            "subscriber.subscriber_activate",
            "subscriber.subscriber_unsubscribe",
            "purchase.purchase_create",
        ]),
        webhook: Some(WebhookApi {
            create: EndpointTemplate::new(HttpMethod::Post, "/automations/hooks").with_json(
                json!({
                    "target_url": "{callback_url}",
                    "event": { "name": "{event}" }
                }),
            ),
            id: IdSource::Response {
                path: FieldPath::new("rule.id"),
            },
            subscribe: None,
            delete: EndpointTemplate::new(
                HttpMethod::Delete,
                "/automations/hooks/{subscription_id}",
            ),
            list: None,
            max_events: Some(1),
        }),
        inbound: Some(InboundSpec {
            tag: TagSource::Registered,
            challenge: None,
            signature: None,
        }),
    }
}

/// Discord (OAuth2 bearer). Bulk reads only; the guild listing returns a
/// bare array.
pub fn discord() -> ProviderDefinition {
    ProviderDefinition {
        name: "discord".to_string(),
        base_url: "https://discord.com/api/v10".to_string(),
        error_mapping: ErrorMapping::default(),
        pagination: Some(PaginationStyle::Single(SinglePage {
            items_path: FieldPath::root(),
        })),
        events: Vec::new(),
        webhook: None,
        inbound: None,
    }
}

#[cfg(test)]
#[path = "builtin_tests.rs"]
mod tests;
