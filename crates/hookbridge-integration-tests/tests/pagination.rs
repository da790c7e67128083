//! Integration tests for paginated reads through the provider catalog
//!
//! Every cursor style is exercised against a mocked provider using the
//! pagination contract its catalog entry declares.

mod common;

use common::at;
use hookbridge_core::providers::{builtin, ProviderCatalog};
use hookbridge_sdk::client::{ApiRequest, ClientConfig};
use hookbridge_sdk::{AuthScheme, Credential, ErrorKind};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn items(prefix: &str, count: usize) -> Vec<Value> {
    (0..count).map(|i| json!({ "id": format!("{}-{}", prefix, i) })).collect()
}

fn bearer() -> Credential {
    Credential::new(AuthScheme::bearer("token"))
}

#[tokio::test]
async fn test_offset_pages_are_concatenated_in_order() {
    let server = MockServer::start().await;
    for (offset, count, next) in [
        ("100", 7, Value::Null),
        ("50", 50, json!("more")),
    ] {
        Mock::given(method("GET"))
            .and(path("/me/tracks"))
            .and(query_param("offset", offset))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": items(offset, count),
                "next": next
            })))
            .expect(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/me/tracks"))
        .and(header("authorization", "Bearer token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": items("0", 50),
            "next": "more"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let spotify = at(&server, builtin::spotify());
    let client = spotify.client(ClientConfig::default()).unwrap();

    let all = client
        .fetch_all(&ApiRequest::get("/me/tracks"), &bearer(), &spotify.pagination())
        .await
        .unwrap();

    assert_eq!(all.len(), 107);
    assert_eq!(all[0]["id"], "0-0");
    assert_eq!(all[50]["id"], "50-0");
    assert_eq!(all[106]["id"], "100-6");
}

#[tokio::test]
async fn test_page_ceiling_stops_endless_provider() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/tracks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": items("x", 50),
            "next": "always"
        })))
        .expect(3)
        .mount(&server)
        .await;

    let spotify = at(&server, builtin::spotify());
    let client = spotify
        .client(ClientConfig::default().with_max_pages(3))
        .unwrap();

    let error = client
        .fetch_all(&ApiRequest::get("/me/tracks"), &bearer(), &spotify.pagination())
        .await
        .unwrap_err();

    assert_eq!(error.kind, ErrorKind::Unknown);
}

#[tokio::test]
async fn test_token_cursor_follows_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/crm/v3/objects/contacts"))
        .and(query_param("after", "p2"))
        .and(query_param("hapikey", "hub-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{ "id": "3" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/crm/v3/objects/contacts"))
        .and(query_param_is_missing("after"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{ "id": "1" }, { "id": "2" }],
            "paging": { "next": { "after": "p2" } }
        })))
        .mount(&server)
        .await;

    let hubspot = at(&server, builtin::hubspot());
    let client = hubspot.client(ClientConfig::default()).unwrap();
    let credential = Credential::new(AuthScheme::api_key_query("hapikey", "hub-key"));

    let all = client
        .fetch_all(
            &ApiRequest::get("/crm/v3/objects/contacts"),
            &credential,
            &hubspot.pagination(),
        )
        .await
        .unwrap();

    let ids: Vec<&str> = all.iter().filter_map(|c| c["id"].as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
}

#[tokio::test]
async fn test_link_cursor_from_loaded_definition() {
    let server = MockServer::start().await;
    let next = format!("{}/pages?cursor=2", server.uri());
    Mock::given(method("GET"))
        .and(path("/pages"))
        .and(query_param("cursor", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "id": "b" }],
            "paging": {}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "id": "a" }],
            "paging": { "next": next }
        })))
        .mount(&server)
        .await;

    let mut catalog = ProviderCatalog::builtin();
    let added = catalog
        .extend_from_yaml(&format!(
            "- name: graph-pages\n  base_url: {}\n  pagination:\n    style: link\n",
            server.uri()
        ))
        .unwrap();
    assert_eq!(added, 1);
    let provider = catalog.get("graph-pages").unwrap();
    let client = provider.client(ClientConfig::default()).unwrap();

    let all = client
        .fetch_all(&ApiRequest::get("/pages"), &bearer(), &provider.pagination())
        .await
        .unwrap();

    assert_eq!(all, vec![json!({ "id": "a" }), json!({ "id": "b" })]);
}

#[tokio::test]
async fn test_discord_single_page_bare_array() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/@me/guilds"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "g1" },
            { "id": "g2" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let discord = at(&server, builtin::discord());
    let client = discord.client(ClientConfig::default()).unwrap();

    let guilds = client
        .fetch_up_to(
            &ApiRequest::get("/users/@me/guilds"),
            &bearer(),
            &discord.pagination(),
            Some(10),
        )
        .await
        .unwrap();

    assert_eq!(guilds.len(), 2);
}
