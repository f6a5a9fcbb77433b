//! Discord client tests against a mocked REST API.

mod common;

use common::{test_config, CLIENT_ID, CLIENT_SECRET};
use oidc_bridge::identity::RoleLookup;
use oidc_bridge::idp::{DiscordClient, IdentityProvider};
use oidc_bridge::BridgeError;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn client(server: &MockServer) -> DiscordClient {
    let config = test_config(&server.uri());
    DiscordClient::new(config.discord, Duration::from_secs(2)).unwrap()
}

#[tokio::test]
async fn exchange_posts_form_and_keeps_extra_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains(format!("client_id={CLIENT_ID}").as_str()))
        .and(body_string_contains(format!("client_secret={CLIENT_SECRET}").as_str()))
        .and(body_string_contains("code=abc"))
        .and(body_string_contains("scope=identify+email"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "at-1",
            "token_type": "Bearer",
            "expires_in": 604800,
            "refresh_token": "rt-1",
            "scope": "identify email guilds"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = client(&server).await.exchange_code("abc").await.unwrap();
    assert_eq!(response.access_token, "at-1");
    assert_eq!(response.extra["refresh_token"], "rt-1");
    assert_eq!(response.extra["expires_in"], 604800);
}

#[tokio::test]
async fn exchange_failure_is_upstream_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})))
        .mount(&server)
        .await;

    let err = client(&server).await.exchange_code("stale").await.unwrap_err();
    assert!(matches!(err, BridgeError::Upstream(_)));
}

#[tokio::test]
async fn exchange_without_access_token_is_upstream_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "weird"})))
        .mount(&server)
        .await;

    let err = client(&server).await.exchange_code("abc").await.unwrap_err();
    assert!(matches!(err, BridgeError::Upstream(_)));
}

#[tokio::test]
async fn fetch_identity_uses_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/@me"))
        .and(header("authorization", "Bearer at-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "42",
            "username": "ann",
            "discriminator": "0",
            "global_name": "Ann",
            "verified": true,
            "email": "ann@example.com"
        })))
        .mount(&server)
        .await;

    let identity = client(&server).await.fetch_identity("at-1").await.unwrap();
    assert_eq!(identity.id, "42");
    assert_eq!(identity.display_name(), "Ann");
    assert!(identity.verified);
}

#[tokio::test]
async fn guild_list_failure_yields_empty_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/@me/guilds"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let guilds = client(&server).await.fetch_guild_ids("at-1").await.unwrap();
    assert!(guilds.is_empty());
}

#[tokio::test]
async fn guild_list_returns_ids_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/@me/guilds"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "g2", "name": "Two", "owner": false},
            {"id": "g1", "name": "One", "owner": true}
        ])))
        .mount(&server)
        .await;

    let guilds = client(&server).await.fetch_guild_ids("at-1").await.unwrap();
    assert_eq!(guilds, vec!["g2".to_string(), "g1".to_string()]);
}

#[tokio::test]
async fn member_lookup_uses_bot_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/guilds/g1/members/42"))
        .and(header("authorization", "Bot bot-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "roles": ["r1", "r2"],
            "nick": null
        })))
        .mount(&server)
        .await;

    let roles = client(&server).await.member_roles("g1", "42").await.unwrap();
    assert_eq!(roles, Some(vec!["r1".to_string(), "r2".to_string()]));
}

#[tokio::test]
async fn member_lookup_not_found_is_absence() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/guilds/g1/members/42"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Unknown Member", "code": 10007})))
        .mount(&server)
        .await;

    let roles = client(&server).await.member_roles("g1", "42").await.unwrap();
    assert_eq!(roles, None);
}

#[tokio::test]
async fn member_lookup_server_error_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/guilds/g1/members/42"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    assert!(client(&server).await.member_roles("g1", "42").await.is_err());
}
