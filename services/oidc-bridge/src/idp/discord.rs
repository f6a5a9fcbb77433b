//! Discord REST v10 client.

use crate::config::DiscordConfig;
use crate::error::BridgeError;
use crate::identity::{IdentityRecord, RoleLookup};
use crate::idp::{IdentityProvider, TokenResponse};
use crate::metrics;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_common::{build_http_client, HttpConfig};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Scope requested in the token exchange.
pub const TOKEN_SCOPE: &str = "identify email";

#[derive(Deserialize)]
struct GuildSummary {
    id: String,
}

#[derive(Deserialize)]
struct GuildMember {
    #[serde(default)]
    roles: Vec<String>,
}

/// Discord API client, used both for the OAuth2 exchange and for bot-authorized
/// guild member lookups.
#[derive(Clone)]
pub struct DiscordClient {
    http: Client,
    config: DiscordConfig,
}

impl DiscordClient {
    /// Build a client whose calls are each bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Configuration`] if the HTTP client cannot be built.
    pub fn new(config: DiscordConfig, timeout: Duration) -> Result<Self, BridgeError> {
        let http_config = HttpConfig::default()
            .with_timeout(timeout)
            .with_user_agent(concat!("oidc-bridge/", env!("CARGO_PKG_VERSION")));
        let http = build_http_client(&http_config)
            .map_err(|e| BridgeError::config(format!("failed to build http client: {e}")))?;
        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl IdentityProvider for DiscordClient {
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, BridgeError> {
        let form = [
            ("client_id", self.config.require_client_id()?),
            ("client_secret", self.config.require_client_secret()?),
            ("redirect_uri", self.config.require_redirect_uri()?),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("scope", TOKEN_SCOPE),
        ];

        let started = Instant::now();
        let response = self.http.post(self.url("oauth2/token")).form(&form).send().await?;
        metrics::record_upstream_latency("token", started.elapsed().as_secs_f64());

        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::upstream(format!("token exchange returned {status}")));
        }
        let body: Option<TokenResponse> = response.json().await?;
        body.ok_or_else(|| BridgeError::upstream("token exchange returned an empty body"))
    }

    async fn fetch_identity(&self, access_token: &str) -> Result<IdentityRecord, BridgeError> {
        let started = Instant::now();
        let response = self
            .http
            .get(self.url("users/@me"))
            .bearer_auth(access_token)
            .send()
            .await?;
        metrics::record_upstream_latency("user", started.elapsed().as_secs_f64());

        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::upstream(format!("user lookup returned {status}")));
        }
        Ok(response.json().await?)
    }

    async fn fetch_guild_ids(&self, access_token: &str) -> Result<Vec<String>, BridgeError> {
        let started = Instant::now();
        let response = self
            .http
            .get(self.url("users/@me/guilds"))
            .bearer_auth(access_token)
            .send()
            .await?;
        metrics::record_upstream_latency("guilds", started.elapsed().as_secs_f64());

        if response.status() != StatusCode::OK {
            warn!(status = %response.status(), "guild list unavailable, continuing without guilds");
            return Ok(Vec::new());
        }
        let guilds: Vec<GuildSummary> = response.json().await?;
        Ok(guilds.into_iter().map(|g| g.id).collect())
    }
}

#[async_trait]
impl RoleLookup for DiscordClient {
    async fn member_roles(&self, guild_id: &str, user_id: &str) -> Result<Option<Vec<String>>, BridgeError> {
        let bot_token = self
            .config
            .bot_token
            .as_deref()
            .ok_or_else(|| BridgeError::config("DISCORD_CLIENT_TOKEN is not set"))?;

        let started = Instant::now();
        let response = self
            .http
            .get(self.url(&format!("guilds/{guild_id}/members/{user_id}")))
            .header(reqwest::header::AUTHORIZATION, format!("Bot {bot_token}"))
            .send()
            .await?;
        metrics::record_upstream_latency("member", started.elapsed().as_secs_f64());

        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!(guild_id, "user is not a member");
                Ok(None)
            }
            status if status.is_success() => {
                let member: GuildMember = response.json().await?;
                Ok(Some(member.roles))
            }
            status => Err(BridgeError::upstream(format!("member lookup returned {status}"))),
        }
    }
}
