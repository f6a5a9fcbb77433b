//! Identity provider client.

pub mod discord;

pub use discord::DiscordClient;

use crate::error::BridgeError;
use crate::identity::IdentityRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// OAuth2 token endpoint response. Fields other than `access_token` are kept
/// verbatim so they can be passed back to the caller.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("fields", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Upstream OAuth2 calls made while serving `/token`.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchange an authorization code for an access token.
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, BridgeError>;

    /// The user the access token belongs to.
    async fn fetch_identity(&self, access_token: &str) -> Result<IdentityRecord, BridgeError>;

    /// Ids of the guilds the user belongs to. Unavailable guild data yields
    /// an empty list.
    async fn fetch_guild_ids(&self, access_token: &str) -> Result<Vec<String>, BridgeError>;
}
