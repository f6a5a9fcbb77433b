//! Authorization redirect to the identity provider.

use crate::api::AppState;
use crate::error::BridgeError;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use std::str::FromStr;
use url::Url;

/// Requested scope family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeMode {
    Email,
    Guilds,
    Roles,
}

impl ScopeMode {
    /// OAuth2 scope string requested upstream.
    #[must_use]
    pub const fn scope(self) -> &'static str {
        match self {
            Self::Email => "identify email",
            Self::Guilds => "identify email guilds",
            Self::Roles => "identify email guilds guilds.members.read",
        }
    }
}

impl FromStr for ScopeMode {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(Self::Email),
            "guilds" => Ok(Self::Guilds),
            "roles" => Ok(Self::Roles),
            other => Err(BridgeError::validation(format!("unknown scope mode {other}"))),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub state: Option<String>,
}

pub async fn authorize(
    State(state): State<AppState>,
    Path(scope_mode): Path<String>,
    Query(query): Query<AuthorizeQuery>,
) -> Result<Response, BridgeError> {
    let discord = &state.config.discord;
    let client_id = discord.require_client_id()?;
    discord.require_client_secret()?;
    let redirect_uri = discord.require_redirect_uri()?;

    let mode: ScopeMode = scope_mode.parse()?;
    if query.client_id.as_deref() != Some(client_id) {
        return Err(BridgeError::validation("client_id does not match"));
    }
    if query.redirect_uri.as_deref() != Some(redirect_uri) {
        return Err(BridgeError::validation("redirect_uri does not match"));
    }

    let mut params = vec![
        ("client_id", client_id),
        ("redirect_uri", redirect_uri),
        ("response_type", "code"),
        ("scope", mode.scope()),
    ];
    if let Some(s) = query.state.as_deref() {
        params.push(("state", s));
    }
    params.push(("prompt", "none"));

    let location = Url::parse_with_params(&discord.authorize_url, &params)
        .map_err(|e| BridgeError::config(format!("invalid authorize url: {e}")))?;

    Ok((StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response())
}
