//! Authorization code exchange and ID token issuance.

use crate::api::AppState;
use crate::error::BridgeError;
use crate::idp::discord::TOKEN_SCOPE;
use axum::extract::rejection::FormRejection;
use axum::extract::State;
use axum::{Form, Json};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
pub struct TokenForm {
    pub code: Option<String>,
}

/// Exchange `code` upstream, aggregate the user's claims and return the
/// upstream token response with an `id_token` added.
///
/// A body that is not a well-formed form counts as a missing `code`.
pub async fn token(
    State(state): State<AppState>,
    form: Result<Form<TokenForm>, FormRejection>,
) -> Result<Json<Value>, BridgeError> {
    let Form(form) = form.map_err(|rejection| {
        debug!(error = %rejection, "token request body rejected");
        BridgeError::validation("missing code")
    })?;
    let code = form
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| BridgeError::validation("missing code"))?;
    let audience = state.config.discord.require_client_id()?.to_string();

    let upstream = state.idp.exchange_code(&code).await?;
    let identity = state.idp.fetch_identity(&upstream.access_token).await?;
    identity.ensure_verified()?;

    let guilds = state.idp.fetch_guild_ids(&upstream.access_token).await?;
    let claims = state.aggregator.aggregate(&identity, &guilds).await?;
    let issued = state.issuer.issue(claims, &audience).await?;
    info!(sub = %identity.id, kid = %issued.key_id, guilds = guilds.len(), "id token issued");

    let mut body = upstream.extra;
    body.insert("access_token".to_string(), Value::String(upstream.access_token));
    body.insert("scope".to_string(), Value::String(TOKEN_SCOPE.to_string()));
    body.insert("id_token".to_string(), Value::String(issued.token));
    Ok(Json(Value::Object(body)))
}
