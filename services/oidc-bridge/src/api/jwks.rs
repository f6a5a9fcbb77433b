use crate::api::AppState;
use crate::error::BridgeError;
use crate::jwks::Jwks;
use axum::extract::State;
use axum::Json;

/// Serve the verification key set. Creates the key pair on first use.
pub async fn jwk_set(State(state): State<AppState>) -> Result<Json<Jwks>, BridgeError> {
    Ok(Json(state.publisher.public_key_set().await?))
}
