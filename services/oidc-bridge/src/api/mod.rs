//! HTTP surface of the bridge.

pub mod authorize;
pub mod jwks;
pub mod system;
pub mod token;

use crate::config::Config;
use crate::error::BridgeError;
use crate::identity::{AggregatorOptions, ClaimsAggregator, RoleLookup};
use crate::idp::{DiscordClient, IdentityProvider};
use crate::jwks::JwksPublisher;
use crate::jwt::TokenIssuer;
use crate::keys::{KeyManager, KeyStore};
use axum::routing::{get, post};
use axum::Router;
use rust_common::KvStore;
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Upper bound on a whole request, covering every upstream call it makes.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared handler state. Holds no per-request data.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub idp: Arc<dyn IdentityProvider>,
    pub aggregator: Arc<ClaimsAggregator>,
    pub issuer: Arc<TokenIssuer>,
    pub publisher: Arc<JwksPublisher>,
}

impl AppState {
    /// Wire the Discord client and key manager over `kv`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Configuration`] if the HTTP client cannot be built.
    pub fn new(config: Config, kv: Arc<dyn KvStore>) -> Result<Self, BridgeError> {
        let discord = Arc::new(DiscordClient::new(config.discord.clone(), config.upstream_timeout)?);
        let lookup: Option<Arc<dyn RoleLookup>> = if config.discord.role_lookups_enabled() {
            Some(discord.clone() as Arc<dyn RoleLookup>)
        } else {
            info!("role lookups disabled: bot token or server list not configured");
            None
        };
        Ok(Self::with_provider(config, kv, discord, lookup))
    }

    /// Wire explicit upstream collaborators.
    #[must_use]
    pub fn with_provider(
        config: Config,
        kv: Arc<dyn KvStore>,
        idp: Arc<dyn IdentityProvider>,
        lookup: Option<Arc<dyn RoleLookup>>,
    ) -> Self {
        let keys = KeyManager::new(KeyStore::new(kv, config.key_store_key.clone()), config.rsa_key_bits);
        let options = AggregatorOptions {
            lookup_timeout: config.upstream_timeout,
            max_concurrency: config.role_lookup_concurrency,
            eligible_guilds: config.discord.server_list.clone(),
        };

        Self {
            idp,
            aggregator: Arc::new(ClaimsAggregator::new(lookup, options)),
            issuer: Arc::new(TokenIssuer::new(keys.clone(), config.issuer.clone())),
            publisher: Arc::new(JwksPublisher::new(keys)),
            config: Arc::new(config),
        }
    }
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(system::hello))
        .route("/metrics", get(system::metrics))
        .route("/authorize/{scope_mode}", get(authorize::authorize))
        .route("/token", post(token::token))
        .route("/jwk.json", get(jwks::jwk_set))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
