//! Centralized configuration for the bridge.
//!
//! All configuration is loaded from environment variables. Credentials are
//! optional at startup; endpoints that need a missing one answer with a
//! configuration error instead.

use crate::error::BridgeError;
use std::collections::HashSet;
use std::env;
use std::fmt;
use std::time::Duration;

/// Minimum accepted RSA modulus size.
pub const MIN_RSA_KEY_BITS: usize = 2048;

/// Default `iss` claim.
pub const DEFAULT_ISSUER: &str = "https://cloudflare.com";

/// Where the signing key pair is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvBackend {
    /// Process-local store; only safe for a single replica.
    Memory,
    /// Shared Redis instance.
    Redis {
        /// Connection URL
        url: String,
    },
}

/// Discord application credentials and endpoints.
#[derive(Clone)]
pub struct DiscordConfig {
    /// OAuth2 client id; also the `aud` of issued tokens
    pub client_id: Option<String>,
    /// OAuth2 client secret
    pub client_secret: Option<String>,
    /// Bot token used for guild member lookups
    pub bot_token: Option<String>,
    /// Redirect URI registered with the application
    pub redirect_uri: Option<String>,
    /// Guilds eligible for role lookups
    pub server_list: Option<HashSet<String>>,
    /// REST API base, without trailing slash
    pub api_base: String,
    /// Authorization endpoint
    pub authorize_url: String,
}

impl DiscordConfig {
    /// Client id, or a configuration error.
    pub fn require_client_id(&self) -> Result<&str, BridgeError> {
        self.client_id
            .as_deref()
            .ok_or_else(|| BridgeError::config("DISCORD_CLIENT_ID is not set"))
    }

    /// Client secret, or a configuration error.
    pub fn require_client_secret(&self) -> Result<&str, BridgeError> {
        self.client_secret
            .as_deref()
            .ok_or_else(|| BridgeError::config("DISCORD_CLIENT_SECRET is not set"))
    }

    /// Redirect URI, or a configuration error.
    pub fn require_redirect_uri(&self) -> Result<&str, BridgeError> {
        self.redirect_uri
            .as_deref()
            .ok_or_else(|| BridgeError::config("DISCORD_REDIRECT_URI is not set"))
    }

    /// Role lookups need both a bot token and a guild allow-list.
    #[must_use]
    pub fn role_lookups_enabled(&self) -> bool {
        self.bot_token.is_some() && self.server_list.as_ref().is_some_and(|s| !s.is_empty())
    }
}

impl fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("DiscordConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("bot_token", &redact(&self.bot_token))
            .field("redirect_uri", &self.redirect_uri)
            .field("server_list", &self.server_list)
            .field("api_base", &self.api_base)
            .field("authorize_url", &self.authorize_url)
            .finish()
    }
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            bot_token: None,
            redirect_uri: None,
            server_list: None,
            api_base: "https://discord.com/api/v10".to_string(),
            authorize_url: "https://discord.com/api/oauth2/authorize".to_string(),
        }
    }
}

/// Bridge configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Upstream identity provider settings
    pub discord: DiscordConfig,
    /// `iss` claim of issued tokens
    pub issuer: String,
    /// Key store backend
    pub kv_backend: KvBackend,
    /// Record key holding the serialized key pair
    pub key_store_key: String,
    /// RSA modulus size for newly generated keys
    pub rsa_key_bits: usize,
    /// Per-call timeout for upstream requests
    pub upstream_timeout: Duration,
    /// Bound on concurrent role lookups per request
    pub role_lookup_concurrency: usize,
    /// Log level filter
    pub log_level: String,
    /// Emit JSON logs
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8787,
            discord: DiscordConfig::default(),
            issuer: DEFAULT_ISSUER.to_string(),
            kv_backend: KvBackend::Memory,
            key_store_key: "keys".to_string(),
            rsa_key_bits: MIN_RSA_KEY_BITS,
            upstream_timeout: Duration::from_millis(5000),
            role_lookup_concurrency: 8,
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but malformed.
    pub fn from_env() -> Result<Self, BridgeError> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let discord = DiscordConfig {
            client_id: optional_env("DISCORD_CLIENT_ID"),
            client_secret: optional_env("DISCORD_CLIENT_SECRET"),
            bot_token: optional_env("DISCORD_CLIENT_TOKEN"),
            redirect_uri: optional_env("DISCORD_REDIRECT_URI"),
            server_list: optional_env("SERVER_LIST").map(|raw| parse_server_list(&raw)),
            api_base: env::var("DISCORD_API_BASE")
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or(defaults.discord.api_base),
            authorize_url: env::var("DISCORD_AUTHORIZE_URL")
                .unwrap_or(defaults.discord.authorize_url),
        };

        let kv_backend = match env::var("KV_BACKEND")
            .unwrap_or_else(|_| "memory".to_string())
            .to_lowercase()
            .as_str()
        {
            "memory" => KvBackend::Memory,
            "redis" => KvBackend::Redis {
                url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            },
            other => return Err(BridgeError::config(format!("Invalid KV_BACKEND: {other}"))),
        };

        let config = Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: parse_env("PORT", defaults.port)?,
            discord,
            issuer: env::var("OIDC_ISSUER").unwrap_or(defaults.issuer),
            kv_backend,
            key_store_key: env::var("KEY_STORE_KEY").unwrap_or(defaults.key_store_key),
            rsa_key_bits: parse_env("RSA_KEY_BITS", defaults.rsa_key_bits)?,
            upstream_timeout: Duration::from_millis(parse_env("UPSTREAM_TIMEOUT_MS", 5000)?),
            role_lookup_concurrency: parse_env(
                "ROLE_LOOKUP_CONCURRENCY",
                defaults.role_lookup_concurrency,
            )?,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_json: parse_env("LOG_JSON", defaults.log_json)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates value ranges.
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the first invalid value.
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.rsa_key_bits < MIN_RSA_KEY_BITS {
            return Err(BridgeError::config(format!(
                "RSA_KEY_BITS must be at least {MIN_RSA_KEY_BITS}, got {}",
                self.rsa_key_bits
            )));
        }
        if self.upstream_timeout.is_zero() {
            return Err(BridgeError::config("UPSTREAM_TIMEOUT_MS must be greater than 0"));
        }
        if self.role_lookup_concurrency == 0 {
            return Err(BridgeError::config("ROLE_LOOKUP_CONCURRENCY must be greater than 0"));
        }
        if self.key_store_key.is_empty() {
            return Err(BridgeError::config("KEY_STORE_KEY must not be empty"));
        }
        Ok(())
    }
}

/// Split a comma-separated guild list, dropping blanks.
#[must_use]
pub fn parse_server_list(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

fn optional_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parse environment variable with default value.
fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T, BridgeError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(val) => val
            .parse()
            .map_err(|e| BridgeError::config(format!("Invalid {name}: {e}"))),
        Err(_) => Ok(default),
    }
}
