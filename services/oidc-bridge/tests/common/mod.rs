//! Shared fixtures for integration tests.
//!
//! RSA generation is slow in debug builds, so tests that do not exercise the
//! cold-start path share one key pair seeded into their store.

#![allow(dead_code)]

use oidc_bridge::config::{Config, DiscordConfig};
use oidc_bridge::identity::IdentityRecord;
use oidc_bridge::keys::{KeyManager, KeyPair, KeyStore};
use rust_common::{KvStore, MemoryKvStore};
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

pub const RECORD_KEY: &str = "keys";
pub const CLIENT_ID: &str = "1234567890";
pub const CLIENT_SECRET: &str = "s3cret";
pub const REDIRECT_URI: &str = "https://app.example.com/callback";
pub const ISSUER: &str = "https://cloudflare.com";

static SHARED_RECORD: OnceLock<Vec<u8>> = OnceLock::new();

/// Serialized record of a key pair generated once per test binary.
pub fn shared_record() -> &'static [u8] {
    SHARED_RECORD.get_or_init(|| {
        let pair = KeyPair::generate(2048).expect("generate shared key pair");
        serde_json::to_vec(&pair.to_record().expect("record")).expect("serialize record")
    })
}

/// In-memory store already holding the shared key pair.
pub async fn seeded_store() -> MemoryKvStore {
    let kv = MemoryKvStore::new();
    kv.put(RECORD_KEY, shared_record()).await.expect("seed store");
    kv
}

/// Key manager over a seeded store.
pub async fn seeded_manager() -> KeyManager {
    let kv: Arc<dyn KvStore> = Arc::new(seeded_store().await);
    KeyManager::new(KeyStore::new(kv, RECORD_KEY), 2048)
}

/// Fully configured bridge talking to `api_base`.
pub fn test_config(api_base: &str) -> Config {
    Config {
        discord: DiscordConfig {
            client_id: Some(CLIENT_ID.to_string()),
            client_secret: Some(CLIENT_SECRET.to_string()),
            bot_token: Some("bot-token".to_string()),
            redirect_uri: Some(REDIRECT_URI.to_string()),
            server_list: Some(HashSet::from(["g1".to_string(), "g3".to_string()])),
            api_base: api_base.to_string(),
            ..DiscordConfig::default()
        },
        upstream_timeout: Duration::from_secs(2),
        ..Config::default()
    }
}

pub fn identity(username: &str, discriminator: Option<&str>, verified: bool) -> IdentityRecord {
    IdentityRecord {
        id: "80351110224678912".to_string(),
        username: username.to_string(),
        discriminator: discriminator.map(str::to_string),
        global_name: None,
        avatar: None,
        email: Some(format!("{username}@example.com")),
        verified,
        locale: Some("en-US".to_string()),
    }
}

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}
