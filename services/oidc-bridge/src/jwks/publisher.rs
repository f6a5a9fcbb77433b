//! Verification key set served to relying parties.

use crate::error::BridgeError;
use crate::keys::{KeyManager, KeyPair};
use serde::{Deserialize, Serialize};

/// A single RSA public JWK (RFC 7517).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type, always `RSA`
    pub kty: String,
    /// Key id, matching the `kid` header of issued tokens
    pub kid: String,
    /// Intended use, always `sig`
    #[serde(rename = "use")]
    pub key_use: String,
    /// Signature algorithm
    pub alg: String,
    /// Base64url modulus
    pub n: String,
    /// Base64url public exponent
    pub e: String,
}

impl Jwk {
    /// Public JWK of a key pair. Private members are never produced.
    #[must_use]
    pub fn from_key_pair(pair: &KeyPair) -> Self {
        Self {
            kty: "RSA".to_string(),
            kid: pair.key_id().to_string(),
            key_use: "sig".to_string(),
            alg: pair.algorithm().as_str().to_string(),
            n: pair.modulus(),
            e: pair.exponent(),
        }
    }
}

/// A JWK set document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwks {
    /// Published keys
    pub keys: Vec<Jwk>,
}

impl Jwks {
    /// Find a key by id.
    #[must_use]
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid == kid)
    }
}

/// Publishes the key manager's active key as a JWK set.
#[derive(Clone)]
pub struct JwksPublisher {
    keys: KeyManager,
}

impl JwksPublisher {
    /// Create a publisher reading through `keys`.
    #[must_use]
    pub fn new(keys: KeyManager) -> Self {
        Self { keys }
    }

    /// The current verification key set. Generates the key pair on first use
    /// rather than publishing an empty set.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::KeyManagement`] if no key pair can be obtained.
    pub async fn public_key_set(&self) -> Result<Jwks, BridgeError> {
        let pair = self.keys.get_active_key_pair().await?;
        Ok(Jwks {
            keys: vec![Jwk::from_key_pair(&pair)],
        })
    }
}
