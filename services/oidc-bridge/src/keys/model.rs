//! The signing key pair and its persisted form.

use crate::error::BridgeError;
use crate::jwks::thumbprint::JwkThumbprint;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Signature algorithm of a key pair. Only RSA with SHA-256 is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    /// RSASSA-PKCS1-v1_5 with SHA-256
    RS256,
}

impl KeyAlgorithm {
    /// Algorithm name for JWT headers and JWKs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RS256 => "RS256",
        }
    }

    /// Matching `jsonwebtoken` algorithm.
    #[must_use]
    pub const fn jwt_algorithm(&self) -> Algorithm {
        match self {
            Self::RS256 => Algorithm::RS256,
        }
    }
}

/// Serialized key pair as stored under the well-known record key.
///
/// Private material is PKCS#8 PEM, public material is SPKI PEM.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct KeyPairRecord {
    /// Algorithm tag
    #[zeroize(skip)]
    pub alg: KeyAlgorithm,
    /// Key id published in token headers and the JWK set
    pub kid: String,
    /// SPKI PEM public key
    pub public_key: String,
    /// PKCS#8 PEM private key
    pub private_key: String,
    /// Creation time, seconds since the epoch
    pub created_at: i64,
}

impl fmt::Debug for KeyPairRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPairRecord")
            .field("alg", &self.alg)
            .field("kid", &self.kid)
            .field("private_key", &"***REDACTED***")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// An RSA signing key pair.
#[derive(Clone)]
pub struct KeyPair {
    key_id: String,
    algorithm: KeyAlgorithm,
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
    created_at: DateTime<Utc>,
}

impl KeyPair {
    /// Generate a fresh RSA key pair. CPU-heavy; run off the async executor.
    ///
    /// # Errors
    ///
    /// Returns an error if `bits` is below 2048 or generation fails.
    pub fn generate(bits: usize) -> Result<Self, BridgeError> {
        if bits < crate::config::MIN_RSA_KEY_BITS {
            return Err(BridgeError::key_management(format!(
                "refusing to generate a {bits}-bit RSA key"
            )));
        }
        let private_key = RsaPrivateKey::new(&mut rand::thread_rng(), bits)
            .map_err(|e| BridgeError::key_management(format!("RSA generation failed: {e}")))?;
        Ok(Self::from_private_key(private_key, Utc::now()))
    }

    fn from_private_key(private_key: RsaPrivateKey, created_at: DateTime<Utc>) -> Self {
        let public_key = private_key.to_public_key();
        let key_id = JwkThumbprint::compute_rsa(
            &encode_component(&public_key.n().to_bytes_be()),
            &encode_component(&public_key.e().to_bytes_be()),
        );
        Self {
            key_id,
            algorithm: KeyAlgorithm::RS256,
            private_key,
            public_key,
            created_at,
        }
    }

    /// Rebuild a key pair from its stored record.
    ///
    /// # Errors
    ///
    /// Returns an error if the PEM blocks do not parse, the halves do not
    /// belong together, the key is too small, or the key id is not the one
    /// derived from the public key.
    pub fn from_record(record: &KeyPairRecord) -> Result<Self, BridgeError> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(&record.private_key)
            .map_err(|e| BridgeError::key_management(format!("invalid private key: {e}")))?;
        let public_key = RsaPublicKey::from_public_key_pem(&record.public_key)
            .map_err(|e| BridgeError::key_management(format!("invalid public key: {e}")))?;

        if private_key.to_public_key() != public_key {
            return Err(BridgeError::key_management("public key does not match private key"));
        }
        if public_key.size() * 8 < crate::config::MIN_RSA_KEY_BITS {
            return Err(BridgeError::key_management("stored RSA key is too small"));
        }
        let created_at = DateTime::from_timestamp(record.created_at, 0)
            .ok_or_else(|| BridgeError::key_management("invalid creation timestamp"))?;

        let pair = Self::from_private_key(private_key, created_at);
        if pair.key_id != record.kid {
            return Err(BridgeError::key_management("key id does not match key material"));
        }
        Ok(pair)
    }

    /// Serialize into the stored record format.
    ///
    /// # Errors
    ///
    /// Returns an error if PEM encoding fails.
    pub fn to_record(&self) -> Result<KeyPairRecord, BridgeError> {
        let private_key = self
            .private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| BridgeError::key_management(format!("private key encoding failed: {e}")))?;
        let public_key = self
            .public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| BridgeError::key_management(format!("public key encoding failed: {e}")))?;

        Ok(KeyPairRecord {
            alg: self.algorithm,
            kid: self.key_id.clone(),
            public_key,
            private_key: (*private_key).clone(),
            created_at: self.created_at.timestamp(),
        })
    }

    /// Key id.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Signature algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    /// Public half.
    #[must_use]
    pub const fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// Creation time.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Base64url modulus, as published in the JWK `n` member.
    #[must_use]
    pub fn modulus(&self) -> String {
        encode_component(&self.public_key.n().to_bytes_be())
    }

    /// Base64url public exponent, as published in the JWK `e` member.
    #[must_use]
    pub fn exponent(&self) -> String {
        encode_component(&self.public_key.e().to_bytes_be())
    }

    /// Key for signing tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if the private key cannot be DER encoded.
    pub fn encoding_key(&self) -> Result<EncodingKey, BridgeError> {
        let der = self
            .private_key
            .to_pkcs1_der()
            .map_err(|e| BridgeError::key_management(format!("private key encoding failed: {e}")))?;
        Ok(EncodingKey::from_rsa_der(der.as_bytes()))
    }

    /// Key for verifying tokens signed by this pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the public components are rejected.
    pub fn decoding_key(&self) -> Result<DecodingKey, BridgeError> {
        Ok(DecodingKey::from_rsa_components(&self.modulus(), &self.exponent())?)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("key_id", &self.key_id)
            .field("algorithm", &self.algorithm)
            .field("bits", &(self.public_key.size() * 8))
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

fn encode_component(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    fn shared_pair() -> &'static KeyPair {
        static PAIR: OnceLock<KeyPair> = OnceLock::new();
        PAIR.get_or_init(|| KeyPair::generate(2048).unwrap())
    }

    #[test]
    fn test_generate_rejects_small_keys() {
        assert!(matches!(KeyPair::generate(1024), Err(BridgeError::KeyManagement(_))));
    }

    #[test]
    fn test_record_round_trip_preserves_identity() {
        let pair = shared_pair();
        let record = pair.to_record().unwrap();
        assert_eq!(record.alg, KeyAlgorithm::RS256);
        assert!(record.private_key.contains("BEGIN PRIVATE KEY"));
        assert!(record.public_key.contains("BEGIN PUBLIC KEY"));

        let restored = KeyPair::from_record(&record).unwrap();
        assert_eq!(restored.key_id(), pair.key_id());
        assert_eq!(restored.public_key(), pair.public_key());
        assert_eq!(restored.created_at().timestamp(), pair.created_at().timestamp());
    }

    #[test]
    fn test_key_id_is_content_derived() {
        let pair = shared_pair();
        let expected = JwkThumbprint::compute_rsa(&pair.modulus(), &pair.exponent());
        assert_eq!(pair.key_id(), expected);
        assert_eq!(pair.exponent(), "AQAB");
    }

    #[test]
    fn test_tampered_kid_rejected() {
        let mut record = shared_pair().to_record().unwrap();
        record.kid = "something-else".to_string();
        assert!(KeyPair::from_record(&record).is_err());
    }

    #[test]
    fn test_garbage_pem_rejected() {
        let mut record = shared_pair().to_record().unwrap();
        record.private_key = "not a pem".to_string();
        assert!(KeyPair::from_record(&record).is_err());
    }

    #[test]
    fn test_debug_redacts_private_material() {
        let record = shared_pair().to_record().unwrap();
        let rendered = format!("{record:?}");
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("BEGIN PRIVATE KEY"));
    }
}
