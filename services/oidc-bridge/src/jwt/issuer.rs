//! ID token signing and verification.

use crate::error::BridgeError;
use crate::jwks::Jwks;
use crate::jwt::claims::{ClaimSet, IdTokenClaims};
use crate::keys::{KeyAlgorithm, KeyManager};
use crate::metrics;
use jsonwebtoken::{decode, decode_header, encode, DecodingKey, Header, Validation};
use tracing::debug;

/// ID token lifetime.
pub const ID_TOKEN_TTL_SECS: i64 = 3600;

/// A signed ID token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Compact JWS
    pub token: String,
    /// Key id in the header
    pub key_id: String,
    /// `exp` claim
    pub expires_at: i64,
}

/// Signs claim sets with the active key pair.
#[derive(Clone)]
pub struct TokenIssuer {
    keys: KeyManager,
    issuer: String,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(keys: KeyManager, issuer: impl Into<String>) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
        }
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Sign `claims` for `audience`, valid for one hour.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::KeyManagement`] when no key pair is available or
    /// signing fails. No token is produced in that case.
    pub async fn issue(&self, claims: ClaimSet, audience: &str) -> Result<IssuedToken, BridgeError> {
        let pair = self.keys.get_active_key_pair().await?;
        let algorithm = pair.algorithm();

        let mut header = Header::new(algorithm.jwt_algorithm());
        header.kid = Some(pair.key_id().to_string());
        header.typ = Some("JWT".to_string());

        let payload = IdTokenClaims::new(self.issuer.clone(), audience.to_string(), claims, ID_TOKEN_TTL_SECS);
        let token = encode(&header, &payload, &pair.encoding_key()?)?;

        metrics::record_token_issued(algorithm.as_str());
        debug!(kid = %pair.key_id(), sub = %payload.claims.sub, "issued id token");

        Ok(IssuedToken {
            token,
            key_id: pair.key_id().to_string(),
            expires_at: payload.exp,
        })
    }
}

/// Verify `token` against a published key set, checking signature, issuer,
/// audience and expiry.
///
/// # Errors
///
/// Returns [`BridgeError::Validation`] if the token is malformed, names an
/// unknown key or fails any check.
pub fn verify(token: &str, jwks: &Jwks, issuer: &str, audience: &str) -> Result<IdTokenClaims, BridgeError> {
    let header = decode_header(token).map_err(|e| BridgeError::validation(format!("malformed token: {e}")))?;
    let kid = header
        .kid
        .ok_or_else(|| BridgeError::validation("token header has no kid"))?;
    let jwk = jwks
        .find(&kid)
        .ok_or_else(|| BridgeError::validation(format!("unknown kid {kid}")))?;

    let algorithm = KeyAlgorithm::RS256.jwt_algorithm();
    if header.alg != algorithm {
        return Err(BridgeError::validation(format!("unexpected algorithm {:?}", header.alg)));
    }

    let key = DecodingKey::from_rsa_components(&jwk.n, &jwk.e)
        .map_err(|e| BridgeError::validation(format!("invalid jwk: {e}")))?;
    let mut validation = Validation::new(algorithm);
    validation.set_issuer(&[issuer]);
    validation.set_audience(&[audience]);

    let data = decode::<IdTokenClaims>(token, &key, &validation)
        .map_err(|e| BridgeError::validation(format!("token rejected: {e}")))?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_rejects_malformed_token() {
        let jwks = Jwks { keys: Vec::new() };
        let err = verify("not-a-jwt", &jwks, "iss", "aud").unwrap_err();
        assert!(matches!(err, BridgeError::Validation(_)));
    }

    #[test]
    fn test_verify_rejects_unknown_kid() {
        // {"alg":"RS256","kid":"missing"} . {} . sig
        let token = "eyJhbGciOiJSUzI1NiIsImtpZCI6Im1pc3NpbmcifQ.e30.c2ln";
        let jwks = Jwks { keys: Vec::new() };
        let err = verify(token, &jwks, "iss", "aud").unwrap_err();
        assert!(err.to_string().contains("unknown kid"));
    }
}
