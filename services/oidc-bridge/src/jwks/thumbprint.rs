//! JWK Thumbprint calculation per RFC 7638.
//!
//! Used as the content-derived key id of generated signing keys.

use sha2::{Digest, Sha256};

/// Calculates the JWK thumbprint per RFC 7638.
pub struct JwkThumbprint;

impl JwkThumbprint {
    /// Computes the SHA-256 thumbprint of an RSA public key given its
    /// base64url `n` and `e` members.
    #[must_use]
    pub fn compute_rsa(n: &str, e: &str) -> String {
        let canonical = Self::canonical_rsa_json(n, e);
        let hash = Sha256::digest(canonical.as_bytes());
        base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, hash)
    }

    /// Required members in lexicographic order with no whitespace.
    fn canonical_rsa_json(n: &str, e: &str) -> String {
        format!(r#"{{"e":"{e}","kty":"RSA","n":"{n}"}}"#)
    }
}
