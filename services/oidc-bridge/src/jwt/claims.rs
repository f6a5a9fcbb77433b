use crate::identity::{IdentityRecord, MembershipSet};
use serde::{Deserialize, Serialize};

/// Normalized claims about one authenticated user.
///
/// Role lists live in [`MembershipSet`] and serialize as flat
/// `roles:<guild>` members, so they can never shadow a named claim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClaimSet {
    pub sub: String,
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub verified: bool,
    pub name: String,
    pub preferred_username: String,
    #[serde(default)]
    pub guilds: Vec<String>,
    #[serde(flatten)]
    pub roles: MembershipSet,
}

impl ClaimSet {
    /// Build claims from an identity and its guild data.
    #[must_use]
    pub fn from_identity(identity: &IdentityRecord, guilds: Vec<String>, roles: MembershipSet) -> Self {
        ClaimSet {
            sub: identity.id.clone(),
            id: identity.id.clone(),
            username: identity.username.clone(),
            discriminator: identity.discriminator.clone(),
            global_name: identity.global_name.clone(),
            avatar: identity.avatar.clone(),
            locale: identity.locale.clone(),
            email: identity.email.clone(),
            verified: identity.verified,
            name: identity.display_name().to_string(),
            preferred_username: identity.preferred_username(),
            guilds,
            roles,
        }
    }
}

/// Full ID token payload: registered claims plus the [`ClaimSet`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdTokenClaims {
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(flatten)]
    pub claims: ClaimSet,
}

impl IdTokenClaims {
    pub fn new(issuer: String, audience: String, claims: ClaimSet, ttl_seconds: i64) -> Self {
        let now = chrono::Utc::now().timestamp();
        IdTokenClaims {
            iss: issuer,
            aud: audience,
            iat: now,
            exp: now + ttl_seconds,
            claims,
        }
    }
}
