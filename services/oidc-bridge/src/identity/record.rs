//! Identity provider user record and guild role memberships.

use crate::error::BridgeError;
use serde::de::{IgnoredAny, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Discriminator value Discord reports for accounts on unique usernames.
pub const NO_DISCRIMINATOR: &str = "0";

/// Claim name prefix for per-guild role lists.
pub const ROLES_CLAIM_PREFIX: &str = "roles:";

/// The authenticated user as reported by the user-info endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    /// User id (snowflake)
    pub id: String,
    /// Username
    pub username: String,
    /// Legacy four-digit tag, `"0"` when absent
    #[serde(default)]
    pub discriminator: Option<String>,
    /// Display name
    #[serde(default)]
    pub global_name: Option<String>,
    /// Avatar hash
    #[serde(default)]
    pub avatar: Option<String>,
    /// Email address, present with the `email` scope
    #[serde(default)]
    pub email: Option<String>,
    /// Whether the email address is verified
    #[serde(default)]
    pub verified: bool,
    /// Chosen locale
    #[serde(default)]
    pub locale: Option<String>,
}

impl IdentityRecord {
    /// Fails unless the upstream identity is verified.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::UnverifiedIdentity`].
    pub fn ensure_verified(&self) -> Result<(), BridgeError> {
        if self.verified {
            Ok(())
        } else {
            Err(BridgeError::UnverifiedIdentity)
        }
    }

    /// Display name if set, else username.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.global_name.as_deref().unwrap_or(&self.username)
    }

    /// Username with a `#discriminator` suffix for legacy accounts.
    #[must_use]
    pub fn preferred_username(&self) -> String {
        match self.discriminator.as_deref() {
            Some(tag) if !tag.is_empty() && tag != NO_DISCRIMINATOR => {
                format!("{}#{}", self.username, tag)
            }
            _ => self.username.clone(),
        }
    }
}

/// Role ids per guild, serialized as flat `roles:<guild>` members.
///
/// Keyed by guild id, so the contents do not depend on the order in which
/// lookups completed. Empty role lists are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipSet {
    roles: BTreeMap<String, Vec<String>>,
}

impl MembershipSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the roles held in `guild_id`. Empty lists are dropped.
    pub fn insert(&mut self, guild_id: impl Into<String>, roles: Vec<String>) {
        if !roles.is_empty() {
            self.roles.insert(guild_id.into(), roles);
        }
    }

    /// Roles held in `guild_id`.
    #[must_use]
    pub fn get(&self, guild_id: &str) -> Option<&[String]> {
        self.roles.get(guild_id).map(Vec::as_slice)
    }

    /// Whether `guild_id` has an entry.
    #[must_use]
    pub fn contains(&self, guild_id: &str) -> bool {
        self.roles.contains_key(guild_id)
    }

    /// Number of guilds with roles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Whether no guild has roles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Iterate over `(guild, roles)` in guild order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.roles.iter().map(|(g, r)| (g.as_str(), r.as_slice()))
    }
}

impl Serialize for MembershipSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.roles.len()))?;
        for (guild, roles) in &self.roles {
            map.serialize_entry(&format!("{ROLES_CLAIM_PREFIX}{guild}"), roles)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for MembershipSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MembershipVisitor;

        impl<'de> Visitor<'de> for MembershipVisitor {
            type Value = MembershipSet;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map with roles:<guild> members")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut set = MembershipSet::new();
                while let Some(key) = access.next_key::<String>()? {
                    match key.strip_prefix(ROLES_CLAIM_PREFIX) {
                        Some(guild) => {
                            let roles = access.next_value::<Vec<String>>()?;
                            set.insert(guild, roles);
                        }
                        None => {
                            access.next_value::<IgnoredAny>()?;
                        }
                    }
                }
                Ok(set)
            }
        }

        deserializer.deserialize_map(MembershipVisitor)
    }
}
