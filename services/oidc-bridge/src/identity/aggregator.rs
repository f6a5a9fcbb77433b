//! Claims aggregation with concurrent per-guild role lookups.
//!
//! Each lookup runs as its own task under a shared concurrency bound and a
//! per-call timeout. A failed, slow or negative lookup only removes that
//! guild's roles from the result; it never fails the aggregation.

use crate::error::BridgeError;
use crate::identity::record::{IdentityRecord, MembershipSet};
use crate::jwt::ClaimSet;
use crate::metrics;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Fetches a user's roles within one guild.
#[async_trait]
pub trait RoleLookup: Send + Sync {
    /// Roles held by `user_id` in `guild_id`, or `None` if not a member.
    async fn member_roles(&self, guild_id: &str, user_id: &str) -> Result<Option<Vec<String>>, BridgeError>;
}

/// Result of one role lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Found(Vec<String>),
    Absent,
    Failed,
    TimedOut,
    Skipped,
}

impl LookupOutcome {
    /// Metric label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Found(_) => "found",
            Self::Absent => "absent",
            Self::Failed => "failed",
            Self::TimedOut => "timeout",
            Self::Skipped => "skipped",
        }
    }
}

/// Aggregation limits.
#[derive(Debug, Clone)]
pub struct AggregatorOptions {
    /// Bound on a single role lookup
    pub lookup_timeout: Duration,
    /// Lookups in flight at once
    pub max_concurrency: usize,
    /// Guilds eligible for role lookups; `None` means every guild
    pub eligible_guilds: Option<HashSet<String>>,
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        Self {
            lookup_timeout: Duration::from_secs(5),
            max_concurrency: 8,
            eligible_guilds: None,
        }
    }
}

/// Builds [`ClaimSet`]s from an identity and its guilds.
#[derive(Clone)]
pub struct ClaimsAggregator {
    lookup: Option<Arc<dyn RoleLookup>>,
    options: AggregatorOptions,
}

impl ClaimsAggregator {
    /// Create an aggregator. Without a `lookup` no role data is fetched.
    #[must_use]
    pub fn new(lookup: Option<Arc<dyn RoleLookup>>, options: AggregatorOptions) -> Self {
        Self { lookup, options }
    }

    /// Aggregate claims for a verified identity.
    ///
    /// `guilds` in the result lists every guild in `guild_ids` (deduplicated,
    /// first occurrence order) whether or not its roles were fetched.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::UnverifiedIdentity`] if the identity is not
    /// verified. Role lookup failures are never surfaced.
    pub async fn aggregate(&self, identity: &IdentityRecord, guild_ids: &[String]) -> Result<ClaimSet, BridgeError> {
        identity.ensure_verified()?;

        let mut seen = HashSet::with_capacity(guild_ids.len());
        let guilds: Vec<String> = guild_ids
            .iter()
            .filter(|g| seen.insert(*g))
            .cloned()
            .collect();

        let roles = match &self.lookup {
            Some(lookup) => self.fetch_roles(lookup, &identity.id, &guilds).await,
            None => MembershipSet::new(),
        };

        Ok(ClaimSet::from_identity(identity, guilds, roles))
    }

    async fn fetch_roles(&self, lookup: &Arc<dyn RoleLookup>, user_id: &str, guilds: &[String]) -> MembershipSet {
        let permits = Arc::new(Semaphore::new(self.options.max_concurrency.max(1)));
        let timeout = self.options.lookup_timeout;
        let mut tasks = JoinSet::new();

        for guild in guilds {
            let eligible = self
                .options
                .eligible_guilds
                .as_ref()
                .map_or(true, |allowed| allowed.contains(guild));
            if !eligible {
                metrics::record_role_lookup(LookupOutcome::Skipped.label());
                continue;
            }

            let lookup = Arc::clone(lookup);
            let permits = Arc::clone(&permits);
            let guild = guild.clone();
            let user_id = user_id.to_string();
            tasks.spawn(async move {
                let outcome = match permits.acquire_owned().await {
                    Ok(_permit) => lookup_one(lookup.as_ref(), &guild, &user_id, timeout).await,
                    Err(_) => LookupOutcome::Failed,
                };
                (guild, outcome)
            });
        }

        let mut roles = MembershipSet::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((guild, outcome)) => {
                    metrics::record_role_lookup(outcome.label());
                    if let LookupOutcome::Found(list) = outcome {
                        roles.insert(guild, list);
                    }
                }
                Err(e) => {
                    metrics::record_role_lookup(LookupOutcome::Failed.label());
                    warn!(error = %e, "role lookup task aborted");
                }
            }
        }
        roles
    }
}

async fn lookup_one(lookup: &dyn RoleLookup, guild: &str, user_id: &str, timeout: Duration) -> LookupOutcome {
    match tokio::time::timeout(timeout, lookup.member_roles(guild, user_id)).await {
        Ok(Ok(Some(list))) => LookupOutcome::Found(list),
        Ok(Ok(None)) => LookupOutcome::Absent,
        Ok(Err(e)) => {
            debug!(guild, error = %e, "role lookup failed, treating as absent");
            LookupOutcome::Failed
        }
        Err(_) => {
            debug!(guild, timeout_ms = timeout.as_millis() as u64, "role lookup timed out");
            LookupOutcome::TimedOut
        }
    }
}
