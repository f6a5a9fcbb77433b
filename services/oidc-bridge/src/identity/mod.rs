//! Upstream identity data and its aggregation into claims.

pub mod aggregator;
pub mod record;

pub use aggregator::{AggregatorOptions, ClaimsAggregator, LookupOutcome, RoleLookup};
pub use record::{IdentityRecord, MembershipSet};
