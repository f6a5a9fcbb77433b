//! Load-or-generate of the active signing key pair.
//!
//! The record in the shared store is the only cross-instance state. Cold
//! instances race to create it with a conditional write; losers discard their
//! candidate and adopt whatever the winner persisted. Nothing is cached in
//! process, so every call observes the store.

use crate::error::BridgeError;
use crate::keys::model::KeyPair;
use crate::keys::store::{KeyStore, StoredRecord};
use crate::metrics;
use rust_common::CasOutcome;
use tracing::{info, warn};

/// Read-decide-write rounds before giving up on a contended store.
const MAX_ATTEMPTS: usize = 3;

/// Owns the signing key pair lifecycle.
#[derive(Clone)]
pub struct KeyManager {
    store: KeyStore,
    key_bits: usize,
}

impl KeyManager {
    /// Create a manager generating `key_bits`-bit RSA keys when none exists.
    #[must_use]
    pub fn new(store: KeyStore, key_bits: usize) -> Self {
        Self { store, key_bits }
    }

    /// Return the active key pair, creating and persisting one if the store
    /// holds none (or holds an unreadable record).
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::KeyManagement`] if the store is unreachable, key
    /// generation fails, or the record does not settle after repeated
    /// conflicting writes. Callers must not sign anything in that case.
    pub async fn get_active_key_pair(&self) -> Result<KeyPair, BridgeError> {
        for attempt in 1..=MAX_ATTEMPTS {
            let expected = match self.store.read().await? {
                StoredRecord::Valid(pair) => return Ok(pair),
                StoredRecord::Absent => None,
                StoredRecord::Corrupt(raw) => {
                    warn!(attempt, "stored key record is unreadable, replacing it");
                    Some(raw)
                }
            };

            let candidate = self.generate().await?;
            match self
                .store
                .write_if_unchanged(expected.as_deref(), &candidate)
                .await?
            {
                CasOutcome::Applied => {
                    let outcome = if expected.is_some() { "replaced_corrupt" } else { "persisted" };
                    metrics::record_key_pair_event(outcome);
                    info!(kid = %candidate.key_id(), outcome, "signing key pair persisted");

                    if self.store.is_atomic() {
                        return Ok(candidate);
                    }
                    return self.settle_after_plain_write(candidate).await;
                }
                CasOutcome::Conflict => {
                    metrics::record_key_pair_event("lost_race");
                    info!(
                        attempt,
                        discarded_kid = %candidate.key_id(),
                        "another instance wrote the key record first, re-reading"
                    );
                }
            }
        }

        Err(BridgeError::key_management(
            "key record did not settle after repeated conflicting writes",
        ))
    }

    /// Without an atomic conditional write two instances may both believe they
    /// won. Re-reading narrows the window to the store's own propagation
    /// delay; tokens signed by the losing key inside it will not verify
    /// against the published set once the store converges.
    async fn settle_after_plain_write(&self, candidate: KeyPair) -> Result<KeyPair, BridgeError> {
        warn!(
            kid = %candidate.key_id(),
            "key store lacks atomic compare-and-set; concurrent cold starts may briefly diverge"
        );
        match self.store.read().await? {
            StoredRecord::Valid(stored) => {
                if stored.key_id() != candidate.key_id() {
                    info!(kid = %stored.key_id(), "adopting key pair written by another instance");
                }
                Ok(stored)
            }
            StoredRecord::Absent | StoredRecord::Corrupt(_) => Ok(candidate),
        }
    }

    async fn generate(&self) -> Result<KeyPair, BridgeError> {
        let bits = self.key_bits;
        tokio::task::spawn_blocking(move || KeyPair::generate(bits))
            .await
            .map_err(|e| BridgeError::key_management(format!("key generation task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_common::{KvStore, MemoryKvStore, PlatformError};
    use std::sync::Arc;

    /// Store whose every call fails, standing in for an unreachable backend.
    struct UnreachableStore;

    #[async_trait]
    impl KvStore for UnreachableStore {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, PlatformError> {
            Err(PlatformError::unavailable("connection refused"))
        }

        async fn put(&self, _key: &str, _value: &[u8]) -> Result<(), PlatformError> {
            Err(PlatformError::unavailable("connection refused"))
        }
    }

    #[tokio::test]
    async fn test_unreachable_store_is_fatal() {
        let manager = KeyManager::new(KeyStore::new(Arc::new(UnreachableStore), "keys"), 2048);
        let result = manager.get_active_key_pair().await;
        assert!(matches!(result, Err(BridgeError::KeyManagement(_))));
    }

    #[tokio::test]
    async fn test_corrupt_record_is_replaced() {
        let kv = MemoryKvStore::new();
        kv.put("keys", b"garbage").await.unwrap();
        let manager = KeyManager::new(KeyStore::new(Arc::new(kv.clone()), "keys"), 2048);

        let pair = manager.get_active_key_pair().await.unwrap();
        let stored = kv.get("keys").await.unwrap().unwrap();
        assert_ne!(stored, b"garbage".to_vec());

        let again = manager.get_active_key_pair().await.unwrap();
        assert_eq!(again.key_id(), pair.key_id());
    }
}
