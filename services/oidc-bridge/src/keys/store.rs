//! Typed access to the single persisted key-pair record.
//!
//! This adapter is the only code that reads or writes the record; the
//! [`KeyManager`](crate::keys::KeyManager) is its only caller.

use crate::error::BridgeError;
use crate::keys::model::{KeyPair, KeyPairRecord};
use rust_common::{CasOutcome, KvStore};
use std::sync::Arc;
use tracing::debug;

/// What the store currently holds under the record key.
#[derive(Debug)]
pub enum StoredRecord {
    /// No record has been written yet.
    Absent,
    /// A well-formed key pair.
    Valid(KeyPair),
    /// Bytes that do not decode into a usable key pair. Carries the raw value
    /// so it can be replaced with a conditional write.
    Corrupt(Vec<u8>),
}

/// Key store adapter over a shared [`KvStore`].
#[derive(Clone)]
pub struct KeyStore {
    kv: Arc<dyn KvStore>,
    record_key: String,
}

impl KeyStore {
    /// Create an adapter storing the record under `record_key`.
    pub fn new(kv: Arc<dyn KvStore>, record_key: impl Into<String>) -> Self {
        Self {
            kv,
            record_key: record_key.into(),
        }
    }

    /// Whether conditional writes are atomic on the underlying store.
    #[must_use]
    pub fn is_atomic(&self) -> bool {
        self.kv.supports_atomic_cas()
    }

    /// Read and decode the record.
    ///
    /// # Errors
    ///
    /// Returns a key management error if the store is unreachable. Undecodable
    /// content is reported as [`StoredRecord::Corrupt`], not as an error.
    pub async fn read(&self) -> Result<StoredRecord, BridgeError> {
        let Some(raw) = self.kv.get(&self.record_key).await? else {
            return Ok(StoredRecord::Absent);
        };

        let decoded = serde_json::from_slice::<KeyPairRecord>(&raw)
            .map_err(|e| BridgeError::key_management(format!("record is not valid JSON: {e}")))
            .and_then(|record| KeyPair::from_record(&record));

        match decoded {
            Ok(pair) => Ok(StoredRecord::Valid(pair)),
            Err(err) => {
                debug!(error = %err, "stored key record failed to decode");
                Ok(StoredRecord::Corrupt(raw))
            }
        }
    }

    /// Write `pair` only if the stored bytes still equal `expected`
    /// (`None` for "no record").
    ///
    /// # Errors
    ///
    /// Returns a key management error if serialization or the store fails.
    pub async fn write_if_unchanged(
        &self,
        expected: Option<&[u8]>,
        pair: &KeyPair,
    ) -> Result<CasOutcome, BridgeError> {
        let record = pair.to_record()?;
        let bytes = serde_json::to_vec(&record)
            .map_err(|e| BridgeError::key_management(format!("record serialization failed: {e}")))?;
        Ok(self.kv.compare_and_set(&self.record_key, expected, &bytes).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_common::MemoryKvStore;

    #[tokio::test]
    async fn test_read_absent() {
        let store = KeyStore::new(Arc::new(MemoryKvStore::new()), "keys");
        assert!(matches!(store.read().await.unwrap(), StoredRecord::Absent));
    }

    #[tokio::test]
    async fn test_non_json_record_is_corrupt() {
        let kv = MemoryKvStore::new();
        kv.put("keys", b"{not json").await.unwrap();
        let store = KeyStore::new(Arc::new(kv), "keys");

        match store.read().await.unwrap() {
            StoredRecord::Corrupt(raw) => assert_eq!(raw, b"{not json".to_vec()),
            other => panic!("expected corrupt record, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_algorithm_is_corrupt() {
        let kv = MemoryKvStore::new();
        let raw = br#"{"alg":"ES256","kid":"k","public_key":"","private_key":"","created_at":0}"#;
        kv.put("keys", raw).await.unwrap();
        let store = KeyStore::new(Arc::new(kv), "keys");

        assert!(matches!(store.read().await.unwrap(), StoredRecord::Corrupt(_)));
    }
}
