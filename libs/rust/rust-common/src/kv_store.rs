//! Shared key-value store abstraction.
//!
//! Edge services keep no durable in-memory state; anything that must survive
//! across instances lives in a [`KvStore`]. Backends differ in how strong
//! their write guarantees are, so callers that need check-and-write semantics
//! ask [`KvStore::supports_atomic_cas`] before relying on it.

use crate::PlatformError;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Result of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// The stored value matched the expectation and was replaced.
    Applied,
    /// The stored value did not match; nothing was written.
    Conflict,
}

/// Byte-oriented key-value store shared between service instances.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a value. `Ok(None)` means the key is absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PlatformError>;

    /// Unconditionally write a value.
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), PlatformError>;

    /// Write `value` only if the current value equals `expected`
    /// (`None` meaning "key absent").
    ///
    /// The default implementation is a plain read followed by a write and is
    /// NOT atomic; backends with a native primitive override it and also
    /// override [`supports_atomic_cas`](KvStore::supports_atomic_cas).
    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: &[u8],
    ) -> Result<CasOutcome, PlatformError> {
        let current = self.get(key).await?;
        if current.as_deref() != expected {
            return Ok(CasOutcome::Conflict);
        }
        self.put(key, value).await?;
        Ok(CasOutcome::Applied)
    }

    /// Whether [`compare_and_set`](KvStore::compare_and_set) is atomic.
    fn supports_atomic_cas(&self) -> bool {
        false
    }
}

/// In-process store. Suitable for single-instance deployments and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryKvStore {
    data: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryKvStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a key, returning whether it was present.
    pub async fn remove(&self, key: &str) -> bool {
        self.data.write().await.remove(key).is_some()
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    /// Whether the store holds no keys.
    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PlatformError> {
        Ok(self.data.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), PlatformError> {
        self.data.write().await.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: &[u8],
    ) -> Result<CasOutcome, PlatformError> {
        let mut data = self.data.write().await;
        let matches = match (expected, data.get(key)) {
            (None, None) => true,
            (Some(exp), Some(cur)) => exp == cur.as_slice(),
            _ => false,
        };
        if !matches {
            return Ok(CasOutcome::Conflict);
        }
        data.insert(key.to_string(), value.to_vec());
        Ok(CasOutcome::Applied)
    }

    fn supports_atomic_cas(&self) -> bool {
        true
    }
}

/// Replaces the value only when it still equals ARGV[1].
const CAS_SCRIPT: &str = r"
local current = redis.call('GET', KEYS[1])
if current == ARGV[1] then
    redis.call('SET', KEYS[1], ARGV[2])
    return 1
end
return 0
";

/// Redis-backed store shared by every replica.
#[derive(Clone)]
pub struct RedisKvStore {
    conn: ConnectionManager,
    namespace: String,
}

impl RedisKvStore {
    /// Connect to Redis. Keys are prefixed with `namespace:`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the connection fails.
    pub async fn connect(redis_url: &str, namespace: impl Into<String>) -> Result<Self, PlatformError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            namespace: namespace.into(),
        })
    }

    fn namespaced_key(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PlatformError> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(self.namespaced_key(key)).await?;
        Ok(value)
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), PlatformError> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(self.namespaced_key(key), value).await?;
        Ok(())
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: &[u8],
    ) -> Result<CasOutcome, PlatformError> {
        let mut conn = self.conn.clone();
        let key = self.namespaced_key(key);

        let applied = match expected {
            None => conn.set_nx::<_, _, bool>(&key, value).await?,
            Some(expected) => {
                let replaced: i64 = redis::Script::new(CAS_SCRIPT)
                    .key(&key)
                    .arg(expected)
                    .arg(value)
                    .invoke_async(&mut conn)
                    .await?;
                replaced == 1
            }
        };

        debug!(key = %key, applied, "redis compare-and-set");
        Ok(if applied {
            CasOutcome::Applied
        } else {
            CasOutcome::Conflict
        })
    }

    fn supports_atomic_cas(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Store that only implements the required methods, so it exercises the
    /// default read-then-write `compare_and_set`.
    #[derive(Default)]
    struct PlainStore {
        inner: MemoryKvStore,
    }

    #[async_trait]
    impl KvStore for PlainStore {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PlatformError> {
            self.inner.get(key).await
        }

        async fn put(&self, key: &str, value: &[u8]) -> Result<(), PlatformError> {
            self.inner.put(key, value).await
        }
    }

    #[tokio::test]
    async fn test_memory_get_put() {
        let store = MemoryKvStore::new();
        assert!(store.is_empty().await);
        assert_eq!(store.get("k").await.unwrap(), None);

        store.put("k", b"v1").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"v1".to_vec()));
        assert_eq!(store.len().await, 1);

        assert!(store.remove("k").await);
        assert!(!store.remove("k").await);
    }

    #[tokio::test]
    async fn test_memory_cas_insert_if_absent() {
        let store = MemoryKvStore::new();
        assert!(store.supports_atomic_cas());

        let first = store.compare_and_set("k", None, b"a").await.unwrap();
        let second = store.compare_and_set("k", None, b"b").await.unwrap();

        assert_eq!(first, CasOutcome::Applied);
        assert_eq!(second, CasOutcome::Conflict);
        assert_eq!(store.get("k").await.unwrap(), Some(b"a".to_vec()));
    }

    #[tokio::test]
    async fn test_memory_cas_replace_expected() {
        let store = MemoryKvStore::new();
        store.put("k", b"old").await.unwrap();

        let stale = store.compare_and_set("k", Some(b"other"), b"new").await.unwrap();
        assert_eq!(stale, CasOutcome::Conflict);

        let fresh = store.compare_and_set("k", Some(b"old"), b"new").await.unwrap();
        assert_eq!(fresh, CasOutcome::Applied);
        assert_eq!(store.get("k").await.unwrap(), Some(b"new".to_vec()));
    }

    #[tokio::test]
    async fn test_memory_cas_single_winner_under_contention() {
        let store = MemoryKvStore::new();
        let mut set = tokio::task::JoinSet::new();
        for i in 0..16u8 {
            let store = store.clone();
            set.spawn(async move { store.compare_and_set("k", None, &[i]).await.unwrap() });
        }

        let mut applied = 0;
        while let Some(outcome) = set.join_next().await {
            if outcome.unwrap() == CasOutcome::Applied {
                applied += 1;
            }
        }
        assert_eq!(applied, 1);
    }

    /// Namespace unique to this run so reruns never see earlier keys.
    fn redis_test_namespace() -> String {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        format!("rust-common-test-{nanos}")
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ignore = "requires a Redis server at REDIS_URL"]
    async fn test_redis_cas_single_winner_under_contention() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let store = RedisKvStore::connect(&url, redis_test_namespace()).await.unwrap();
        assert!(store.supports_atomic_cas());

        let mut set = tokio::task::JoinSet::new();
        for i in 0..16u8 {
            let store = store.clone();
            set.spawn(async move { (i, store.compare_and_set("k", None, &[i]).await.unwrap()) });
        }

        let mut winners = Vec::new();
        while let Some(joined) = set.join_next().await {
            let (i, outcome) = joined.unwrap();
            if outcome == CasOutcome::Applied {
                winners.push(i);
            }
        }
        assert_eq!(winners.len(), 1);
        assert_eq!(store.get("k").await.unwrap(), Some(vec![winners[0]]));

        let stale = store.compare_and_set("k", Some(b"other"), b"new").await.unwrap();
        assert_eq!(stale, CasOutcome::Conflict);
        let fresh = store.compare_and_set("k", Some(&[winners[0]]), b"new").await.unwrap();
        assert_eq!(fresh, CasOutcome::Applied);
        assert_eq!(store.get("k").await.unwrap(), Some(b"new".to_vec()));
    }

    #[tokio::test]
    async fn test_default_cas_is_not_atomic_but_correct_sequentially() {
        let store = PlainStore::default();
        assert!(!store.supports_atomic_cas());

        assert_eq!(store.compare_and_set("k", None, b"a").await.unwrap(), CasOutcome::Applied);
        assert_eq!(store.compare_and_set("k", None, b"b").await.unwrap(), CasOutcome::Conflict);
        assert_eq!(
            store.compare_and_set("k", Some(b"a"), b"c").await.unwrap(),
            CasOutcome::Applied
        );
        assert_eq!(store.get("k").await.unwrap(), Some(b"c".to_vec()));
    }
}
