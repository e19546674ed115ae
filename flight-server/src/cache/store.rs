//! Key-value storage port and its in-process moka adapter.
//!
//! The cache layer owns the key scheme and the value schema; the storage
//! engine only moves opaque bytes with a time-to-live.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::Expiry;
use moka::future::Cache as MokaCache;

/// Errors from the storage engine.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// Backend unavailable or failing
    #[error("cache backend failure: {0}")]
    Backend(String),

    /// Stored bytes didn't decode into the expected schema
    #[error("cache value could not be decoded: {0}")]
    Decode(String),

    /// Value couldn't be encoded for storage
    #[error("cache value could not be encoded: {0}")]
    Encode(String),
}

/// A persisted key-value store with per-entry TTL.
pub trait KvStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>, StoreError>> + Send;

    fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn delete(&self, key: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Stored bytes plus the TTL they were written with.
#[derive(Clone)]
struct StoredValue {
    bytes: Arc<[u8]>,
    ttl: Duration,
}

/// Expires each entry after the TTL it was written with.
struct PerEntryTtl;

impl Expiry<String, StoredValue> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process [`KvStore`] backed by a moka cache.
///
/// Cloning is cheap; clones share storage.
#[derive(Clone)]
pub struct MokaStore {
    inner: MokaCache<String, StoredValue>,
}

impl MokaStore {
    pub fn new(max_capacity: u64) -> Self {
        let inner = MokaCache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .build();
        Self { inner }
    }

    /// Approximate number of live entries.
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    /// Drop every entry.
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }
}

impl KvStore for MokaStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.inner.get(key).await.map(|v| v.bytes.to_vec()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        let stored = StoredValue {
            bytes: value.into(),
            ttl,
        };
        self.inner.insert(key.to_string(), stored).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.inner.invalidate(key).await;
        Ok(())
    }
}
