//! Key-value cache contract and the in-process reference store.
//!
//! The fabric consumes a cache, it does not provide one: deployments point
//! every endpoint of every chain at a single shared store (typically Redis or
//! a comparable external KV service) so historical results are memoized
//! across processes. The store must be safe for concurrent use and must
//! bound its own backend timeouts. Cache failures never fail a call — the
//! caching layer logs and falls through to the upstream.

use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Error from a cache backend.
#[derive(Debug, thiserror::Error)]
#[error("cache backend error: {0}")]
pub struct KvStoreError(pub String);

/// Shared key-value store with per-entry TTL.
///
/// Values are opaque strings; the fabric stores JSON-encoded results. Writes
/// are last-writer-wins: two concurrent misses for the same key may both go
/// upstream and both write, which is acceptable for immutable entries.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Returns the live value for `key`, or `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, KvStoreError>;

    /// Stores `value` under `key` for `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvStoreError>;
}

struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-process [`KvStore`] backed by a concurrent map with lazy expiry.
///
/// Suitable for tests and single-process deployments; it does not share
/// entries across processes the way an external store does.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: DashMap<String, Entry, ahash::RandomState>,
}

impl MemoryKvStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|entry| entry.expires_at > now).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvStoreError> {
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > Instant::now() {
                return Ok(Some(entry.value.clone()));
            }
        }
        // Expired entries are reaped on the read path.
        self.entries.remove_if(key, |_, entry| entry.expires_at <= Instant::now());
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvStoreError> {
        self.entries.insert(
            key.to_string(),
            Entry { value: value.to_string(), expires_at: Instant::now() + ttl },
        );
        Ok(())
    }
}
