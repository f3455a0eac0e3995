//! Read-through caching of immutable historical results.
//!
//! Historical log queries beyond the reorg horizon are, by protocol,
//! immutable; they dominate request volume and are the only safe target for
//! cross-process memoization. Anything newer could still be rewritten by a
//! reorg and always goes upstream.
//!
//! A call is cached iff all of the following hold:
//!
//! 1. a KV store is configured on this endpoint,
//! 2. the method is `eth_getLogs`,
//! 3. the filter carries `fromBlock`/`toBlock` as concrete hex numbers
//!    (tags such as `"latest"` are simply not cached),
//! 4. `fromBlock <= toBlock` (a strict inversion is the caller's bug and
//!    surfaces as [`RpcError::InvalidRange`]),
//! 5. the whole range lies strictly below `head - reorg_distance`.
//!
//! The head comes from a short-TTL `eth_blockNumber` sample; a stale sample
//! only ever under-reports the head, which keeps condition 5 conservative.

use std::{sync::Arc, time::Instant};
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use crate::{
    cache::KvStore,
    endpoint::{errors::RpcError, http::RateLimitedEndpoint},
    types::BlockRange,
    utils::block_param,
};

/// Cache behavior knobs shared by every endpoint of a chain.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Operator-chosen key namespace; doubles as a manual flush handle.
    pub namespace: String,
    /// TTL for stored results.
    pub entry_ttl: std::time::Duration,
    /// TTL for the amortized `eth_blockNumber` sample.
    pub head_ttl: std::time::Duration,
    /// Blocks within this distance of the head may still reorg.
    pub reorg_distance: u64,
}

struct HeadSample {
    value: u64,
    fetched_at: Instant,
}

/// A [`RateLimitedEndpoint`] with a shared KV cache in front of it.
///
/// The store handle is shared across all endpoints of all chains; the key
/// prefix binds every entry to this provider's host and chain so providers
/// with divergent serializations never satisfy each other's lookups.
pub struct CachingEndpoint {
    inner: RateLimitedEndpoint,
    store: Option<Arc<dyn KvStore>>,
    settings: CacheSettings,
    /// `"<namespace>,<host>,<chain-id>"`, precomputed.
    key_prefix: String,
    head: Mutex<Option<HeadSample>>,
}

impl CachingEndpoint {
    #[must_use]
    pub fn new(
        inner: RateLimitedEndpoint,
        store: Option<Arc<dyn KvStore>>,
        settings: CacheSettings,
    ) -> Self {
        let key_prefix =
            format!("{},{},{}", settings.namespace, inner.host(), inner.chain_id());
        Self { inner, store, settings, key_prefix, head: Mutex::new(None) }
    }

    #[must_use]
    pub fn host(&self) -> &str {
        self.inner.host()
    }

    /// Sends one logical call, short-circuiting through the KV store when
    /// the cacheability conditions hold.
    ///
    /// # Errors
    ///
    /// [`RpcError::InvalidRange`] for an inverted block range; otherwise
    /// whatever the transport surfaces. Store failures never fail the call —
    /// they log and fall through to the upstream.
    pub async fn send(
        &self,
        method: &str,
        params: &[serde_json::Value],
    ) -> Result<serde_json::Value, RpcError> {
        let Some(range) = log_query_range(method, params)? else {
            return self.inner.send(method, params).await;
        };
        let Some(store) = &self.store else {
            return self.inner.send(method, params).await;
        };
        if !self.beyond_reorg_horizon(range).await {
            return self.inner.send(method, params).await;
        }

        let key = self.cache_key(method, params)?;

        match store.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    trace!(key = %key, "cache hit");
                    return Ok(value);
                }
                Err(e) => warn!(key = %key, error = %e, "discarding undecodable cache entry"),
            },
            Ok(None) => trace!(key = %key, "cache miss"),
            Err(e) => warn!(key = %key, error = %e, "cache read failed, querying upstream"),
        }

        let value = self.inner.send(method, params).await?;

        // Only values that propagated as a JSON-RPC result reach this point,
        // so JSON-RPC errors are never cached.
        match serde_json::to_string(&value) {
            Ok(raw) => {
                if let Err(e) = store.set(&key, &raw, self.settings.entry_ttl).await {
                    warn!(key = %key, error = %e, "cache write failed");
                }
            }
            Err(e) => warn!(key = %key, error = %e, "result not serializable for cache"),
        }

        Ok(value)
    }

    fn cache_key(&self, method: &str, params: &[serde_json::Value]) -> Result<String, RpcError> {
        let params_json = serde_json::to_string(params)
            .map_err(|e| RpcError::InvalidResponse(format!("params encoding: {e}")))?;
        Ok(format!("{}:{},{}", self.key_prefix, method, params_json))
    }

    /// Whether the whole range is strictly older than the reorg horizon.
    ///
    /// A failed head query degrades to "not cacheable" — the sample must be a
    /// lower bound on the true head, and no sample is no bound.
    async fn beyond_reorg_horizon(&self, range: BlockRange) -> bool {
        match self.head_lower_bound().await {
            Ok(head) => range.to < head.saturating_sub(self.settings.reorg_distance),
            Err(e) => {
                debug!(host = %self.inner.host(), error = %e, "head query failed, range treated as fresh");
                false
            }
        }
    }

    /// Returns the cached head sample, refreshing it after `head_ttl`.
    ///
    /// The mutex is held across the refresh so a burst of concurrent
    /// cacheable calls costs one upstream `eth_blockNumber`, not one each.
    async fn head_lower_bound(&self) -> Result<u64, RpcError> {
        let mut slot = self.head.lock().await;
        if let Some(sample) = slot.as_ref() {
            if sample.fetched_at.elapsed() < self.settings.head_ttl {
                return Ok(sample.value);
            }
        }

        let raw = self.inner.send("eth_blockNumber", &[]).await?;
        let value = block_param::numeric_block(&raw)
            .ok_or_else(|| RpcError::InvalidResponse(format!("eth_blockNumber returned {raw}")))?;
        *slot = Some(HeadSample { value, fetched_at: Instant::now() });
        Ok(value)
    }
}

/// Extracts the numeric block range from an `eth_getLogs` filter.
///
/// `Ok(None)` means the call is simply not a candidate for caching; only an
/// inverted concrete range is an error.
fn log_query_range(
    method: &str,
    params: &[serde_json::Value],
) -> Result<Option<BlockRange>, RpcError> {
    if method != "eth_getLogs" {
        return Ok(None);
    }
    let Some(filter) = params.first().and_then(serde_json::Value::as_object) else {
        return Ok(None);
    };
    let from = filter.get("fromBlock").and_then(block_param::numeric_block);
    let to = filter.get("toBlock").and_then(block_param::numeric_block);
    match (from, to) {
        (Some(from), Some(to)) if from > to => Err(RpcError::InvalidRange { from, to }),
        (Some(from), Some(to)) => Ok(Some(BlockRange::new(from, to))),
        _ => Ok(None),
    }
}
