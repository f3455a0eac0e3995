//! Lazy, memoized router construction per chain.
//!
//! A process holds one registry; consumers ask it for the router serving a
//! chain and get the same instance every time. Routers are keyed by
//! `(chain id, KV handle present)` so a process that gains or loses its KV
//! handle cannot alias a differently-configured router; whether a present
//! handle is actually used is decided at construction time by the chain's
//! loaded configuration. Reads vastly outnumber the one insert per chain,
//! hence the read-preferring lock.

use parking_lot::RwLock;
use std::{collections::HashMap, sync::Arc, time::Duration};
use thiserror::Error;
use tracing::info;

use crate::{
    cache::KvStore,
    config::{ChainRpcConfig, ConfigError},
    endpoint::{CacheSettings, CachingEndpoint, EndpointConfig, RateLimitedEndpoint, RetryingCaller},
    router::QuorumRouter,
};

/// Errors from registry lookups and construction.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build http client: {0}")]
    HttpClient(String),

    #[error("no router constructed yet for chain {0}")]
    NotConstructed(u64),
}

/// Process-wide router registry.
///
/// Constructed explicitly and handed to consumers; holding it in an `Arc`
/// at the composition root gives the memoize-per-chain behavior without any
/// global state.
pub struct EndpointRegistry {
    routers: RwLock<HashMap<(u64, bool), Arc<QuorumRouter>>>,
    store: Option<Arc<dyn KvStore>>,
    client: reqwest::Client,
}

impl EndpointRegistry {
    /// Creates a registry sharing `store` (if any) across every endpoint of
    /// every chain.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::HttpClient`] if the shared HTTP client fails
    /// to build.
    pub fn new(store: Option<Arc<dyn KvStore>>) -> Result<Self, RegistryError> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .gzip(true)
            .tcp_nodelay(true)
            .tcp_keepalive(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| RegistryError::HttpClient(e.to_string()))?;
        Ok(Self { routers: RwLock::new(HashMap::new()), store, client })
    }

    /// Returns the router for `chain_id`, constructing and memoizing it from
    /// environment configuration on first use.
    ///
    /// # Errors
    ///
    /// Construction-time [`ConfigError`]s: missing URL list, invalid values,
    /// quorum out of range, or no reorg-distance entry for the chain.
    pub fn get(&self, chain_id: u64) -> Result<Arc<QuorumRouter>, RegistryError> {
        let key = (chain_id, self.store.is_some());
        if let Some(router) = self.routers.read().get(&key) {
            return Ok(Arc::clone(router));
        }

        // Double-checked under the write lock so two concurrent first
        // lookups produce exactly one router.
        let mut routers = self.routers.write();
        if let Some(router) = routers.get(&key) {
            return Ok(Arc::clone(router));
        }
        let router = Arc::new(self.build_router(chain_id)?);
        routers.insert(key, Arc::clone(&router));
        Ok(router)
    }

    /// Returns the already-constructed router for `chain_id`.
    ///
    /// For callers that must not trigger construction (and its environment
    /// reads) as a side effect.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotConstructed`] when no `get` has succeeded for the
    /// chain yet.
    pub fn get_cached(&self, chain_id: u64) -> Result<Arc<QuorumRouter>, RegistryError> {
        let key = (chain_id, self.store.is_some());
        self.routers
            .read()
            .get(&key)
            .map(Arc::clone)
            .ok_or(RegistryError::NotConstructed(chain_id))
    }

    fn build_router(&self, chain_id: u64) -> Result<QuorumRouter, RegistryError> {
        let config = ChainRpcConfig::from_env(chain_id)?;
        // The loaded chain config is the single source of truth for the
        // disable flag; a present handle can still be declined here.
        let store = if config.caching_disabled { None } else { self.store.clone() };

        let endpoints = config
            .urls
            .iter()
            .map(|url| {
                let endpoint_config = EndpointConfig {
                    url: url.clone(),
                    chain_id,
                    timeout: config.timeout,
                    max_concurrency: config.max_concurrency,
                    gzip: true,
                    rate_limit_retries: config.retries,
                    log_every_n_rate_limits: config.log_every_n_rate_limits,
                };
                let transport = RateLimitedEndpoint::new(endpoint_config, self.client.clone());
                Arc::new(CachingEndpoint::new(
                    transport,
                    store.clone(),
                    CacheSettings {
                        namespace: config.cache_namespace.clone(),
                        entry_ttl: config.provider_cache_ttl,
                        head_ttl: config.block_number_ttl,
                        reorg_distance: config.reorg_distance,
                    },
                ))
            })
            .collect();

        info!(
            chain_id,
            endpoints = config.urls.len(),
            quorum = config.quorum_threshold,
            caching = store.is_some(),
            "constructed rpc router"
        );

        Ok(QuorumRouter::new(
            chain_id,
            endpoints,
            config.quorum_threshold,
            RetryingCaller { retries: config.retries, delay: config.retry_delay },
        ))
    }
}
