//! Environment configuration for per-chain RPC stacks.
//!
//! All knobs are flat `NODE_*` environment variables. A chain-suffixed
//! variable (`NODE_TIMEOUT_137`) overrides the unsuffixed one
//! (`NODE_TIMEOUT`); every variable has a compiled default except the URL
//! list, which must be present for any chain a consumer requests.
//!
//! Validation happens at load time: an invalid value fails router
//! construction instead of silently falling back to a default.

use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_RETRIES: u32 = 2;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 1;
pub const DEFAULT_QUORUM: usize = 1;
pub const DEFAULT_MAX_CONCURRENCY: usize = 25;
pub const DEFAULT_CACHE_NAMESPACE: &str = "DEFAULT_0";
pub const DEFAULT_LOG_EVERY_N_RATE_LIMITS: u64 = 100;
/// Entries beyond the reorg horizon are immutable, so this bounds storage
/// pressure rather than correctness.
pub const DEFAULT_PROVIDER_CACHE_TTL_SECS: u64 = 14 * 24 * 3600;
pub const DEFAULT_BLOCK_NUMBER_TTL_SECS: u64 = 60;

/// Errors raised while loading or validating chain configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no RPC urls configured for chain {0}: set NODE_URLS_{0} or NODE_URL_{0}")]
    MissingUrls(u64),

    #[error("{var} is not a JSON array of urls: {reason}")]
    InvalidUrlList { var: String, reason: String },

    #[error("{var}={value:?} is invalid: {reason}")]
    InvalidValue { var: String, value: String, reason: String },

    #[error("quorum threshold {quorum} for chain {chain_id} exceeds the {endpoints} configured endpoints")]
    QuorumExceedsEndpoints { chain_id: u64, quorum: usize, endpoints: usize },

    #[error("no max reorg distance entry for chain {0}")]
    NoReorgDistance(u64),
}

/// Blocks below `head - max_reorg_distance(chain)` are assumed immutable.
///
/// Shipped with the binary; a chain without an entry cannot be served because
/// the caching layer would have no safe horizon.
#[must_use]
pub fn max_reorg_distance(chain_id: u64) -> Option<u64> {
    match chain_id {
        1 => Some(64),             // Ethereum
        10 => Some(120),           // Optimism
        137 => Some(256),          // Polygon PoS
        324 => Some(120),          // zkSync Era
        8453 => Some(120),         // Base
        42_161 => Some(32),        // Arbitrum One
        59_144 => Some(120),       // Linea
        534_352 => Some(120),      // Scroll
        11_155_111 => Some(64),    // Sepolia
        84_532 => Some(120),       // Base Sepolia
        421_614 => Some(32),       // Arbitrum Sepolia
        11_155_420 => Some(120),   // Optimism Sepolia
        _ => None,
    }
}

/// Fully resolved configuration for one chain's endpoint stack.
#[derive(Debug, Clone)]
pub struct ChainRpcConfig {
    pub chain_id: u64,
    /// Preference-ordered provider URLs.
    pub urls: Vec<String>,
    pub timeout: Duration,
    pub retries: u32,
    pub retry_delay: Duration,
    pub quorum_threshold: usize,
    pub max_concurrency: usize,
    pub cache_namespace: String,
    pub caching_disabled: bool,
    pub log_every_n_rate_limits: u64,
    pub provider_cache_ttl: Duration,
    pub block_number_ttl: Duration,
    pub reorg_distance: u64,
}

impl ChainRpcConfig {
    /// Loads and validates the configuration for `chain_id` from the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the URL list is missing or malformed,
    /// any numeric variable fails to parse, the quorum threshold is out of
    /// range, or the chain has no reorg distance entry.
    pub fn from_env(chain_id: u64) -> Result<Self, ConfigError> {
        let urls = read_urls(chain_id)?;

        let timeout_ms = parse_chain_var("NODE_TIMEOUT", chain_id, DEFAULT_TIMEOUT_MS)?;
        let retries = parse_chain_var("NODE_RETRIES", chain_id, DEFAULT_RETRIES)?;
        let retry_delay_secs =
            parse_chain_var("NODE_RETRY_DELAY", chain_id, DEFAULT_RETRY_DELAY_SECS)?;
        let quorum_threshold = parse_chain_var("NODE_QUORUM", chain_id, DEFAULT_QUORUM)?;
        let max_concurrency =
            parse_chain_var("NODE_MAX_CONCURRENCY", chain_id, DEFAULT_MAX_CONCURRENCY)?;
        let log_every_n_rate_limits = parse_chain_var(
            "NODE_LOG_EVERY_N_RATE_LIMIT_ERRORS",
            chain_id,
            DEFAULT_LOG_EVERY_N_RATE_LIMITS,
        )?;
        let provider_cache_ttl_secs =
            parse_chain_var("PROVIDER_CACHE_TTL", chain_id, DEFAULT_PROVIDER_CACHE_TTL_SECS)?;
        let block_number_ttl_secs =
            parse_chain_var("BLOCK_NUMBER_TTL", chain_id, DEFAULT_BLOCK_NUMBER_TTL_SECS)?;

        if quorum_threshold < 1 {
            return Err(ConfigError::InvalidValue {
                var: chain_var_name("NODE_QUORUM", chain_id),
                value: quorum_threshold.to_string(),
                reason: "quorum threshold must be at least 1".to_string(),
            });
        }
        if quorum_threshold > urls.len() {
            return Err(ConfigError::QuorumExceedsEndpoints {
                chain_id,
                quorum: quorum_threshold,
                endpoints: urls.len(),
            });
        }
        if max_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                var: chain_var_name("NODE_MAX_CONCURRENCY", chain_id),
                value: "0".to_string(),
                reason: "concurrency ceiling must be at least 1".to_string(),
            });
        }

        let reorg_distance =
            max_reorg_distance(chain_id).ok_or(ConfigError::NoReorgDistance(chain_id))?;

        Ok(Self {
            chain_id,
            urls,
            timeout: Duration::from_millis(timeout_ms),
            retries,
            retry_delay: Duration::from_secs(retry_delay_secs),
            quorum_threshold,
            max_concurrency,
            cache_namespace: std::env::var("NODE_PROVIDER_CACHE_NAMESPACE")
                .unwrap_or_else(|_| DEFAULT_CACHE_NAMESPACE.to_string()),
            caching_disabled: provider_caching_disabled(),
            log_every_n_rate_limits,
            provider_cache_ttl: Duration::from_secs(provider_cache_ttl_secs),
            block_number_ttl: Duration::from_secs(block_number_ttl_secs),
            reorg_distance,
        })
    }
}

/// Whether `NODE_DISABLE_PROVIDER_CACHING` turns the KV cache off
/// process-wide. Captured into [`ChainRpcConfig::caching_disabled`] at load
/// time; nothing reads the variable after construction.
fn provider_caching_disabled() -> bool {
    std::env::var("NODE_DISABLE_PROVIDER_CACHING").is_ok_and(|v| v == "true")
}

fn chain_var_name(base: &str, chain_id: u64) -> String {
    format!("{base}_{chain_id}")
}

/// Reads `<base>_<chain_id>` with `<base>` as the fallback.
fn chain_var(base: &str, chain_id: u64) -> Option<(String, String)> {
    let suffixed = chain_var_name(base, chain_id);
    if let Ok(value) = std::env::var(&suffixed) {
        return Some((suffixed, value));
    }
    std::env::var(base).ok().map(|value| (base.to_string(), value))
}

fn parse_chain_var<T: std::str::FromStr>(
    base: &str,
    chain_id: u64,
    default: T,
) -> Result<T, ConfigError> {
    match chain_var(base, chain_id) {
        Some((var, value)) => value.parse().map_err(|_| ConfigError::InvalidValue {
            var,
            value,
            reason: format!("expected a non-negative {}", std::any::type_name::<T>()),
        }),
        None => Ok(default),
    }
}

fn read_urls(chain_id: u64) -> Result<Vec<String>, ConfigError> {
    let list_var = chain_var_name("NODE_URLS", chain_id);
    if let Ok(raw) = std::env::var(&list_var) {
        let urls: Vec<String> =
            serde_json::from_str(&raw).map_err(|e| ConfigError::InvalidUrlList {
                var: list_var.clone(),
                reason: e.to_string(),
            })?;
        if urls.is_empty() {
            return Err(ConfigError::InvalidUrlList {
                var: list_var,
                reason: "array is empty".to_string(),
            });
        }
        validate_urls(&list_var, &urls)?;
        return Ok(urls);
    }

    let single_var = chain_var_name("NODE_URL", chain_id);
    if let Ok(url) = std::env::var(&single_var) {
        let urls = vec![url];
        validate_urls(&single_var, &urls)?;
        return Ok(urls);
    }

    Err(ConfigError::MissingUrls(chain_id))
}

fn validate_urls(var: &str, urls: &[String]) -> Result<(), ConfigError> {
    for url in urls {
        let parsed = url::Url::parse(url).map_err(|e| ConfigError::InvalidValue {
            var: var.to_string(),
            value: url.clone(),
            reason: e.to_string(),
        })?;
        if parsed.host_str().is_none() {
            return Err(ConfigError::InvalidValue {
                var: var.to_string(),
                value: url.clone(),
                reason: "url has no host".to_string(),
            });
        }
    }
    Ok(())
}
