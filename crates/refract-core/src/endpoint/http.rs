//! Admission-limited JSON-RPC transport for one upstream provider.
//!
//! Public RPC providers cap both request rate and concurrent connections;
//! queueing locally is cheaper than eating 429s. At most `max_concurrency`
//! requests are in flight at once, admitted in FIFO order, and a 429 that
//! does arrive is retried in place with exponential backoff and jitter.

use bytes::Bytes;
use rand::Rng;
use serde_json::Value;
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::Semaphore;
use tracing::{trace, warn};

use crate::{
    endpoint::errors::RpcError,
    types::{JsonRpcRequest, JsonRpcResponse},
};

/// Static configuration for one upstream endpoint.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Full provider URL, possibly carrying credentials in path segments.
    pub url: String,
    pub chain_id: u64,
    /// Per-request timeout covering the whole HTTP roundtrip.
    pub timeout: Duration,
    /// Ceiling on simultaneously in-flight requests to this provider.
    pub max_concurrency: usize,
    /// Advertise gzip acceptance. The shared client always decompresses;
    /// disabling this forces identity encoding for providers that mangle
    /// compressed bodies.
    pub gzip: bool,
    /// In-place retries when the provider answers 429.
    pub rate_limit_retries: u32,
    /// Log every N-th rate-limit event; `0` silences them entirely.
    pub log_every_n_rate_limits: u64,
}

/// One upstream provider behind a FIFO admission semaphore.
///
/// The permit is held for the whole roundtrip, including rate-limit backoff,
/// so the in-flight invariant covers retries too. Waiters are admitted in
/// the order they arrived; there is no priority lane.
pub struct RateLimitedEndpoint {
    config: EndpointConfig,
    /// Host component of the URL, safe for logs and error text.
    host: String,
    client: reqwest::Client,
    admission: Arc<Semaphore>,
    next_id: AtomicU64,
    rate_limit_events: AtomicU64,
}

impl RateLimitedEndpoint {
    #[must_use]
    pub fn new(config: EndpointConfig, client: reqwest::Client) -> Self {
        let host = host_of(&config.url);
        let admission = Arc::new(Semaphore::new(config.max_concurrency));
        Self {
            config,
            host,
            client,
            admission,
            next_id: AtomicU64::new(1),
            rate_limit_events: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn chain_id(&self) -> u64 {
        self.config.chain_id
    }

    /// Sends one JSON-RPC request to this provider.
    ///
    /// Suspends until admitted under the concurrency ceiling, then performs
    /// the HTTP exchange. A 429 response is backed off and re-sent while the
    /// rate-limit budget lasts; every other failure surfaces immediately.
    /// Semantic JSON-RPC errors are never retried here.
    ///
    /// # Errors
    ///
    /// - [`RpcError::Timeout`] when the roundtrip exceeds the configured timeout
    /// - [`RpcError::Http`] for non-success statuses (including exhausted 429s)
    /// - [`RpcError::Rpc`] when the provider returns a JSON-RPC error object
    /// - [`RpcError::Transport`] / [`RpcError::InvalidResponse`] for network
    ///   and decode failures
    pub async fn send(
        &self,
        method: &str,
        params: &[serde_json::Value],
    ) -> Result<Value, RpcError> {
        let _permit = Arc::clone(&self.admission)
            .acquire_owned()
            .await
            .map_err(|_| RpcError::ConcurrencyLimit(self.host.clone()))?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(method, params.to_vec(), id);
        let body = Bytes::from(
            serde_json::to_vec(&request)
                .map_err(|e| RpcError::InvalidResponse(format!("request encoding: {e}")))?,
        );

        let mut attempt: u32 = 0;
        loop {
            // Bytes::clone is O(1), so backoff retries re-send without
            // copying the body.
            let mut builder = self
                .client
                .post(&self.config.url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body.clone())
                .timeout(self.config.timeout);
            if !self.config.gzip {
                builder = builder.header(reqwest::header::ACCEPT_ENCODING, "identity");
            }

            match builder.send().await {
                Ok(response) if response.status().as_u16() == 429 => {
                    self.note_rate_limit();
                    if attempt < self.config.rate_limit_retries {
                        tokio::time::sleep(backoff_delay(attempt)).await;
                        attempt += 1;
                        continue;
                    }
                    let text = truncate_body(response.text().await.unwrap_or_default());
                    return Err(RpcError::Http(429, text));
                }
                Ok(response) if !response.status().is_success() => {
                    let status = response.status().as_u16();
                    let text = truncate_body(response.text().await.unwrap_or_default());
                    trace!(host = %self.host, status, "rpc request failed");
                    return Err(RpcError::Http(status, text));
                }
                Ok(response) => {
                    let parsed: JsonRpcResponse = response
                        .json()
                        .await
                        .map_err(|e| RpcError::InvalidResponse(e.to_string()))?;
                    if let Some(error) = parsed.error {
                        return Err(RpcError::Rpc(error.code, error.message));
                    }
                    return Ok(parsed.result.unwrap_or(Value::Null));
                }
                Err(e) if e.is_timeout() => return Err(RpcError::Timeout),
                Err(e) => return Err(RpcError::Transport(e)),
            }
        }
    }

    fn note_rate_limit(&self) {
        let count = self.rate_limit_events.fetch_add(1, Ordering::Relaxed) + 1;
        let every = self.config.log_every_n_rate_limits;
        if every != 0 && count % every == 0 {
            warn!(
                host = %self.host,
                chain_id = self.config.chain_id,
                total = count,
                "provider rate limiting requests"
            );
        }
    }

    #[cfg(test)]
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.admission.available_permits()
    }
}

/// Backoff before the `attempt`-th rate-limit retry:
/// `base + base * rand()` with `base = 1s * 2^attempt`.
fn backoff_delay(attempt: u32) -> Duration {
    let base = Duration::from_millis(1000u64 << attempt.min(16));
    base + base.mul_f64(rand::rng().random::<f64>())
}

/// Extracts the host (plus explicit port, when one is given) for logs and
/// cache keys. Credentials embedded in URL path segments never appear
/// because only the authority's host component is taken.
fn host_of(url: &str) -> String {
    let Ok(parsed) = url::Url::parse(url) else {
        return "<invalid-url>".to_string();
    };
    match (parsed.host_str(), parsed.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => "<invalid-url>".to_string(),
    }
}

fn truncate_body(text: String) -> String {
    if text.len() > 256 {
        format!("{}... (truncated)", &text[..256])
    } else {
        text
    }
}
