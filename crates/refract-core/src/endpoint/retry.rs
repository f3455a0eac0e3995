//! Fixed-delay retry over one endpoint stack.

use tracing::debug;

use crate::endpoint::{caching::CachingEndpoint, errors::RpcError};

/// Retries a logical call against a single endpoint.
///
/// Every failure mode the endpoint surfaces is retried the same way — up to
/// `retries` extra attempts with a fixed `delay` between them, so at most
/// `retries + 1` attempts total. This layer smooths transient blips; it
/// deliberately carries no policy. Rate-limit handling lives inside the
/// endpoint, and fallback promotion lives in the router.
#[derive(Debug, Clone, Copy)]
pub struct RetryingCaller {
    pub retries: u32,
    pub delay: std::time::Duration,
}

impl RetryingCaller {
    /// Calls `endpoint` until it succeeds or the attempt budget is spent.
    ///
    /// # Errors
    ///
    /// The last attempt's error, unchanged.
    pub async fn call(
        &self,
        endpoint: &CachingEndpoint,
        method: &str,
        params: &[serde_json::Value],
    ) -> Result<serde_json::Value, RpcError> {
        let mut attempt: u32 = 0;
        loop {
            match endpoint.send(method, params).await {
                Ok(value) => return Ok(value),
                Err(error) if attempt < self.retries => {
                    attempt += 1;
                    debug!(
                        host = endpoint.host(),
                        method,
                        attempt,
                        error = %error,
                        "retrying after endpoint failure"
                    );
                    tokio::time::sleep(self.delay).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
