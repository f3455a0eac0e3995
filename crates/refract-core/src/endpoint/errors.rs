//! Error taxonomy for logical calls.

use thiserror::Error;

/// One provider's terminal failure within a logical call.
#[derive(Debug, Clone)]
pub struct ProviderFailure {
    /// Credential-free host of the failing provider.
    pub host: String,
    /// Formatted error text from the endpoint stack.
    pub error: String,
}

/// One equivalence class of responses under the result-equality relation.
#[derive(Debug, Clone)]
pub struct DisagreementGroup {
    /// Hosts whose responses fell into this class.
    pub hosts: Vec<String>,
    /// The class's representative value (first response seen).
    pub value: serde_json::Value,
}

/// Errors surfaced from a logical call.
///
/// Transport, HTTP, and JSON-RPC failures are per-endpoint and are normally
/// absorbed by retries and fallback promotion; they only escape inside the
/// provider enumerations of the two quorum variants. `InvalidRange` is the
/// caller's own input error. The quorum variants are terminal router
/// decisions.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RpcError {
    /// The request exceeded the configured per-call timeout.
    #[error("request timed out")]
    Timeout,

    /// Network-level failure from the HTTP client.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status after rate-limit backoff was exhausted.
    #[error("http error {0}: {1}")]
    Http(u16, String),

    /// Semantic JSON-RPC error returned by the provider. Never retried at
    /// the endpoint layer; retry policy belongs to the caller.
    #[error("rpc error {0}: {1}")]
    Rpc(i32, String),

    /// The provider's payload could not be interpreted.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// `fromBlock` above `toBlock` in a range-parameterized call.
    #[error("invalid block range: fromBlock 0x{from:x} is above toBlock 0x{to:x}")]
    InvalidRange { from: u64, to: u64 },

    /// The admission queue shut down while waiting for a permit.
    #[error("concurrency limiter closed for {0}")]
    ConcurrencyLimit(String),

    /// Not every required quorum slot could be filled, even after consuming
    /// every fallback.
    #[error("not enough providers succeeded: {}", format_outcomes(.failures, .successes))]
    NotEnoughProviders { failures: Vec<ProviderFailure>, successes: Vec<String> },

    /// Enough providers responded, but no equivalence class reached the
    /// required size.
    #[error(
        "quorum not met: {required} matching responses required; {}",
        format_disagreement(.groups, .failures)
    )]
    QuorumNotMet {
        required: usize,
        groups: Vec<DisagreementGroup>,
        failures: Vec<ProviderFailure>,
    },
}

fn format_outcomes(failures: &[ProviderFailure], successes: &[String]) -> String {
    let failed: Vec<String> =
        failures.iter().map(|f| format!("{}: {}", f.host, f.error)).collect();
    format!("failed [{}], succeeded [{}]", failed.join("; "), successes.join(", "))
}

fn format_disagreement(groups: &[DisagreementGroup], failures: &[ProviderFailure]) -> String {
    let classes: Vec<String> = groups
        .iter()
        .map(|g| format!("[{}] => {}", g.hosts.join(", "), truncate_value(&g.value)))
        .collect();
    let mut out = format!("responses {}", classes.join("; "));
    if !failures.is_empty() {
        let failed: Vec<String> =
            failures.iter().map(|f| format!("{}: {}", f.host, f.error)).collect();
        out.push_str(&format!("; errors [{}]", failed.join("; ")));
    }
    out
}

/// Renders a JSON value for log and error text, bounded to keep large log
/// queries from flooding operator output.
pub(crate) fn truncate_value(value: &serde_json::Value) -> String {
    let rendered = value.to_string();
    if rendered.len() > 256 {
        format!("{}... (truncated)", &rendered[..256])
    } else {
        rendered
    }
}
