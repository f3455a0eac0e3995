//! Per-method quorum and equality policy.
//!
//! Methods whose honest answer is a function of finalized-enough chain state
//! require agreement across providers. Methods whose answer legitimately
//! varies between honest nodes — head position, mempool contents — must not,
//! or the router would deadlock against reality.

use serde_json::Value;

use crate::utils::{block_param, json_hash};

/// Number of matching responses required for this call.
///
/// - `eth_getLogs`: always deterministic over its range → full threshold.
/// - `eth_getBlockByNumber` / `eth_call`: the threshold applies only when the
///   block tag pins a concrete number; `"latest"` (or any tag) answers from
///   the node's own head and gets a quorum of one.
/// - Everything else: one.
#[must_use]
pub fn required_quorum(threshold: usize, method: &str, params: &[Value]) -> usize {
    match method {
        "eth_getLogs" => threshold,
        "eth_getBlockByNumber" => {
            params.first().and_then(block_param::numeric_block).map_or(1, |_| threshold)
        }
        "eth_call" => params.get(1).and_then(block_param::numeric_block).map_or(1, |_| threshold),
        _ => 1,
    }
}

/// Top-level result fields excluded from the equality relation.
///
/// `miner` has been observed to diverge between honest providers during
/// node-software transitions, so block-by-number comparison ignores it.
#[must_use]
pub fn excluded_fields(method: &str) -> &'static [&'static str] {
    match method {
        "eth_getBlockByNumber" => &["miner"],
        _ => &[],
    }
}

/// Digest of a result under the method's equality relation.
///
/// Two results agree iff their digests match. The exclusion is applied by
/// the hasher; the value itself is never touched.
#[must_use]
pub fn result_digest(method: &str, value: &Value) -> u64 {
    let excluded = excluded_fields(method);
    if excluded.is_empty() {
        json_hash::hash_value(value)
    } else {
        json_hash::hash_value_excluding(value, excluded)
    }
}
