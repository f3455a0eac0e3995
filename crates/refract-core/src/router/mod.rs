//! Quorum routing across an ordered list of endpoint stacks.
//!
//! The steady state costs exactly `Q` upstream calls: the first `Q`
//! endpoints in preference order are dispatched, and when they all succeed
//! and agree the answer is returned with no further traffic. Fallbacks —
//! everything past the first `Q` — are consumed one at a time to replace a
//! failed required slot, or dispatched in parallel to break a tie when the
//! required responses disagree. No endpoint is consulted twice within one
//! logical call.
//!
//! A call moves through a small state machine:
//!
//! ```text
//! DISPATCHING ──(all required succeed, all agree)──► RESOLVED(value)
//! DISPATCHING ──(a slot fails, fallback available)──► DISPATCHING (slot retargeted)
//! DISPATCHING ──(a slot fails, deque empty)──► REJECTED(NotEnoughProviders)
//! DISPATCHING ──(required disagree)──► RESOLVING-TIES
//! RESOLVING-TIES ──(top class ≥ Q)──► RESOLVED(value) + drift warning
//! RESOLVING-TIES ──(otherwise)──► REJECTED(QuorumNotMet)
//! ```
//!
//! Once the tie-break wave launches, every fallback is awaited to
//! settlement; a late success never undoes a decision already taken.

pub mod policy;

use futures_util::future::join_all;
use serde_json::Value;
use std::{collections::VecDeque, sync::Arc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::endpoint::{
    errors::{truncate_value, DisagreementGroup, ProviderFailure, RpcError},
    CachingEndpoint, RetryingCaller,
};

/// Fault-tolerant dispatcher over one chain's endpoint stacks.
pub struct QuorumRouter {
    chain_id: u64,
    /// Preference order; also the tie-break order for fallback selection.
    endpoints: Vec<Arc<CachingEndpoint>>,
    quorum_threshold: usize,
    caller: RetryingCaller,
}

/// Terminal state of one required slot.
struct SlotOutcome {
    /// `(host, result)` of the endpoint that filled the slot, if any.
    success: Option<(String, Value)>,
    /// Every provider this slot burned through, with its final error.
    failures: Vec<ProviderFailure>,
}

impl QuorumRouter {
    /// Builds a router over `endpoints` in preference order.
    ///
    /// Callers are expected to have validated `1 <= quorum_threshold <=
    /// endpoints.len()` (the registry does, at construction time).
    #[must_use]
    pub fn new(
        chain_id: u64,
        endpoints: Vec<Arc<CachingEndpoint>>,
        quorum_threshold: usize,
        caller: RetryingCaller,
    ) -> Self {
        debug_assert!(quorum_threshold >= 1);
        debug_assert!(quorum_threshold <= endpoints.len());
        Self { chain_id, endpoints, quorum_threshold, caller }
    }

    #[must_use]
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    #[must_use]
    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    /// Sends one logical call and returns the quorum-agreed result.
    ///
    /// # Errors
    ///
    /// - [`RpcError::NotEnoughProviders`] when a required slot could not be
    ///   filled even after consuming every fallback.
    /// - [`RpcError::QuorumNotMet`] when enough providers answered but no
    ///   equivalence class reached the required size.
    /// - Any per-endpoint error, when the quorum for the method is one and
    ///   every provider failed (reported as `NotEnoughProviders`).
    pub async fn send(&self, method: &str, params: &[Value]) -> Result<Value, RpcError> {
        let required = policy::required_quorum(self.quorum_threshold, method, params);

        let fallbacks: Mutex<VecDeque<Arc<CachingEndpoint>>> =
            Mutex::new(self.endpoints[required..].iter().map(Arc::clone).collect());

        let slots = self.endpoints[..required]
            .iter()
            .map(|primary| self.fill_slot(Arc::clone(primary), &fallbacks, method, params));
        let outcomes = join_all(slots).await;

        let mut failures = Vec::new();
        let mut responses: Vec<(String, Value)> = Vec::new();
        let mut unfilled = 0usize;
        for outcome in outcomes {
            failures.extend(outcome.failures);
            match outcome.success {
                Some(pair) => responses.push(pair),
                None => unfilled += 1,
            }
        }

        if unfilled > 0 {
            return Err(RpcError::NotEnoughProviders {
                failures,
                successes: responses.into_iter().map(|(host, _)| host).collect(),
            });
        }

        // All required slots filled; the common case is unanimous agreement.
        let unanimous = responses.first().map_or(false, |(_, first)| {
            let digest = policy::result_digest(method, first);
            responses.iter().all(|(_, v)| policy::result_digest(method, v) == digest)
        });
        if unanimous {
            let (_, value) = responses.swap_remove(0);
            return Ok(value);
        }

        // Required responses disagree: widen to every remaining fallback and
        // let the tally decide.
        let leftovers: Vec<Arc<CachingEndpoint>> = fallbacks.lock().await.drain(..).collect();
        debug!(
            chain_id = self.chain_id,
            method,
            extra = leftovers.len(),
            "required responses disagree, widening to fallbacks"
        );
        let extra = join_all(leftovers.iter().map(|endpoint| async move {
            let host = endpoint.host().to_string();
            (host, self.caller.call(endpoint, method, params).await)
        }))
        .await;
        for (host, result) in extra {
            match result {
                Ok(value) => responses.push((host, value)),
                Err(error) => failures.push(ProviderFailure { host, error: error.to_string() }),
            }
        }

        let mut groups = tally(method, responses);
        // Largest class wins; ties keep first-seen (preference) order because
        // the sort is stable.
        groups.sort_by(|a, b| b.hosts.len().cmp(&a.hosts.len()));

        let top_count = groups.first().map_or(0, |g| g.hosts.len());
        if top_count >= required {
            let winner = groups.swap_remove(0);
            self.warn_drift(method, &winner, &groups);
            return Ok(winner.value);
        }

        Err(RpcError::QuorumNotMet { required, groups, failures })
    }

    /// Drives one required slot to a terminal state.
    ///
    /// The slot starts on its primary endpoint; each failure pops one
    /// fallback off the shared deque and retries there. A fallback popped
    /// here is gone for every other slot, so no endpoint serves two slots.
    async fn fill_slot(
        &self,
        primary: Arc<CachingEndpoint>,
        fallbacks: &Mutex<VecDeque<Arc<CachingEndpoint>>>,
        method: &str,
        params: &[Value],
    ) -> SlotOutcome {
        let mut candidate = primary;
        let mut failures = Vec::new();
        loop {
            match self.caller.call(&candidate, method, params).await {
                Ok(value) => {
                    return SlotOutcome {
                        success: Some((candidate.host().to_string(), value)),
                        failures,
                    }
                }
                Err(error) => {
                    debug!(
                        chain_id = self.chain_id,
                        host = candidate.host(),
                        method,
                        error = %error,
                        "provider exhausted its retries, promoting fallback"
                    );
                    failures.push(ProviderFailure {
                        host: candidate.host().to_string(),
                        error: error.to_string(),
                    });
                    match fallbacks.lock().await.pop_front() {
                        Some(next) => candidate = next,
                        None => return SlotOutcome { success: None, failures },
                    }
                }
            }
        }
    }

    fn warn_drift(&self, method: &str, winner: &DisagreementGroup, losers: &[DisagreementGroup]) {
        let disagreeing: Vec<String> = losers
            .iter()
            .flat_map(|group| {
                let rendered = truncate_value(&group.value);
                group.hosts.iter().map(move |host| format!("{host}={rendered}"))
            })
            .collect();
        warn!(
            chain_id = self.chain_id,
            method,
            agreed = %winner.hosts.join(", "),
            disagreed = %disagreeing.join("; "),
            "quorum reached despite provider drift"
        );
    }
}

/// Groups responses into equivalence classes under the method's equality
/// relation, preserving first-seen order.
fn tally(method: &str, responses: Vec<(String, Value)>) -> Vec<DisagreementGroup> {
    let mut digests: Vec<u64> = Vec::new();
    let mut groups: Vec<DisagreementGroup> = Vec::new();
    for (host, value) in responses {
        let digest = policy::result_digest(method, &value);
        if let Some(index) = digests.iter().position(|&d| d == digest) {
            groups[index].hosts.push(host);
        } else {
            digests.push(digest);
            groups.push(DisagreementGroup { hosts: vec![host], value });
        }
    }
    groups
}
