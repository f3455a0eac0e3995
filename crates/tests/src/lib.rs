//! Integration tests for the refract RPC fabric.
//!
//! Test modules:
//!
//! - `quorum_tests`: end-to-end quorum dispatch — agreement, fallback
//!   promotion, tie-breaks, drift, and quorum failures
//! - `cache_tests`: reorg-horizon cacheability and KV round-trips
//! - `endpoint_tests`: retry budgets and rate-limit backoff across the
//!   endpoint stack
//! - `registry_tests`: memoized construction from environment configuration
//! - `mock_infrastructure`: a scripted JSON-RPC mock server driving all of
//!   the above
//!
//! Run with:
//!
//! ```bash
//! cargo test --package tests
//! ```

#[cfg(test)]
mod cache_tests;


#[cfg(test)]
mod quorum_tests;
