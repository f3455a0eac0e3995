//! # Refract Core
//!
//! Fault-tolerant, quorum-capable JSON-RPC client fabric.
//!
//! A consumer issues one logical call — a method name plus a parameter array —
//! and receives one result. Underneath, the call is distributed across several
//! upstream RPC providers with per-provider concurrency ceilings, transparent
//! caching of immutable historical reads, fixed-delay retries, and, for
//! methods whose honest answers cannot diverge, agreement from a configurable
//! number of providers before the answer is accepted.
//!
//! ## Architecture
//!
//! ```text
//! EndpointRegistry ── get(chain_id) ──► QuorumRouter
//!                                           │ send(method, params)
//!                             ┌─────────────┼─────────────┐
//!                             ▼             ▼             ▼
//!                       RetryingCaller  (one per required slot,
//!                             │          fallbacks promoted on failure)
//!                             ▼
//!                       CachingEndpoint ──► KvStore (historical eth_getLogs)
//!                             │
//!                             ▼
//!                       RateLimitedEndpoint ──► HTTP JSON-RPC (FIFO admission,
//!                                               429 backoff with jitter)
//! ```
//!
//! - **[`registry`]**: one memoized [`QuorumRouter`](router::QuorumRouter) per
//!   `(chain id, cache enabled)` pair, constructed lazily from `NODE_*`
//!   environment variables.
//! - **[`router`]**: required/fallback dispatch and the result-equality
//!   tally that decides when responses form a quorum.
//! - **[`endpoint`]**: the per-provider stack — admission-limited HTTP
//!   transport, reorg-horizon-aware caching, and fixed-delay retries.
//! - **[`cache`]**: the consumed key-value contract plus an in-process
//!   reference store.
//! - **[`config`]**: environment configuration and the per-chain reorg
//!   distance table.
//!
//! This crate emits [`tracing`] events but never installs a subscriber; the
//! embedding process owns logging setup.

pub mod cache;
pub mod config;
pub mod endpoint;
pub mod registry;
pub mod router;
pub mod types;
pub mod utils;

pub use cache::{KvStore, MemoryKvStore};
pub use endpoint::errors::RpcError;
pub use registry::{EndpointRegistry, RegistryError};
pub use router::QuorumRouter;
