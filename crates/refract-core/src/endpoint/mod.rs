//! The per-provider endpoint stack.
//!
//! One stack exists per configured URL, layered bottom-up:
//!
//! 1. [`http::RateLimitedEndpoint`] — JSON-RPC over HTTP under a FIFO
//!    admission semaphore, with 429 backoff.
//! 2. [`caching::CachingEndpoint`] — read-through/write-back of immutable
//!    historical results against the shared [`KvStore`](crate::cache::KvStore).
//! 3. [`retry::RetryingCaller`] — fixed-delay retries over the whole stack.
//!
//! The router owns a list of these stacks and never talks to a provider any
//! other way.

pub mod caching;
pub mod errors;
pub mod http;
pub mod retry;

pub use caching::{CacheSettings, CachingEndpoint};
pub use errors::{DisagreementGroup, ProviderFailure, RpcError};
pub use http::{EndpointConfig, RateLimitedEndpoint};
pub use retry::RetryingCaller;
