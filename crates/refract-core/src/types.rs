//! JSON-RPC 2.0 wire types and small shared value types.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// JSON-RPC protocol version constant.
pub const JSONRPC_VERSION: &str = "2.0";

/// Pre-allocated `Cow` for the version string — zero allocation per request.
pub const JSONRPC_VERSION_COW: Cow<'static, str> = Cow::Borrowed(JSONRPC_VERSION);

/// An outgoing JSON-RPC 2.0 request.
///
/// Request ids are plain integers allocated per endpoint; nothing in this
/// crate correlates responses beyond the single in-flight HTTP exchange.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: Cow<'static, str>,
    pub method: String,
    pub params: Vec<serde_json::Value>,
    pub id: u64,
}

impl JsonRpcRequest {
    #[must_use]
    pub fn new(method: impl Into<String>, params: Vec<serde_json::Value>, id: u64) -> Self {
        Self { jsonrpc: JSONRPC_VERSION_COW, method: method.into(), params, id }
    }
}

/// An incoming JSON-RPC 2.0 response.
///
/// Exactly one of `result` and `error` is populated by conforming servers;
/// both are optional here so malformed upstream payloads parse far enough to
/// be rejected with context rather than a bare decode error.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
    #[serde(default)]
    pub id: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 error object.
///
/// Standard codes: `-32700` parse error, `-32600` invalid request, `-32601`
/// method not found, `-32602` invalid params, `-32603` internal error,
/// `-32000..=-32099` server-defined.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Inclusive block range `[from, to]` with `from <= to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub from: u64,
    pub to: u64,
}

impl BlockRange {
    /// Creates a new block range.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if `from > to`.
    #[inline]
    #[must_use]
    pub fn new(from: u64, to: u64) -> Self {
        debug_assert!(from <= to, "invalid BlockRange: from ({from}) > to ({to})");
        Self { from, to }
    }

    /// Number of blocks covered, inclusive.
    #[inline]
    #[must_use]
    pub fn len(&self) -> u64 {
        self.to.saturating_sub(self.from).saturating_add(1)
    }

    /// True only for invalid ranges where `from > to`.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.from > self.to
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, block: u64) -> bool {
        block >= self.from && block <= self.to
    }
}
