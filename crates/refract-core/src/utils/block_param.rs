//! Block parameter classification.
//!
//! Ethereum JSON-RPC block parameters are either `0x`-prefixed hexadecimal
//! numbers or symbolic tags (`"latest"`, `"pending"`, ...). Cacheability and
//! quorum selection both hinge on the distinction: only a concrete number
//! pins the answer to immutable chain state. Tags, decimal strings, and
//! EIP-1898 block objects are all treated as head-dependent.

/// Parses a strict `0x`-prefixed hexadecimal block number.
///
/// # Examples
/// ```
/// use refract_core::utils::block_param::parse_hex_u64;
///
/// assert_eq!(parse_hex_u64("0x10"), Some(16));
/// assert_eq!(parse_hex_u64("latest"), None);
/// assert_eq!(parse_hex_u64("16"), None);
/// ```
#[must_use]
pub fn parse_hex_u64(s: &str) -> Option<u64> {
    let digits = s.strip_prefix("0x")?;
    u64::from_str_radix(digits, 16).ok()
}

/// Extracts a concrete block number from a JSON parameter value.
///
/// Returns `Some` only for string values holding a `0x`-hex number.
#[must_use]
pub fn numeric_block(value: &serde_json::Value) -> Option<u64> {
    value.as_str().and_then(parse_hex_u64)
}

/// Formats a block number in the JSON-RPC wire form.
#[must_use]
pub fn to_hex(block: u64) -> String {
    format!("0x{block:x}")
}
