//! Cacheability and KV round-trip tests.
//!
//! The mock head sits at `0x100` and the test reorg distance is `0x40`, so
//! the horizon is `0xc0`: ranges ending strictly below it are cacheable,
//! everything else goes upstream every time.

use crate::mock_infrastructure::{endpoint_for, ScriptedReply, ScriptedRpcServer};
use refract_core::{cache::MemoryKvStore, KvStore, RpcError};
use serde_json::json;
use std::sync::Arc;

fn sample_log() -> serde_json::Value {
    json!([{
        "address": "0x1f98431c8ad98523631ae4a59f267346ea31f984",
        "blockNumber": "0x15",
        "topics": ["0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"],
        "data": "0x01"
    }])
}

async fn scripted_provider_at_head() -> ScriptedRpcServer {
    let server = ScriptedRpcServer::start().await;
    server.respond("eth_blockNumber", ScriptedReply::result(json!("0x100")));
    server.respond("eth_getLogs", ScriptedReply::result(sample_log()));
    server
}

#[tokio::test]
async fn historical_range_round_trips_through_the_cache() {
    let server = scripted_provider_at_head().await;
    let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    let endpoint = endpoint_for(&server.url(), Some(store), 0);

    let params = [json!({"fromBlock": "0x10", "toBlock": "0x20"})];
    let first = endpoint.send("eth_getLogs", &params).await.unwrap();
    assert_eq!(first, sample_log());
    assert_eq!(server.hits("eth_getLogs"), 1);

    let second = endpoint.send("eth_getLogs", &params).await.unwrap();
    assert_eq!(second, first);
    assert_eq!(server.hits("eth_getLogs"), 1, "second call must be served from cache");
}

#[tokio::test]
async fn range_touching_the_horizon_is_not_cached() {
    let server = scripted_provider_at_head().await;
    let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    let endpoint = endpoint_for(&server.url(), Some(store), 0);

    // head - reorg = 0xc0; the horizon block itself is excluded by strict <.
    let params = [json!({"fromBlock": "0x10", "toBlock": "0xc0"})];
    endpoint.send("eth_getLogs", &params).await.unwrap();
    endpoint.send("eth_getLogs", &params).await.unwrap();
    assert_eq!(server.hits("eth_getLogs"), 2);
}

#[tokio::test]
async fn range_just_below_the_horizon_is_cached() {
    let server = scripted_provider_at_head().await;
    let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    let endpoint = endpoint_for(&server.url(), Some(store), 0);

    let params = [json!({"fromBlock": "0x10", "toBlock": "0xbf"})];
    endpoint.send("eth_getLogs", &params).await.unwrap();
    endpoint.send("eth_getLogs", &params).await.unwrap();
    assert_eq!(server.hits("eth_getLogs"), 1);
}

#[tokio::test]
async fn latest_tags_pass_through_without_error() {
    let server = scripted_provider_at_head().await;
    let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    let endpoint = endpoint_for(&server.url(), Some(store), 0);

    let params = [json!({"fromBlock": "latest", "toBlock": "latest"})];
    endpoint.send("eth_getLogs", &params).await.unwrap();
    endpoint.send("eth_getLogs", &params).await.unwrap();
    assert_eq!(server.hits("eth_getLogs"), 2);
    assert_eq!(server.hits("eth_blockNumber"), 0, "tagged ranges never sample the head");
}

#[tokio::test]
async fn inverted_range_errors_before_any_upstream_traffic() {
    let server = scripted_provider_at_head().await;
    let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    let endpoint = endpoint_for(&server.url(), Some(store), 0);

    let params = [json!({"fromBlock": "0x20", "toBlock": "0x10"})];
    let error = endpoint.send("eth_getLogs", &params).await.unwrap_err();
    assert!(matches!(error, RpcError::InvalidRange { from: 0x20, to: 0x10 }));
    assert_eq!(server.total_hits(), 0);
}

#[tokio::test]
async fn no_store_means_every_call_goes_upstream() {
    let server = scripted_provider_at_head().await;
    let endpoint = endpoint_for(&server.url(), None, 0);

    let params = [json!({"fromBlock": "0x10", "toBlock": "0x20"})];
    endpoint.send("eth_getLogs", &params).await.unwrap();
    endpoint.send("eth_getLogs", &params).await.unwrap();
    assert_eq!(server.hits("eth_getLogs"), 2);
    assert_eq!(server.hits("eth_blockNumber"), 0, "no store, no horizon check");
}

#[tokio::test]
async fn cache_entries_are_bound_to_their_provider() {
    let first = scripted_provider_at_head().await;
    let second = scripted_provider_at_head().await;
    let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    let endpoint_a = endpoint_for(&first.url(), Some(Arc::clone(&store)), 0);
    let endpoint_b = endpoint_for(&second.url(), Some(store), 0);

    let params = [json!({"fromBlock": "0x10", "toBlock": "0x20"})];
    endpoint_a.send("eth_getLogs", &params).await.unwrap();
    endpoint_b.send("eth_getLogs", &params).await.unwrap();

    // Same store, same call — but a different provider key, so no cross-hit.
    assert_eq!(first.hits("eth_getLogs"), 1);
    assert_eq!(second.hits("eth_getLogs"), 1);
}

#[tokio::test]
async fn rpc_errors_are_never_cached() {
    let server = ScriptedRpcServer::start().await;
    server.respond("eth_blockNumber", ScriptedReply::result(json!("0x100")));
    server.respond_sequence(
        "eth_getLogs",
        vec![
            ScriptedReply::rpc_error(-32005, "limit exceeded"),
            ScriptedReply::result(sample_log()),
        ],
    );
    let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    let endpoint = endpoint_for(&server.url(), Some(store), 0);

    let params = [json!({"fromBlock": "0x10", "toBlock": "0x20"})];
    let error = endpoint.send("eth_getLogs", &params).await.unwrap_err();
    assert!(matches!(error, RpcError::Rpc(-32005, _)));

    // The failure was not written back; the retry reaches the upstream and
    // its success is what gets cached.
    assert_eq!(endpoint.send("eth_getLogs", &params).await.unwrap(), sample_log());
    assert_eq!(server.hits("eth_getLogs"), 2);
    endpoint.send("eth_getLogs", &params).await.unwrap();
    assert_eq!(server.hits("eth_getLogs"), 2);
}

#[tokio::test]
async fn concurrent_cacheable_calls_share_one_head_sample() {
    let server = scripted_provider_at_head().await;
    let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    let endpoint = endpoint_for(&server.url(), Some(store), 0);

    let params = [json!({"fromBlock": "0x10", "toBlock": "0x20"})];
    let (a, b) = tokio::join!(
        endpoint.send("eth_getLogs", &params),
        endpoint.send("eth_getLogs", &params)
    );
    assert_eq!(a.unwrap(), sample_log());
    assert_eq!(b.unwrap(), sample_log());
    assert_eq!(server.hits("eth_blockNumber"), 1, "head sampling amortizes across callers");
}
