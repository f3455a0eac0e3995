//! End-to-end quorum dispatch tests.
//!
//! Each test stands up one mock provider per endpoint and asserts both the
//! router's answer and exactly which providers were consulted — the quorum
//! invariants all reduce to "who was asked, and how often".

use crate::mock_infrastructure::{router_over, ScriptedReply, ScriptedRpcServer};
use refract_core::RpcError;
use serde_json::json;

fn logs_params() -> Vec<serde_json::Value> {
    // A tagged range keeps the caching layer out of quorum tests entirely.
    vec![json!({"fromBlock": "latest", "toBlock": "latest"})]
}

#[tokio::test]
async fn agreeing_required_slots_resolve_without_fallback_traffic() {
    let a = ScriptedRpcServer::start().await;
    let b = ScriptedRpcServer::start().await;
    let c = ScriptedRpcServer::start().await;
    a.respond("eth_getLogs", ScriptedReply::result(json!("0x10")));
    b.respond("eth_getLogs", ScriptedReply::result(json!("0x10")));
    c.respond("eth_getLogs", ScriptedReply::result(json!("0x10")));

    let router = router_over(&[&a, &b, &c], 2, 0, None);
    let result = router.send("eth_getLogs", &logs_params()).await.unwrap();

    assert_eq!(result, json!("0x10"));
    assert_eq!(a.hits("eth_getLogs"), 1);
    assert_eq!(b.hits("eth_getLogs"), 1);
    assert_eq!(c.total_hits(), 0, "fallback must stay idle in the steady state");
}

#[tokio::test]
async fn failed_required_slot_consumes_one_fallback() {
    let a = ScriptedRpcServer::start().await;
    let b = ScriptedRpcServer::start().await;
    let c = ScriptedRpcServer::start().await;
    a.respond("eth_getLogs", ScriptedReply::HttpStatus(503));
    b.respond("eth_getLogs", ScriptedReply::result(json!("0x10")));
    c.respond("eth_getLogs", ScriptedReply::result(json!("0x10")));

    let router = router_over(&[&a, &b, &c], 2, 0, None);
    let result = router.send("eth_getLogs", &logs_params()).await.unwrap();

    assert_eq!(result, json!("0x10"));
    assert_eq!(a.hits("eth_getLogs"), 1);
    assert_eq!(b.hits("eth_getLogs"), 1);
    assert_eq!(c.hits("eth_getLogs"), 1, "fallback fills the failed slot exactly once");
}

#[tokio::test]
async fn majority_wins_tie_break_over_one_divergent_provider() {
    let a = ScriptedRpcServer::start().await;
    let b = ScriptedRpcServer::start().await;
    let c = ScriptedRpcServer::start().await;
    a.respond("eth_getLogs", ScriptedReply::result(json!("0x10")));
    b.respond("eth_getLogs", ScriptedReply::result(json!("0x11")));
    c.respond("eth_getLogs", ScriptedReply::result(json!("0x10")));

    let router = router_over(&[&a, &b, &c], 2, 0, None);
    let result = router.send("eth_getLogs", &logs_params()).await.unwrap();

    assert_eq!(result, json!("0x10"));
    assert_eq!(c.hits("eth_getLogs"), 1, "disagreement widens to the fallback");
}

#[tokio::test]
async fn miner_field_does_not_break_block_agreement() {
    let a = ScriptedRpcServer::start().await;
    let b = ScriptedRpcServer::start().await;
    a.respond(
        "eth_getBlockByNumber",
        ScriptedReply::result(json!({"miner": "0xaa", "hash": "0x1"})),
    );
    b.respond(
        "eth_getBlockByNumber",
        ScriptedReply::result(json!({"miner": "0xbb", "hash": "0x1"})),
    );

    let router = router_over(&[&a, &b], 2, 0, None);
    let result = router
        .send("eth_getBlockByNumber", &[json!("0x10"), json!(false)])
        .await
        .unwrap();

    // The first slot's value is returned verbatim, miner intact.
    assert_eq!(result, json!({"miner": "0xaa", "hash": "0x1"}));
}

#[tokio::test]
async fn three_way_disagreement_fails_quorum() {
    let a = ScriptedRpcServer::start().await;
    let b = ScriptedRpcServer::start().await;
    let c = ScriptedRpcServer::start().await;
    a.respond("eth_getLogs", ScriptedReply::result(json!("0x10")));
    b.respond("eth_getLogs", ScriptedReply::result(json!("0x11")));
    c.respond("eth_getLogs", ScriptedReply::result(json!("0x12")));

    let router = router_over(&[&a, &b, &c], 2, 0, None);
    let error = router.send("eth_getLogs", &logs_params()).await.unwrap_err();

    match error {
        RpcError::QuorumNotMet { required, groups, failures } => {
            assert_eq!(required, 2);
            assert_eq!(groups.len(), 3);
            assert!(groups.iter().all(|g| g.hosts.len() == 1));
            assert!(failures.is_empty());
        }
        other => panic!("expected QuorumNotMet, got {other:?}"),
    }
}

#[tokio::test]
async fn exhausted_fallbacks_report_both_sides() {
    let a = ScriptedRpcServer::start().await;
    let b = ScriptedRpcServer::start().await;
    let c = ScriptedRpcServer::start().await;
    a.respond("eth_getLogs", ScriptedReply::HttpStatus(503));
    b.respond("eth_getLogs", ScriptedReply::result(json!("0x10")));
    c.respond("eth_getLogs", ScriptedReply::HttpStatus(503));

    let router = router_over(&[&a, &b, &c], 2, 0, None);
    let error = router.send("eth_getLogs", &logs_params()).await.unwrap_err();

    match error {
        RpcError::NotEnoughProviders { failures, successes } => {
            assert_eq!(failures.len(), 2, "primary and its fallback both enumerated");
            assert_eq!(successes.len(), 1);
            assert!(failures.iter().all(|f| f.error.contains("503")));
        }
        other => panic!("expected NotEnoughProviders, got {other:?}"),
    }
}

#[tokio::test]
async fn quorum_of_one_never_fans_out() {
    let a = ScriptedRpcServer::start().await;
    let b = ScriptedRpcServer::start().await;
    let c = ScriptedRpcServer::start().await;
    a.respond("eth_getLogs", ScriptedReply::result(json!([])));

    let router = router_over(&[&a, &b, &c], 1, 0, None);
    let result = router.send("eth_getLogs", &logs_params()).await.unwrap();

    assert_eq!(result, json!([]));
    assert_eq!(b.total_hits() + c.total_hits(), 0);
}

#[tokio::test]
async fn quorum_equal_to_endpoint_count_has_no_slack() {
    let a = ScriptedRpcServer::start().await;
    let b = ScriptedRpcServer::start().await;
    a.respond("eth_getLogs", ScriptedReply::HttpStatus(503));
    b.respond("eth_getLogs", ScriptedReply::result(json!("0x10")));

    let router = router_over(&[&a, &b], 2, 0, None);
    let error = router.send("eth_getLogs", &logs_params()).await.unwrap_err();

    assert!(matches!(error, RpcError::NotEnoughProviders { .. }));
}

#[tokio::test]
async fn latest_block_tag_downgrades_quorum_to_one() {
    let a = ScriptedRpcServer::start().await;
    let b = ScriptedRpcServer::start().await;
    a.respond("eth_getBlockByNumber", ScriptedReply::result(json!({"number": "0x100"})));

    let router = router_over(&[&a, &b], 2, 0, None);
    let result = router
        .send("eth_getBlockByNumber", &[json!("latest"), json!(false)])
        .await
        .unwrap();

    assert_eq!(result, json!({"number": "0x100"}));
    assert_eq!(b.total_hits(), 0, "head-dependent calls must not demand agreement");
}

#[tokio::test]
async fn eth_call_with_pinned_block_requires_agreement() {
    let a = ScriptedRpcServer::start().await;
    let b = ScriptedRpcServer::start().await;
    a.respond("eth_call", ScriptedReply::result(json!("0xbeef")));
    b.respond("eth_call", ScriptedReply::result(json!("0xbeef")));

    let router = router_over(&[&a, &b], 2, 0, None);
    let call = json!({"to": "0xabc", "data": "0x"});
    let result = router.send("eth_call", &[call, json!("0x100")]).await.unwrap();

    assert_eq!(result, json!("0xbeef"));
    assert_eq!(a.hits("eth_call"), 1);
    assert_eq!(b.hits("eth_call"), 1);
}

#[tokio::test]
async fn rpc_level_errors_promote_fallbacks_too() {
    let a = ScriptedRpcServer::start().await;
    let b = ScriptedRpcServer::start().await;
    let c = ScriptedRpcServer::start().await;
    a.respond("eth_getLogs", ScriptedReply::rpc_error(-32603, "internal error"));
    b.respond("eth_getLogs", ScriptedReply::result(json!("0x10")));
    c.respond("eth_getLogs", ScriptedReply::result(json!("0x10")));

    let router = router_over(&[&a, &b, &c], 2, 0, None);
    let result = router.send("eth_getLogs", &logs_params()).await.unwrap();

    assert_eq!(result, json!("0x10"));
    assert_eq!(c.hits("eth_getLogs"), 1);
}

#[tokio::test]
async fn no_endpoint_serves_two_slots_in_one_call() {
    // Both required slots fail; only two fallbacks exist. Each fallback may
    // be consumed by exactly one slot, so every provider sees exactly one
    // request and the call still resolves.
    let a = ScriptedRpcServer::start().await;
    let b = ScriptedRpcServer::start().await;
    let c = ScriptedRpcServer::start().await;
    let d = ScriptedRpcServer::start().await;
    a.respond("eth_getLogs", ScriptedReply::HttpStatus(503));
    b.respond("eth_getLogs", ScriptedReply::HttpStatus(503));
    c.respond("eth_getLogs", ScriptedReply::result(json!("0x10")));
    d.respond("eth_getLogs", ScriptedReply::result(json!("0x10")));

    let router = router_over(&[&a, &b, &c, &d], 2, 0, None);
    let result = router.send("eth_getLogs", &logs_params()).await.unwrap();

    assert_eq!(result, json!("0x10"));
    for server in [&a, &b, &c, &d] {
        assert_eq!(server.hits("eth_getLogs"), 1);
    }
}
