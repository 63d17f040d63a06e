// tests/handoff_integration_test.rs

//! Full-stack integration tests: real `axum` listeners on real TCP
//! ports, wired together exactly as separate node processes would be,
//! exercising the regular set-primary handoff over the actual wire
//! protocol rather than through a single in-process `ClusterRuntimeState`.

use std::sync::Arc;
use storcp::config::{MetasyncConfig, TimeoutsConfig};
use storcp::node::{NodeId, NodeInfo, NodeRole};
use storcp::rpc::{server as rpc_server, RpcClient};
use storcp::{ClusterRuntimeState, NodeFlags};

struct Node {
    state: Arc<ClusterRuntimeState>,
    addr: String,
}

async fn spawn_node(id: &str, role: NodeRole, uuid: &str) -> Node {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = format!("http://{}", listener.local_addr().unwrap());

    let self_info = NodeInfo::new(NodeId::from(id), role, addr.clone(), addr.clone());
    let rpc = RpcClient::new(
        self_info.id.clone(),
        &TimeoutsConfig {
            cplane_operation_ms: 2_000,
            max_keepalive_ms: 2_000,
        },
    );
    let state = Arc::new(ClusterRuntimeState::new(
        self_info,
        uuid.to_string(),
        rpc,
        MetasyncConfig {
            max_retries: 1,
            retry_backoff_ms: 5,
            queue_depth: 16,
        },
        3,
    ));

    let app = rpc_server::build_router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Node { state, addr }
}

/// Registers every node in `nodes` into every other node's smap, so all
/// five start with an identical membership view, then makes the first
/// node (by convention the primary) publish that view to itself.
async fn converge_membership(nodes: &[&Node]) {
    let infos: Vec<NodeInfo> = nodes.iter().map(|n| n.state.self_info.clone()).collect();
    for node in nodes {
        node.state
            .smap
            .modify(
                |s| {
                    for info in &infos {
                        match info.role {
                            NodeRole::Proxy => {
                                s.proxies.insert(info.id.clone(), info.clone());
                            }
                            NodeRole::Target => {
                                s.targets.insert(info.id.clone(), info.clone());
                            }
                        }
                    }
                    Ok(())
                },
                None::<fn(Arc<storcp::meta::Smap>)>,
            )
            .await
            .unwrap();
    }
}

/// Waits briefly for the commit-broadcast's best-effort fan-out to land
/// on every follower before assertions run.
async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(150)).await;
}

/// Scenario 1: regular set-primary happy path across a 5-node cluster.
#[tokio::test]
async fn regular_handoff_converges_all_five_nodes_over_the_wire() {
    let uuid = "U-scenario-1";
    let p1 = spawn_node("p1", NodeRole::Proxy, uuid).await;
    let p2 = spawn_node("p2", NodeRole::Proxy, uuid).await;
    let p3 = spawn_node("p3", NodeRole::Proxy, uuid).await;
    let t1 = spawn_node("t1", NodeRole::Target, uuid).await;
    let t2 = spawn_node("t2", NodeRole::Target, uuid).await;
    let all = [&p1, &p2, &p3, &t1, &t2];
    converge_membership(&all).await;

    let version_before = p1.state.smap.get().version;

    let client = reqwest::Client::new();
    let resp = client
        .put(format!("{}/cluster/proxy/p2", p1.addr))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success(), "set-primary request failed: {:?}", resp.status());

    settle().await;

    for node in &all {
        let smap = node.state.smap.get();
        assert!(
            smap.is_primary(&NodeId::from("p2")),
            "node {} did not converge on the new primary",
            node.state.self_info.id
        );
        assert!(smap.version > version_before, "node {} version did not advance", node.state.self_info.id);
    }
    assert!(!p1.state.is_primary());
    assert!(p2.state.is_primary());
}

/// Scenario 2: an ineligible designated primary is rejected before any
/// node's smap version changes.
#[tokio::test]
async fn set_primary_on_non_electable_target_leaves_cluster_untouched() {
    let uuid = "U-scenario-2";
    let p1 = spawn_node("p1", NodeRole::Proxy, uuid).await;
    let p2 = spawn_node("p2", NodeRole::Proxy, uuid).await;
    let all = [&p1, &p2];
    converge_membership(&all).await;

    p2.state
        .smap
        .modify(
            |s| {
                if let Some(p2_entry) = s.proxies.get_mut(&NodeId::from("p2")) {
                    p2_entry.flags = NodeFlags::NON_ELECTABLE;
                }
                Ok(())
            },
            None::<fn(Arc<storcp::meta::Smap>)>,
        )
        .await
        .unwrap();
    p1.state
        .smap
        .modify(
            |s| {
                if let Some(p2_entry) = s.proxies.get_mut(&NodeId::from("p2")) {
                    p2_entry.flags = NodeFlags::NON_ELECTABLE;
                }
                Ok(())
            },
            None::<fn(Arc<storcp::meta::Smap>)>,
        )
        .await
        .unwrap();

    let version_before = p1.state.smap.get().version;

    let client = reqwest::Client::new();
    let resp = client
        .put(format!("{}/cluster/proxy/p2", p1.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

    assert_eq!(p1.state.smap.get().version, version_before);
    assert!(p1.state.is_primary());
}

/// Scenario 6: two concurrent set-primary requests against the same
/// primary — exactly one proceeds, the other observes `Busy`.
#[tokio::test]
async fn concurrent_set_primary_requests_single_flight_to_one_winner() {
    let uuid = "U-scenario-6";
    let p1 = spawn_node("p1", NodeRole::Proxy, uuid).await;
    let p2 = spawn_node("p2", NodeRole::Proxy, uuid).await;
    let p3 = spawn_node("p3", NodeRole::Proxy, uuid).await;
    let all = [&p1, &p2, &p3];
    converge_membership(&all).await;

    let (r1, r2) = tokio::join!(
        storcp::controller::regular::set_primary(&p1.state, &NodeId::from("p2"), false, None),
        storcp::controller::regular::set_primary(&p1.state, &NodeId::from("p3"), false, None),
    );

    let outcomes = [r1, r2];
    let busy_count = outcomes.iter().filter(|r| matches!(r, Err(storcp::CpError::Busy))).count();
    let ok_count = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(busy_count, 1, "exactly one concurrent request should observe Busy");
    assert_eq!(ok_count, 1, "exactly one concurrent request should succeed");

    settle().await;
    let winner = if outcomes[0].is_ok() { "p2" } else { "p3" };
    assert!(p1.state.smap.get().is_primary(&NodeId::from(winner)));
}
