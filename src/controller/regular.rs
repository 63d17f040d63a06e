// src/controller/regular.rs

//! 4.E.1 regular set-primary and 4.E.2's `_with_force` dispatch.

use crate::errors::CpError;
use crate::meta::clumeta::{CluMeta, FillOpts};
use crate::metrics;
use crate::node::NodeId;
use crate::state::ClusterRuntimeState;
use std::sync::Arc;
use tracing::{error, warn};

/// Entry point for `PUT /cluster/proxy/{id}`. Dispatches to the regular
/// handoff when `npid` names a known local proxy; otherwise requires
/// `force=true` and delegates to the force-join controller.
pub async fn set_primary(
    state: &ClusterRuntimeState,
    npid: &NodeId,
    force: bool,
    primary_candidate_url: Option<&str>,
) -> Result<(), CpError> {
    if !state.is_primary() {
        return Err(CpError::NotPrimary);
    }

    let guard = state.acquire_single_flight()?;
    metrics::HANDOFF_ATTEMPTS_TOTAL.inc();

    let smap = state.smap.get();
    let result = if smap.get_proxy(npid).is_some() {
        regular_handoff(state, npid).await
    } else if force {
        metrics::FORCE_JOIN_ATTEMPTS_TOTAL.inc();
        crate::controller::force_join::force_join(state, npid, primary_candidate_url).await
    } else {
        Err(CpError::NodeNotFound { id: npid.clone() })
    };

    drop(guard);
    result
}

/// 4.E.1: two-phase prepare/commit broadcast reassigning the primary
/// among known, electable proxies.
async fn regular_handoff(state: &ClusterRuntimeState, npid: &NodeId) -> Result<(), CpError> {
    let smap = state.smap.get();
    let npsi = smap
        .get_proxy(npid)
        .cloned()
        .ok_or_else(|| CpError::NodeNotFound { id: npid.clone() })?;
    npsi.eligible_for_primary()?;

    let cm = CluMeta::fill(
        &state.smap,
        &state.bmd,
        &state.rmd,
        &state.config_md,
        &state.etl_md,
        FillOpts {
            skip_smap: false,
            skip_prime_time: true,
        },
    );

    // 1. Prepare: broadcast to every other node (self's own prepare is a
    // local no-op — it already holds the cluMeta it would be asked to
    // validate). Any error aborts; no local changes have been made yet.
    let members: Vec<_> = smap.other_members().into_iter().cloned().collect();
    let target = crate::broadcast::BroadcastTarget::AllNodes(members);
    let prepare_results = crate::broadcast::fan_out(&target, |node| {
        let rpc = state.rpc.clone();
        let url = node.preferred_url().unwrap_or_default().to_string();
        let npid = npid.clone();
        let cm = cm.clone();
        async move { rpc.set_primary_prepare(&url, &npid, &cm).await.map_err(|e| CpError::at_stage("prepare", e)) }
    })
    .await;
    if let Some((id, err)) = crate::broadcast::first_error(&prepare_results) {
        return Err(CpError::at_stage(&format!("prepare (node {id})"), err));
    }

    // 2. Local commit.
    state
        .smap
        .modify(
            |s| {
                s.primary = npid.clone();
                Ok(())
            },
            None::<fn(Arc<crate::meta::Smap>)>,
        )
        .await
        .map_err(|e| CpError::at_stage("local-commit", e))?;
    state.metasync.become_non_primary();

    // 3. Commit broadcast. Failure of the new primary is fatal;
    // failures elsewhere are logged.
    let commit_results = crate::broadcast::fan_out(&target, |node| {
        let rpc = state.rpc.clone();
        let url = node.preferred_url().unwrap_or_default().to_string();
        let npid = npid.clone();
        async move { rpc.set_primary_commit(&url, &npid).await }
    })
    .await;
    for r in &commit_results {
        if let Err(e) = &r.result {
            if &r.id == npid {
                error!(new_primary = %npid, error = %e, "commit-broadcast: new primary failed to apply commit");
                std::process::exit(1);
            }
            warn!(node = %r.id, error = %e, "commit-broadcast: follower failed to apply commit");
        }
    }

    metrics::HANDOFF_SUCCESS_TOTAL.inc();
    metrics::SMAP_VERSION.set(state.smap.get().version as f64);
    metrics::IS_PRIMARY.set(0.0);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MetasyncConfig, TimeoutsConfig};
    use crate::node::{NodeInfo, NodeRole};
    use crate::rpc::RpcClient;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn state_with_peer() -> (ClusterRuntimeState, MockServer, NodeId) {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path_regex("^/daemon/proxy/.*$"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let self_info = NodeInfo::new(
            NodeId::from("p1"),
            NodeRole::Proxy,
            "http://p1.invalid".to_string(),
            "http://p1.invalid".to_string(),
        );
        let rpc = RpcClient::new(self_info.id.clone(), &TimeoutsConfig {
            cplane_operation_ms: 500,
            max_keepalive_ms: 500,
        });
        let state = ClusterRuntimeState::new(
            self_info,
            "U1".to_string(),
            rpc,
            MetasyncConfig {
                max_retries: 1,
                retry_backoff_ms: 1,
                queue_depth: 8,
            },
            3,
        );

        let p2_id = NodeId::from("p2");
        let p2 = NodeInfo::new(p2_id.clone(), NodeRole::Proxy, server.uri(), server.uri());
        state.smap.modify(
            |s| {
                s.proxies.insert(p2.id.clone(), p2.clone());
                Ok(())
            },
            None::<fn(Arc<crate::meta::Smap>)>,
        )
        .await
        .unwrap();

        (state, server, p2_id)
    }

    #[tokio::test]
    async fn set_primary_happy_path_reassigns_primary() {
        let (state, _server, p2_id) = state_with_peer().await;
        set_primary(&state, &p2_id, false, None).await.unwrap();
        assert!(state.smap.get().is_primary(&p2_id));
    }

    #[tokio::test]
    async fn set_primary_rejects_ineligible_target() {
        let (state, _server, p2_id) = state_with_peer().await;
        state
            .smap
            .modify(
                |s| {
                    if let Some(p2) = s.proxies.get_mut(&p2_id) {
                        p2.flags = crate::node::NodeFlags::NON_ELECTABLE;
                    }
                    Ok(())
                },
                None::<fn(Arc<crate::meta::Smap>)>,
            )
            .await
            .unwrap();

        let err = set_primary(&state, &p2_id, false, None).await.unwrap_err();
        assert!(matches!(err, CpError::Ineligible { .. }));
    }

    #[tokio::test]
    async fn set_primary_on_non_primary_node_is_rejected() {
        let (state, _server, p2_id) = state_with_peer().await;
        state.metasync.become_non_primary();
        state
            .smap
            .modify(
                |s| {
                    s.primary = p2_id.clone();
                    Ok(())
                },
                None::<fn(Arc<crate::meta::Smap>)>,
            )
            .await
            .unwrap();

        let err = set_primary(&state, &NodeId::from("p1"), false, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CpError::NotPrimary));
    }

    #[tokio::test]
    async fn unknown_target_without_force_is_node_not_found() {
        let (state, _server, _p2_id) = state_with_peer().await;
        let err = set_primary(&state, &NodeId::from("ghost"), false, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CpError::NodeNotFound { .. }));
    }
}
