// src/controller/become_primary.rs

//! 4.E.7: two-stage smap mutation that installs this node as primary,
//! used both by the regular handoff's follower-side commit and by
//! `daeSetPrimary`'s commit mode (4.E.6).

use crate::errors::CpError;
use crate::meta::Smap;
use crate::metrics;
use crate::node::NodeId;
use crate::rpc::wire::ActionMessage;
use crate::state::ClusterRuntimeState;
use std::sync::Arc;

/// `failed_primary_id`, when present, names the deposed primary to
/// drop from the proxy map and the reverse-proxy table.
pub async fn become_new_primary(
    state: &ClusterRuntimeState,
    failed_primary_id: Option<&NodeId>,
) -> Result<(), CpError> {
    let self_id = state.self_info.id.clone();
    let failed = failed_primary_id.cloned();

    // Pre-commit: reserves a version gap of 100 for any in-flight
    // metasyncs issued under the deposed primary. `modify` bumps the
    // version by 1 after `pre` returns, so the clone adds only 99 here.
    let published = state
        .smap
        .modify(
            move |s: &mut Smap| {
                if !s.proxies.contains_key(&self_id) {
                    return Err(CpError::Internal(
                        "become_new_primary: self absent from smap clone".to_string(),
                    ));
                }
                if let Some(ref fid) = failed {
                    s.proxies.remove(fid);
                }
                s.primary = self_id.clone();
                s.version += 99;
                Ok(())
            },
            None::<fn(Arc<Smap>)>,
        )
        .await?;

    if let Some(fid) = failed_primary_id {
        state.reverse_proxy_table.remove(fid);
    }
    state.staff_ic();

    // Final: metasync (smap, BMD, RMD) plus config and, if present, EtlMD.
    let mut pairs = vec![
        ActionMessage::new("new-smap", &*published)?,
        ActionMessage::new("new-bmd", &*state.bmd.get())?,
        ActionMessage::new("new-rmd", &*state.rmd.get())?,
        ActionMessage::new("new-config", &*state.config_md.get())?,
    ];
    if let Some(etl) = state.etl_md.get().as_ref() {
        pairs.push(ActionMessage::new("new-etl", etl)?);
    }
    let targets: Vec<_> = published.other_members().into_iter().cloned().collect();
    drop(state.metasync.sync(&targets, pairs));

    state.sync_ic_owners();
    metrics::SMAP_VERSION.set(published.version as f64);
    metrics::IS_PRIMARY.set(1.0);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MetasyncConfig, TimeoutsConfig};
    use crate::node::{NodeInfo, NodeRole};
    use crate::rpc::RpcClient;

    fn state_with_failed_primary() -> (ClusterRuntimeState, NodeId) {
        let self_info = NodeInfo::new(
            NodeId::from("p2"),
            NodeRole::Proxy,
            "http://p2.invalid".to_string(),
            "http://p2.invalid".to_string(),
        );
        let rpc = RpcClient::new(
            self_info.id.clone(),
            &TimeoutsConfig {
                cplane_operation_ms: 500,
                max_keepalive_ms: 500,
            },
        );
        let state = ClusterRuntimeState::new(
            self_info,
            "U1".to_string(),
            rpc,
            MetasyncConfig {
                max_retries: 0,
                retry_backoff_ms: 1,
                queue_depth: 8,
            },
            3,
        );
        let failed_id = NodeId::from("p1");
        (state, failed_id)
    }

    #[tokio::test]
    async fn become_new_primary_bumps_version_by_100() {
        let (state, failed_id) = state_with_failed_primary();
        // `self_info` is already a proxy member from `Smap::new`.
        let before = state.smap.get().version;

        become_new_primary(&state, Some(&failed_id)).await.unwrap();

        let after = state.smap.get();
        assert_eq!(after.version, before + 100);
        assert!(after.is_primary(&state.self_info.id));
    }

    #[tokio::test]
    async fn become_new_primary_drops_failed_primary_from_proxy_map_and_rproxy_table() {
        let (state, failed_id) = state_with_failed_primary();
        let failed_info = NodeInfo::new(
            failed_id.clone(),
            NodeRole::Proxy,
            "http://p1.invalid".to_string(),
            "http://p1.invalid".to_string(),
        );
        state
            .smap
            .modify(
                move |s| {
                    s.proxies.insert(failed_info.id.clone(), failed_info.clone());
                    Ok(())
                },
                None::<fn(Arc<Smap>)>,
            )
            .await
            .unwrap();
        state.reverse_proxy_table.insert(failed_id.clone(), ());

        become_new_primary(&state, Some(&failed_id)).await.unwrap();

        assert!(state.smap.get().get_node(&failed_id).is_none());
        assert!(!state.reverse_proxy_table.contains_key(&failed_id));
    }
}
