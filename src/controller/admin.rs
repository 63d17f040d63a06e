// src/controller/admin.rs

//! The two cluster-admin actions routed through `PUT /cluster`:
//! `bump-metasync` (force-join step 10's request to the new primary)
//! and `self-join` (the join RPC used by both force-join follower paths,
//! realized here alongside it since neither names its own wire path).

use crate::errors::CpError;
use crate::meta::Smap;
use crate::node::NodeInfo;
use crate::rpc::wire::ActionMessage;
use crate::state::ClusterRuntimeState;
use std::sync::Arc;

/// Bumps smap/BMD/RMD by one version each (no content change) and
/// re-metasyncs them to every other node. Distinct from the
/// version-bump-by-100 debug path (see DESIGN.md); this routine path
/// always bumps by exactly 1.
pub async fn bump_metasync_all(state: &ClusterRuntimeState) -> Result<(), CpError> {
    state.smap.modify(|_s: &mut Smap| Ok(()), None::<fn(Arc<Smap>)>).await?;
    state
        .bmd
        .modify(|_b| Ok(()), None::<fn(Arc<crate::meta::Bmd>)>)
        .await?;
    state
        .rmd
        .modify(|_r| Ok(()), None::<fn(Arc<crate::meta::Rmd>)>)
        .await?;

    let smap = state.smap.get();
    let pairs = vec![
        ActionMessage::new("new-smap", &*smap)?,
        ActionMessage::new("new-bmd", &*state.bmd.get())?,
        ActionMessage::new("new-rmd", &*state.rmd.get())?,
    ];
    let targets: Vec<_> = smap.other_members().into_iter().cloned().collect();
    drop(state.metasync.sync(&targets, pairs));
    Ok(())
}

/// Registers a joining node (proxy or target) into the local smap.
pub async fn self_join_handler(state: &ClusterRuntimeState, info: NodeInfo) -> Result<(), CpError> {
    state
        .smap
        .modify(
            move |s: &mut Smap| {
                match info.role {
                    crate::node::NodeRole::Proxy => {
                        s.proxies.insert(info.id.clone(), info.clone());
                    }
                    crate::node::NodeRole::Target => {
                        s.targets.insert(info.id.clone(), info.clone());
                    }
                }
                Ok(())
            },
            None::<fn(Arc<Smap>)>,
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MetasyncConfig, TimeoutsConfig};
    use crate::node::{NodeId, NodeRole};
    use crate::rpc::RpcClient;

    fn fresh_state() -> ClusterRuntimeState {
        let self_info = NodeInfo::new(
            NodeId::from("p1"),
            NodeRole::Proxy,
            "http://p1.invalid".to_string(),
            "http://p1.invalid".to_string(),
        );
        let rpc = RpcClient::new(
            self_info.id.clone(),
            &TimeoutsConfig {
                cplane_operation_ms: 500,
                max_keepalive_ms: 500,
            },
        );
        ClusterRuntimeState::new(
            self_info,
            "U1".to_string(),
            rpc,
            MetasyncConfig {
                max_retries: 0,
                retry_backoff_ms: 1,
                queue_depth: 8,
            },
            3,
        )
    }

    #[tokio::test]
    async fn bump_metasync_all_bumps_each_document_by_one() {
        let state = fresh_state();
        let before_smap = state.smap.get().version;
        let before_bmd = state.bmd.get().version;
        bump_metasync_all(&state).await.unwrap();
        assert_eq!(state.smap.get().version, before_smap + 1);
        assert_eq!(state.bmd.get().version, before_bmd + 1);
    }

    #[tokio::test]
    async fn self_join_handler_registers_a_target() {
        let state = fresh_state();
        let t1 = NodeInfo::new(
            NodeId::from("t1"),
            NodeRole::Target,
            "http://t1.invalid".to_string(),
            "http://t1.invalid".to_string(),
        );
        self_join_handler(&state, t1.clone()).await.unwrap();
        assert!(state.smap.get().get_target(&t1.id).is_some());
    }
}
