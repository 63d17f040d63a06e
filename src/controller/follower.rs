// src/controller/follower.rs

//! Follower-side RPC handlers: 4.E.4 `prep_force_join`, 4.E.5
//! `commit_force_join`, and 4.E.6 `dae_set_primary`'s prepare/commit
//! halves.

use crate::errors::CpError;
use crate::meta::clumeta::CluMeta;
use crate::meta::Smap;
use crate::node::NodeId;
use crate::state::ClusterRuntimeState;
use std::sync::Arc;
use tracing::error;

/// 4.E.4: a foreign primary is asking this node to pre-flight-check
/// reachability of its designated new primary before anything changes.
/// Verifies the caller is the node this follower currently considers
/// primary (reusing `NotPrimary`'s 4xx mapping for "caller is not
/// recognized as authoritative over this node").
pub async fn prep_force_join(
    state: &ClusterRuntimeState,
    caller_id: &NodeId,
    nsmap: &Smap,
) -> Result<(), CpError> {
    let local_smap = state.smap.get();
    if caller_id != &local_smap.primary {
        return Err(CpError::NotPrimary);
    }

    let npsi = nsmap
        .primary_info()
        .ok_or_else(|| CpError::InvalidSmap("nsmap carries no primary entry".to_string()))?;

    let first = npsi.preferred_url().unwrap_or_default().to_string();
    if state.rpc.health_probe(&first).await.is_ok() {
        return Ok(());
    }
    if npsi.public_url != first && !npsi.public_url.is_empty()
        && state.rpc.health_probe(&npsi.public_url).await.is_ok()
    {
        return Ok(());
    }
    Err(CpError::Ineligible {
        id: npsi.id.clone(),
        reason: "unreachable during prep-force-join health probe".to_string(),
    })
}

/// 4.E.5: installs the destination cluMeta wholesale, then self-registers
/// with the new primary. A terminal self-join failure is fatal for the
/// follower: its metadata has already been replaced but it cannot be
/// reached by the new primary, so an operator must intervene.
pub async fn commit_force_join(state: &ClusterRuntimeState, ncm: &CluMeta) -> Result<(), CpError> {
    let nsmap = ncm
        .smap
        .as_ref()
        .ok_or_else(|| CpError::InvalidCluMeta("commit-force-join: missing smap".to_string()))?;
    nsmap
        .validate()
        .map_err(|e| CpError::InvalidCluMeta(format!("smap: {e}")))?;

    ncm.install(&state.smap, &state.bmd, &state.rmd, &state.config_md, &state.etl_md);

    let npsi = nsmap
        .primary_info()
        .ok_or_else(|| CpError::InvalidCluMeta("nsmap carries no primary entry".to_string()))?;

    let (first_url, second_url) = npsi.join_urls(&npsi.control_url);
    let first_attempt = state.rpc.self_join(&first_url, &state.self_info).await;
    let joined = match first_attempt {
        Ok(()) => true,
        Err(_) if second_url != first_url && !second_url.is_empty() => {
            state.rpc.self_join(&second_url, &state.self_info).await.is_ok()
        }
        Err(_) => false,
    };

    if !joined {
        error!(primary = %npsi.id, "commit-force-join: self-register failed after metadata was already replaced");
        std::process::exit(1);
    }
    Ok(())
}

/// 4.E.6 prepare half: accept or reject an inbound cluMeta payload for a
/// regular (non-force) handoff. No local state changes — only validation.
pub fn dae_set_primary_prepare(cm: &CluMeta) -> Result<(), CpError> {
    cm.validate()
}

/// 4.E.6 commit half: if self is the designated new primary and active,
/// become it; otherwise just relabel the local smap's primary pointer.
pub async fn dae_set_primary_commit(
    state: &ClusterRuntimeState,
    npid: &NodeId,
    failed_primary_id: Option<&NodeId>,
) -> Result<(), CpError> {
    if npid == &state.self_info.id && !state.self_info.in_maint_or_decomm() {
        crate::controller::become_primary::become_new_primary(state, failed_primary_id).await
    } else {
        let npid = npid.clone();
        state
            .smap
            .modify(
                move |s: &mut Smap| {
                    s.primary = npid.clone();
                    Ok(())
                },
                None::<fn(Arc<Smap>)>,
            )
            .await?;
        Ok(())
    }
}
