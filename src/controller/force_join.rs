// src/controller/force_join.rs

//! The ten-step force-join / split-brain merge protocol, restructured
//! around `CpError` and async RPCs instead of early-return-with-error-string.

use crate::broadcast::{fan_out, first_error, BroadcastTarget};
use crate::errors::CpError;
use crate::meta::clumeta::{CluMeta, FillOpts};
use crate::metrics;
use crate::node::NodeId;
use crate::rpc::wire::{force_join_commit_msg, force_join_prepare_msg};
use crate::state::ClusterRuntimeState;
use std::time::Duration;
use tracing::{error, warn};

/// Fetches `nurl`'s smap, falling back to `fallback_url` (the
/// candidate's other network) if the first attempt fails and the two
/// URLs differ.
async fn fetch_smap_with_fallback(
    state: &ClusterRuntimeState,
    nurl: &str,
    fallback_url: Option<&str>,
) -> Result<crate::meta::Smap, CpError> {
    match state.rpc.fetch_smap(nurl).await {
        Ok(s) => Ok(s),
        Err(e) => match fallback_url {
            Some(alt) if alt != nurl => state
                .rpc
                .fetch_smap(alt)
                .await
                .map_err(|_| CpError::at_stage("fetch-destination-smap", e)),
            _ => Err(CpError::at_stage("fetch-destination-smap", e)),
        },
    }
}

/// Step 1 + dispatch: resolves `nurl` for `npid`, validating args.
fn resolve_destination_url(
    state: &ClusterRuntimeState,
    npid: &NodeId,
    primary_candidate_url: Option<&str>,
) -> Result<(String, Option<crate::node::NodeInfo>), CpError> {
    let local_smap = state.smap.get();
    let psi = local_smap.get_proxy(npid).cloned();
    if psi.is_none() && primary_candidate_url.is_none() {
        return Err(CpError::NodeNotFound { id: npid.clone() });
    }
    let nurl = match primary_candidate_url {
        Some(u) if !u.is_empty() => u.to_string(),
        _ => psi
            .as_ref()
            .and_then(|p| p.preferred_url())
            .unwrap_or_default()
            .to_string(),
    };
    if nurl.is_empty() {
        return Err(CpError::Internal(format!(
            "cannot force-join to {npid}: missing destination URL"
        )));
    }
    Ok((nurl, psi))
}

/// The full 10-step sequence. `npid`/`primary_candidate_url` come from
/// the operator's `PUT /cluster/proxy/{id}?force=true&primary-candidate-url=...`.
pub async fn force_join(
    state: &ClusterRuntimeState,
    npid: &NodeId,
    primary_candidate_url: Option<&str>,
) -> Result<(), CpError> {
    // 1. Validate args.
    if npid == &state.self_info.id {
        return Ok(());
    }
    let (nurl, psi) = resolve_destination_url(state, npid, primary_candidate_url)?;
    let local_smap = state.smap.get();

    // 2. Fetch destination smap.
    let fallback = psi
        .as_ref()
        .filter(|p| p.public_url != p.control_url)
        .map(|p| p.public_url.clone());
    let nsmap = fetch_smap_with_fallback(state, &nurl, fallback.as_deref()).await?;
    let npsi_remote = nsmap
        .primary_info()
        .cloned()
        .ok_or_else(|| CpError::InvalidSmap("destination smap has no primary entry".to_string()))?;

    if nurl != npsi_remote.control_url && nurl != npsi_remote.public_url {
        let reachable = state.rpc.fetch_smap(&npsi_remote.control_url).await.is_ok()
            || state.rpc.fetch_smap(&npsi_remote.public_url).await.is_ok();
        if !reachable {
            return Err(CpError::Unreachable(format!(
                "destination primary {npid} unreachable via either known URL"
            )));
        }
    }
    if nsmap.primary != *npid {
        return Err(CpError::Internal(format!(
            "according to the destination, {npid} is not _the_ primary"
        )));
    }
    npsi_remote.eligible_for_primary()?;

    // 3. Log intent: split-brain (same UUID) vs cross-cluster merge.
    if local_smap.uuid == nsmap.uuid {
        warn!(uuid = %local_smap.uuid, dest = %nsmap.uuid, %npid, "force-join: split-brain merge, same cluster UUID");
    } else {
        warn!(self_uuid = %local_smap.uuid, dest_uuid = %nsmap.uuid, %npid, "force-join: merging into a different cluster");
    }

    // 4. Fetch destination cluMeta.
    let ncm = state
        .rpc
        .fetch_clumeta(&nurl, &nsmap)
        .await
        .map_err(|e| CpError::at_stage("fetch-destination-clumeta", e))?;
    ncm.validate()
        .map_err(|e| CpError::at_stage("fetch-destination-clumeta", e))?;

    // 5. Backup local cluMeta.
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
    cm.validate()
        .map_err(|e| CpError::at_stage("backup-local-clumeta", e))?;

    // 6. Prepare-broadcast to every other local node (self already knows
    // npsi is reachable — it just fetched nsmap directly from it in
    // step 2 — so it does not need to RPC itself to re-confirm that).
    let prepare_msg = force_join_prepare_msg(&nsmap)?;
    let all_local: Vec<_> = local_smap.other_members().into_iter().cloned().collect();
    let all_target = BroadcastTarget::AllNodes(all_local);
    let prepare_results = fan_out(&all_target, |node| {
        let rpc = state.rpc.clone();
        let url = node.preferred_url().unwrap_or_default().to_string();
        let msg = prepare_msg.clone();
        async move { rpc.force_join_prepare(&url, &msg).await }
    })
    .await;
    if let Some((id, err)) = first_error(&prepare_results) {
        metrics::FORCE_JOIN_ROLLBACK_TOTAL.inc();
        return Err(CpError::at_stage(&format!("prepare-broadcast (node {id})"), err));
    }

    // 7. Install ncm locally: Config, BMD, RMD, smap. Rollback #1 on a
    // Config-install failure restores `cm` to every node; at this point
    // no local document has been replaced yet.
    if let Err(e) = ncm.config.validate() {
        metrics::FORCE_JOIN_ROLLBACK_TOTAL.inc();
        let pairs = vec![
            crate::rpc::wire::ActionMessage::new("restore-config", &cm.config)?,
            crate::rpc::wire::ActionMessage::new("restore-bmd", &cm.bmd)?,
            crate::rpc::wire::ActionMessage::new("restore-rmd", &cm.rmd)?,
        ];
        state.metasync.sync(all_target.nodes(), pairs);
        return Err(CpError::at_stage("install-clumeta(config)", e));
    }
    ncm.install(&state.smap, &state.bmd, &state.rmd, &state.config_md, &state.etl_md);

    // 8. Self-register with npsi: up to 3 attempts, alternating URLs.
    // Rollback #2 on terminal failure restores Config/smap/BMD/RMD.
    let (first_url, second_url) = npsi_remote.join_urls(&npsi_remote.control_url);
    let mut joined = false;
    for attempt in 0..3usize {
        let url = if attempt % 2 == 0 { &first_url } else { &second_url };
        if state.rpc.self_join(url, &state.self_info).await.is_ok() {
            joined = true;
            break;
        }
    }
    if !joined {
        metrics::FORCE_JOIN_ROLLBACK_TOTAL.inc();
        if let Some(ref backup_smap) = cm.smap {
            state.smap.install(backup_smap.clone());
        }
        state.bmd.install(cm.bmd.clone());
        state.rmd.install(cm.rmd.clone());
        state.config_md.install(cm.config.clone());
        return Err(CpError::at_stage(
            "self-join",
            CpError::Unreachable(format!("could not self-register with {npid}")),
        ));
    }

    // 9. Commit-broadcast to the original member set. Point-of-no-return:
    // a failure here is logged, not rolled back (see DESIGN.md for why
    // no rollback is attempted at this stage).
    let commit_msg = force_join_commit_msg(&ncm)?;
    let original_members: Vec<_> = local_smap.other_members().into_iter().cloned().collect();
    let original_target = BroadcastTarget::SelectedNodes(original_members);
    let commit_results = fan_out(&original_target, |node| {
        let rpc = state.rpc.clone();
        let url = node.preferred_url().unwrap_or_default().to_string();
        let msg = commit_msg.clone();
        async move { rpc.force_join_commit(&url, &msg).await }
    })
    .await;
    if let Some((id, err)) = first_error(&commit_results) {
        error!(node = %id, error = %err, "force-join: commit-broadcast failed past the point-of-no-return");
    }

    // 10. become_non_primary, brief drain sleep, bump-metasync.
    state.metasync.become_non_primary();
    tokio::time::sleep(Duration::from_secs(1)).await;
    if state.rpc.bump_metasync(&npsi_remote.control_url).await.is_err() {
        if let Err(e) = state.rpc.bump_metasync(&npsi_remote.public_url).await {
            warn!(error = %e, "force-join: bump-metasync failed on both URLs; merge is committed regardless");
        }
    }

    metrics::FORCE_JOIN_SUCCESS_TOTAL.inc();
    metrics::SMAP_VERSION.set(state.smap.get().version as f64);
    metrics::IS_PRIMARY.set(0.0);
    Ok(())
}
