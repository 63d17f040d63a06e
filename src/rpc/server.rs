// src/rpc/server.rs

//! The inbound HTTP surface: an `axum::Router` wiring every path in the
//! wire protocol to the matching `controller` function.

use crate::controller::{admin, follower, regular};
use crate::errors::CpError;
use crate::meta::clumeta::{CluMeta, FillOpts};
use crate::meta::EtlMd;
use crate::node::NodeId;
use crate::rpc::wire::{self, ActionMessage};
use crate::state::ClusterRuntimeState;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;

pub fn build_router(state: Arc<ClusterRuntimeState>) -> Router {
    Router::new()
        .route(
            &format!("{}/{{id}}", wire::PATH_CLUSTER_PROXY_PREFIX),
            put(put_cluster_proxy),
        )
        .route(
            &format!("{}/{{id}}", wire::PATH_DAEMON_PROXY_PREFIX),
            put(put_daemon_proxy),
        )
        .route(wire::PATH_DAEMON_FORCE_JOIN, post(post_daemon_force_join))
        .route(wire::PATH_DAEMON, get(get_daemon))
        .route(wire::PATH_CLUSTER, put(put_cluster))
        .route(wire::PATH_DAEMON_METASYNC, put(put_daemon_metasync))
        .with_state(state)
}

fn caller_id(headers: &HeaderMap) -> Result<NodeId, CpError> {
    headers
        .get(wire::HDR_CALLER_ID)
        .and_then(|v| v.to_str().ok())
        .map(NodeId::from)
        .ok_or_else(|| CpError::InvalidCluMeta("missing caller-id header".to_string()))
}

#[derive(Debug, Deserialize)]
struct WhatQuery {
    what: Option<String>,
}

/// `GET /daemon?what=smap|smap-vote` — this node's own smap, or the
/// full cluMeta bundle, as requested.
async fn get_daemon(
    State(state): State<Arc<ClusterRuntimeState>>,
    Query(q): Query<WhatQuery>,
) -> Result<Json<serde_json::Value>, CpError> {
    match q.what.as_deref() {
        Some(wire::WHAT_SMAP_VOTE) => {
            let cm = CluMeta::fill(
                &state.smap,
                &state.bmd,
                &state.rmd,
                &state.config_md,
                &state.etl_md,
                FillOpts::default(),
            );
            Ok(Json(serde_json::to_value(cm)?))
        }
        _ => Ok(Json(serde_json::to_value(&*state.smap.get())?)),
    }
}

#[derive(Debug, Deserialize)]
struct SetPrimaryQuery {
    force: Option<bool>,
    #[serde(rename = "primary-candidate-url")]
    primary_candidate_url: Option<String>,
}

/// `PUT /cluster/proxy/{id}?force=&primary-candidate-url=` — the
/// operator-facing entry point, handled only by the current primary.
async fn put_cluster_proxy(
    State(state): State<Arc<ClusterRuntimeState>>,
    Path(id): Path<String>,
    Query(q): Query<SetPrimaryQuery>,
) -> Result<StatusCode, CpError> {
    let npid = NodeId::from(id);
    regular::set_primary(
        &state,
        &npid,
        q.force.unwrap_or(false),
        q.primary_candidate_url.as_deref(),
    )
    .await?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
struct PrepareQuery {
    prepare: Option<bool>,
}

/// `PUT /daemon/proxy/{id}?prepare=` — `daeSetPrimary`'s prepare/commit
/// halves (4.E.6), received by every follower during a regular handoff.
async fn put_daemon_proxy(
    State(state): State<Arc<ClusterRuntimeState>>,
    Path(id): Path<String>,
    Query(q): Query<PrepareQuery>,
    body: Option<Json<CluMeta>>,
) -> Result<StatusCode, CpError> {
    let npid = NodeId::from(id);
    if q.prepare.unwrap_or(false) {
        let Json(cm) = body.ok_or_else(|| CpError::InvalidCluMeta("prepare: missing body".to_string()))?;
        follower::dae_set_primary_prepare(&cm)?;
    } else {
        follower::dae_set_primary_commit(&state, &npid, None).await?;
    }
    Ok(StatusCode::OK)
}

/// `POST /daemon/force-join?prepare=` — 4.E.4 prepare / 4.E.5 commit.
async fn post_daemon_force_join(
    State(state): State<Arc<ClusterRuntimeState>>,
    Query(q): Query<PrepareQuery>,
    headers: HeaderMap,
    Json(msg): Json<ActionMessage>,
) -> Result<StatusCode, CpError> {
    if q.prepare.unwrap_or(false) {
        let caller = caller_id(&headers)?;
        let nsmap = msg.value_as()?;
        follower::prep_force_join(&state, &caller, &nsmap).await?;
    } else {
        let ncm = msg.value_as()?;
        follower::commit_force_join(&state, &ncm).await?;
    }
    Ok(StatusCode::OK)
}

/// `PUT /cluster` — the two cluster-admin actions, `bump-metasync`
/// (force-join step 10) and `self-join`, keyed on `action`.
async fn put_cluster(
    State(state): State<Arc<ClusterRuntimeState>>,
    Json(msg): Json<ActionMessage>,
) -> Result<StatusCode, CpError> {
    match msg.action.as_str() {
        wire::ACT_BUMP_METASYNC => admin::bump_metasync_all(&state).await?,
        "self-join" => admin::self_join_handler(&state, msg.value_as()?).await?,
        other => return Err(CpError::Internal(format!("unknown cluster action: {other}"))),
    }
    Ok(StatusCode::OK)
}

/// `PUT /daemon/metasync` — one routine metasync delivery.
async fn put_daemon_metasync(
    State(state): State<Arc<ClusterRuntimeState>>,
    Json(msg): Json<ActionMessage>,
) -> Result<StatusCode, CpError> {
    match msg.action.as_str() {
        "new-smap" | "restore-smap" => state.smap.install(msg.value_as()?),
        "new-bmd" | "restore-bmd" => state.bmd.install(msg.value_as()?),
        "new-rmd" | "restore-rmd" => state.rmd.install(msg.value_as()?),
        "new-config" | "restore-config" => state.config_md.install(msg.value_as()?),
        "new-etl" => state.etl_md.install(Some(msg.value_as::<EtlMd>()?)),
        other => return Err(CpError::Internal(format!("unknown metasync action: {other}"))),
    }
    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MetasyncConfig, TimeoutsConfig};
    use crate::node::{NodeInfo, NodeRole};
    use crate::rpc::RpcClient;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn router() -> Router {
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
        let state = Arc::new(ClusterRuntimeState::new(
            self_info,
            "U1".to_string(),
            rpc,
            MetasyncConfig {
                max_retries: 0,
                retry_backoff_ms: 1,
                queue_depth: 8,
            },
            3,
        ));
        build_router(state)
    }

    #[tokio::test]
    async fn get_daemon_default_returns_smap() {
        let response = router()
            .oneshot(Request::builder().uri("/daemon").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn get_daemon_smap_vote_returns_clumeta_bundle() {
        let response = router()
            .oneshot(
                Request::builder()
                    .uri("/daemon?what=smap-vote")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn put_cluster_rejects_unknown_action() {
        let body = serde_json::to_vec(&ActionMessage::new("bogus", serde_json::Value::Null).unwrap()).unwrap();
        let response = router()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/cluster")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
