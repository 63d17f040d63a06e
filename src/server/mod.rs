// src/server/mod.rs

//! Bootstraps the control-plane HTTP listener and, alongside it, the
//! Prometheus `/metrics` endpoint on its own port.

use crate::config::Config;
use crate::node::{NodeId, NodeInfo, NodeRole};
use crate::rpc::{server as rpc_server, RpcClient};
use crate::state::ClusterRuntimeState;
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

mod metrics_server;

/// Builds the runtime state for this process from its loaded config and
/// starts both the control-plane listener and the metrics listener,
/// running until either is interrupted.
pub async fn run(config: Config) -> Result<()> {
    let role = match config.node.role.as_str() {
        "target" => NodeRole::Target,
        _ => NodeRole::Proxy,
    };
    let self_info = NodeInfo::new(
        NodeId::generate(),
        role,
        config.node.control_url.clone(),
        config.node.public_url.clone(),
    );
    let rpc = RpcClient::new(self_info.id.clone(), &config.timeouts);
    let uuid = uuid::Uuid::new_v4().to_string();
    let state = Arc::new(ClusterRuntimeState::new(
        self_info,
        uuid,
        rpc,
        config.metasync.clone(),
        config.information_council.size,
    ));

    let app = rpc_server::build_router(state.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], config.node.port));
    info!(%addr, "control plane listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let metrics_enabled = config.metrics.enabled;
    let metrics_port = config.metrics.port;

    tokio::select! {
        res = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()) => {
            res?;
        }
        _ = metrics_server::run(metrics_port), if metrics_enabled => {}
    }

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
