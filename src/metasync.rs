// src/metasync.rs

//! The metasync engine: reliably delivers batches of versioned
//! metadata revisions to every known node, with per-node ordering
//! guarantees, via one long-lived delivery task per peer fed by a
//! single unbounded, strictly-FIFO staging channel — there is exactly
//! one hand-off path from `sync()` to the worker, so delivery order is
//! always submission order, even when a node is backed up.

use crate::config::MetasyncConfig;
use crate::node::{NodeId, NodeInfo};
use crate::rpc::wire::ActionMessage;
use crate::rpc::RpcClient;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

struct Job {
    pairs: Vec<ActionMessage>,
    done: oneshot::Sender<Result<(), crate::errors::CpError>>,
}

/// One per-node delivery worker's sending half, plus a depth counter so
/// a backed-up node can be logged without ever refusing or reordering
/// a submission.
struct Worker {
    tx: mpsc::UnboundedSender<Job>,
    backlog: Arc<AtomicUsize>,
}

impl Clone for Worker {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            backlog: self.backlog.clone(),
        }
    }
}

/// A waitable handle over one `sync()` call's per-node deliveries.
pub struct CompletionHandle {
    receivers: Vec<oneshot::Receiver<Result<(), crate::errors::CpError>>>,
}

impl CompletionHandle {
    /// Awaits every node's outcome. Callers that don't care may drop
    /// the handle instead and let delivery continue in the background.
    pub async fn wait(self) -> Vec<Result<(), crate::errors::CpError>> {
        let mut out = Vec::with_capacity(self.receivers.len());
        for rx in self.receivers {
            out.push(
                rx.await
                    .unwrap_or_else(|_| Err(crate::errors::CpError::Internal(
                        "metasync worker task was dropped".to_string(),
                    ))),
            );
        }
        out
    }
}

pub struct MetasyncEngine {
    rpc: RpcClient,
    workers: DashMap<NodeId, Worker>,
    is_primary: Arc<AtomicBool>,
    config: MetasyncConfig,
}

impl MetasyncEngine {
    pub fn new(rpc: RpcClient, config: MetasyncConfig) -> Self {
        Self {
            rpc,
            workers: DashMap::new(),
            is_primary: Arc::new(AtomicBool::new(true)),
            config,
        }
    }

    fn worker_for(&self, node: &NodeInfo) -> Worker {
        if let Some(w) = self.workers.get(&node.id) {
            return w.clone();
        }
        // Unbounded: the single ordered staging buffer a submission is
        // pushed onto. `send` is synchronous and never fails to enqueue
        // under backpressure, so call order is always delivery order —
        // there is no full-queue case that would need a second, racing
        // hand-off path.
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let backlog = Arc::new(AtomicUsize::new(0));
        let worker = Worker { tx, backlog: backlog.clone() };
        self.workers.insert(node.id.clone(), worker.clone());

        let rpc = self.rpc.clone();
        let url = node.preferred_url().unwrap_or_default().to_string();
        let node_id = node.id.clone();
        let max_retries = self.config.max_retries;
        let backoff = Duration::from_millis(self.config.retry_backoff_ms);
        let queue_depth = self.config.queue_depth;
        let is_primary = self.is_primary.clone();

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let depth = backlog.fetch_sub(1, Ordering::SeqCst) - 1;
                if depth >= queue_depth {
                    warn!(node = %node_id, depth, queue_depth, "metasync: per-node backlog exceeds configured depth");
                }
                if !is_primary.load(Ordering::SeqCst) {
                    let _ = job.done.send(Err(crate::errors::CpError::Internal(
                        "metasync: no longer primary".to_string(),
                    )));
                    continue;
                }
                let mut failure = None;
                for msg in &job.pairs {
                    let mut attempt = 0u32;
                    loop {
                        match rpc.push_metasync(&url, msg).await {
                            Ok(()) => break,
                            Err(e) => {
                                attempt += 1;
                                if attempt > max_retries {
                                    warn!(node = %node_id, action = %msg.action, error = %e, "metasync delivery exhausted retries");
                                    crate::metrics::METASYNC_DELIVERY_FAILURES_TOTAL.inc();
                                    failure = Some(e);
                                    break;
                                }
                                tokio::time::sleep(backoff).await;
                            }
                        }
                    }
                    if failure.is_some() {
                        break;
                    }
                }
                let _ = job.done.send(match failure {
                    Some(e) => Err(e),
                    None => Ok(()),
                });
            }
        });

        worker
    }

    /// Delivers `pairs` atomically, per-node, to every node in `targets`.
    /// Never blocks the caller: the push onto each node's ordered
    /// staging buffer is synchronous and infallible except when that
    /// node's worker has torn down, so call order is always delivery
    /// order — there is no second, unordered hand-off path.
    pub fn sync(&self, targets: &[NodeInfo], pairs: Vec<ActionMessage>) -> CompletionHandle {
        let mut receivers = Vec::with_capacity(targets.len());
        for node in targets {
            let worker = self.worker_for(node);
            let (done_tx, done_rx) = oneshot::channel();
            let job = Job {
                pairs: pairs.clone(),
                done: done_tx,
            };
            worker.backlog.fetch_add(1, Ordering::SeqCst);
            if let Err(mpsc::error::SendError(job)) = worker.tx.send(job) {
                worker.backlog.fetch_sub(1, Ordering::SeqCst);
                let _ = job.done.send(Err(crate::errors::CpError::Internal(
                    "metasync worker channel closed".to_string(),
                )));
            }
            receivers.push(done_rx);
        }
        CompletionHandle { receivers }
    }

    /// Idempotent: informs the engine the local node is no longer
    /// authoritative, so in-flight and future jobs fail fast instead of
    /// initiating new metasyncs.
    pub fn become_non_primary(&self) {
        self.is_primary.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeRole};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn timeouts() -> crate::config::TimeoutsConfig {
        crate::config::TimeoutsConfig {
            cplane_operation_ms: 500,
            max_keepalive_ms: 500,
        }
    }

    fn metasync_config() -> MetasyncConfig {
        MetasyncConfig {
            max_retries: 1,
            retry_backoff_ms: 1,
            queue_depth: 8,
        }
    }

    #[tokio::test]
    async fn sync_delivers_to_every_target_and_completes() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/daemon/metasync"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let node = NodeInfo::new(
            NodeId::from("t1"),
            NodeRole::Target,
            server.uri(),
            server.uri(),
        );
        let rpc = RpcClient::new(NodeId::from("self"), &timeouts());
        let engine = MetasyncEngine::new(rpc, metasync_config());

        let handle = engine.sync(
            &[node],
            vec![ActionMessage::new("noop", serde_json::json!({})).unwrap()],
        );
        let results = handle.wait().await;
        assert_eq!(results.len(), 1);
        assert!(results[0].is_ok());
    }

    #[tokio::test]
    async fn become_non_primary_fails_subsequent_jobs() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/daemon/metasync"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let node = NodeInfo::new(
            NodeId::from("t1"),
            NodeRole::Target,
            server.uri(),
            server.uri(),
        );
        let rpc = RpcClient::new(NodeId::from("self"), &timeouts());
        let engine = MetasyncEngine::new(rpc, metasync_config());
        engine.become_non_primary();

        let handle = engine.sync(
            &[node],
            vec![ActionMessage::new("noop", serde_json::json!({})).unwrap()],
        );
        let results = handle.wait().await;
        assert!(results[0].is_err());
    }
}
