// src/broadcast.rs

//! The fan-out facility that addresses a polymorphic set of nodes and
//! collects per-node results, used by both the controller (prepare/
//! commit broadcasts) and the metasync engine. Modeled as a tagged
//! variant with a subset payload rather than a bare node list, so a
//! caller can distinguish "every node" from "this specific subset".

use crate::errors::CpError;
use crate::node::{NodeId, NodeInfo};
use futures::future::join_all;
use std::future::Future;

/// The set of nodes a broadcast addresses.
#[derive(Debug, Clone)]
pub enum BroadcastTarget {
    AllNodes(Vec<NodeInfo>),
    SelectedNodes(Vec<NodeInfo>),
}

impl BroadcastTarget {
    pub fn nodes(&self) -> &[NodeInfo] {
        match self {
            BroadcastTarget::AllNodes(v) => v,
            BroadcastTarget::SelectedNodes(v) => v,
        }
    }
}

/// One node's outcome from a fan-out call.
pub struct BroadcastResult {
    pub id: NodeId,
    pub result: Result<(), CpError>,
}

/// Issues `f` against every node in `target` concurrently and collects
/// all results before returning — a broadcast never short-circuits on
/// the first error, since the caller (controller or metasync) needs to
/// know exactly which nodes failed.
pub async fn fan_out<F, Fut>(target: &BroadcastTarget, f: F) -> Vec<BroadcastResult>
where
    F: Fn(&NodeInfo) -> Fut,
    Fut: Future<Output = Result<(), CpError>>,
{
    let calls = target.nodes().iter().map(|node| {
        let fut = f(node);
        async move {
            BroadcastResult {
                id: node.id.clone(),
                result: fut.await,
            }
        }
    });
    join_all(calls).await
}

/// True iff every node in the broadcast succeeded.
pub fn all_ok(results: &[BroadcastResult]) -> bool {
    results.iter().all(|r| r.result.is_ok())
}

/// The first failure encountered, if any, paired with the node id.
pub fn first_error(results: &[BroadcastResult]) -> Option<(&NodeId, &CpError)> {
    results
        .iter()
        .find_map(|r| r.result.as_ref().err().map(|e| (&r.id, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeRole;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn node(id: &str) -> NodeInfo {
        NodeInfo::new(
            NodeId::from(id),
            NodeRole::Proxy,
            format!("http://{id}"),
            format!("http://{id}"),
        )
    }

    #[tokio::test]
    async fn fan_out_invokes_every_node() {
        let target = BroadcastTarget::AllNodes(vec![node("a"), node("b"), node("c")]);
        let calls = AtomicUsize::new(0);
        let results = fan_out(&target, |_n| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(all_ok(&results));
    }

    #[tokio::test]
    async fn fan_out_reports_partial_failure_without_short_circuiting() {
        let target = BroadcastTarget::SelectedNodes(vec![node("a"), node("b")]);
        let results = fan_out(&target, |n| {
            let id = n.id.clone();
            async move {
                if id == NodeId::from("b") {
                    Err(CpError::Unreachable("down".to_string()))
                } else {
                    Ok(())
                }
            }
        })
        .await;
        assert_eq!(results.len(), 2);
        assert!(!all_ok(&results));
        let (failing_id, _) = first_error(&results).unwrap();
        assert_eq!(failing_id, &NodeId::from("b"));
    }
}
