// src/rpc/client.rs

//! Outbound control-plane RPCs. One `reqwest::Client` per node process,
//! configured from `TimeoutsConfig`.

use crate::config::TimeoutsConfig;
use crate::errors::CpError;
use crate::meta::clumeta::CluMeta;
use crate::meta::Smap;
use crate::node::{NodeId, NodeInfo};
use crate::rpc::wire::*;
use std::time::Duration;

#[derive(Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    self_id: NodeId,
    cplane_timeout: Duration,
    keepalive_timeout: Duration,
}

impl RpcClient {
    pub fn new(self_id: NodeId, timeouts: &TimeoutsConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            self_id,
            cplane_timeout: Duration::from_millis(timeouts.cplane_operation_ms),
            keepalive_timeout: Duration::from_millis(timeouts.max_keepalive_ms),
        }
    }

    fn caller_header(&self) -> (&'static str, String) {
        (HDR_CALLER_ID, self.self_id.to_string())
    }

    /// `GET {base}/daemon?what=smap` — plain smap fetch (force-join step 2).
    pub async fn fetch_smap(&self, base_url: &str) -> Result<Smap, CpError> {
        let resp = self
            .http
            .get(format!("{base_url}{PATH_DAEMON}"))
            .query(&[(QPARAM_WHAT, WHAT_SMAP)])
            .timeout(self.cplane_timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json::<Smap>().await?)
    }

    /// `GET {base}/daemon?what=smap-vote` — full cluMeta fetch (force-join
    /// step 4), carrying the caller's own view of the destination smap as
    /// a hint header so the callee can short-circuit disagreement early.
    pub async fn fetch_clumeta(&self, base_url: &str, hint_smap: &Smap) -> Result<CluMeta, CpError> {
        let hint = serde_json::to_string(hint_smap)?;
        let resp = self
            .http
            .get(format!("{base_url}{PATH_DAEMON}"))
            .query(&[(QPARAM_WHAT, WHAT_SMAP_VOTE)])
            .header("hint-smap", hint)
            .header(self.caller_header().0, self.caller_header().1)
            .timeout(self.keepalive_timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json::<CluMeta>().await?)
    }

    /// `PUT {base}/daemon/proxy/{npid}?prepare=true`, body = cluMeta
    /// (minus prime-time). Regular handoff step 1.
    pub async fn set_primary_prepare(
        &self,
        base_url: &str,
        npid: &NodeId,
        cm: &CluMeta,
    ) -> Result<(), CpError> {
        self.http
            .put(format!("{base_url}{PATH_DAEMON_PROXY_PREFIX}/{npid}"))
            .query(&[(QPARAM_PREPARE, "true")])
            .header(self.caller_header().0, self.caller_header().1)
            .json(cm)
            .timeout(self.cplane_timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// `PUT {base}/daemon/proxy/{npid}?prepare=false`, no body. Regular
    /// handoff step 3.
    pub async fn set_primary_commit(&self, base_url: &str, npid: &NodeId) -> Result<(), CpError> {
        self.http
            .put(format!("{base_url}{PATH_DAEMON_PROXY_PREFIX}/{npid}"))
            .query(&[(QPARAM_PREPARE, "false")])
            .header(self.caller_header().0, self.caller_header().1)
            .timeout(self.cplane_timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// `POST {base}/daemon/force-join?prepare=true`. Force-join step 6.
    pub async fn force_join_prepare(&self, base_url: &str, msg: &ActionMessage) -> Result<(), CpError> {
        self.http
            .post(format!("{base_url}{PATH_DAEMON_FORCE_JOIN}"))
            .query(&[(QPARAM_PREPARE, "true")])
            .header(self.caller_header().0, self.caller_header().1)
            .json(msg)
            .timeout(self.cplane_timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// `POST {base}/daemon/force-join?prepare=false`. Force-join step 9,
    /// the point-of-no-return.
    pub async fn force_join_commit(&self, base_url: &str, msg: &ActionMessage) -> Result<(), CpError> {
        self.http
            .post(format!("{base_url}{PATH_DAEMON_FORCE_JOIN}"))
            .query(&[(QPARAM_PREPARE, "false")])
            .header(self.caller_header().0, self.caller_header().1)
            .json(msg)
            .timeout(self.cplane_timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// `PUT {base}/cluster`, body = `{action: "bump-metasync"}`. Force-join
    /// step 10.
    pub async fn bump_metasync(&self, base_url: &str) -> Result<(), CpError> {
        self.http
            .put(format!("{base_url}{PATH_CLUSTER}"))
            .header(self.caller_header().0, self.caller_header().1)
            .json(&ActionMessage::bump_metasync())
            .timeout(self.keepalive_timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// `PUT {base}/cluster`, body = `{action: "self-join", value: self}` —
    /// a PUT to the same cluster-admin path `bump-metasync` uses, since
    /// both are cluster-wide administrative actions routed through one
    /// handler keyed on `action`.
    pub async fn self_join(&self, base_url: &str, info: &NodeInfo) -> Result<(), CpError> {
        let msg = ActionMessage::new("self-join", info)?;
        self.http
            .put(format!("{base_url}{PATH_CLUSTER}"))
            .header(self.caller_header().0, self.caller_header().1)
            .json(&msg)
            .timeout(self.cplane_timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// `GET {base}/daemon?what=smap` used as a lightweight reachability
    /// probe.
    pub async fn health_probe(&self, base_url: &str) -> Result<(), CpError> {
        self.http
            .get(format!("{base_url}{PATH_DAEMON}"))
            .query(&[(QPARAM_WHAT, WHAT_SMAP)])
            .timeout(self.keepalive_timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// `PUT {base}/daemon/metasync`, body = action-message carrying one
    /// routine metadata push from the metasync engine's per-node delivery.
    pub async fn push_metasync(&self, base_url: &str, msg: &ActionMessage) -> Result<(), CpError> {
        self.http
            .put(format!("{base_url}{PATH_DAEMON_METASYNC}"))
            .header(self.caller_header().0, self.caller_header().1)
            .json(msg)
            .timeout(self.cplane_timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
