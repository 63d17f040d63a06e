// src/state.rs

//! Process-wide runtime state: the five document owners, the metasync
//! engine, the single-flight guard, the reverse-proxy table, and the
//! information-council membership.

use crate::errors::CpError;
use crate::meta::{Bmd, ConfigMd, EtlMd, Owner, Rmd, Smap};
use crate::metasync::MetasyncEngine;
use crate::node::{NodeId, NodeInfo};
use crate::rpc::RpcClient;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// RAII release for the `setting_new_primary` single-flight guard.
/// Dropped on every exit path from the controller — including panics —
/// so a `compare_exchange` acquire is always matched by a release.
pub struct SingleFlightGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for SingleFlightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Everything one proxy process needs to run the controller: the five
/// versioned document owners, the metasync engine, and the ambient
/// single-flight/reverse-proxy/IC bookkeeping around them.
pub struct ClusterRuntimeState {
    pub self_info: NodeInfo,

    pub smap: Owner<Smap>,
    pub bmd: Owner<Bmd>,
    pub rmd: Owner<Rmd>,
    pub config_md: Owner<ConfigMd>,
    pub etl_md: Owner<Option<EtlMd>>,

    pub metasync: MetasyncEngine,
    pub rpc: RpcClient,

    setting_new_primary: Arc<AtomicBool>,

    /// Cleared of an entry when a failed primary is dropped during
    /// `become_new_primary`.
    pub reverse_proxy_table: DashMap<NodeId, ()>,

    /// Small subset of proxies mirroring authoritative metadata for
    /// fast read fan-out ("information council"). Unversioned — there
    /// is no dissemination protocol for this list on its own, so a
    /// plain lock suffices.
    pub ic_members: parking_lot::RwLock<Vec<NodeId>>,
    ic_size: usize,
}

impl ClusterRuntimeState {
    pub fn new(
        self_info: NodeInfo,
        uuid: String,
        rpc: RpcClient,
        metasync_config: crate::config::MetasyncConfig,
        ic_size: usize,
    ) -> Self {
        let smap = Smap::new(uuid.clone(), self_info.clone());
        Self {
            self_info,
            smap: Owner::new(smap),
            bmd: Owner::new(Bmd::new(uuid.clone())),
            rmd: Owner::new(Rmd::new()),
            config_md: Owner::new(ConfigMd::new(uuid)),
            etl_md: Owner::new(None),
            metasync: MetasyncEngine::new(rpc.clone(), metasync_config),
            rpc,
            setting_new_primary: Arc::new(AtomicBool::new(false)),
            reverse_proxy_table: DashMap::new(),
            ic_members: parking_lot::RwLock::new(Vec::new()),
            ic_size,
        }
    }

    pub fn is_primary(&self) -> bool {
        self.smap.get().is_primary(&self.self_info.id)
    }

    /// Acquires the single-flight guard, or `Busy` if one is already
    /// held.
    pub fn acquire_single_flight(&self) -> Result<SingleFlightGuard, CpError> {
        self.setting_new_primary
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| SingleFlightGuard {
                flag: self.setting_new_primary.clone(),
            })
            .map_err(|_| CpError::Busy)
    }

    /// Deterministically picks up to `ic_size` electable proxies
    /// (sorted by id) to staff the information council.
    pub fn staff_ic(&self) {
        let smap = self.smap.get();
        let mut candidates: Vec<NodeId> = smap
            .proxies
            .values()
            .filter(|n| n.eligible_for_primary().is_ok())
            .map(|n| n.id.clone())
            .collect();
        candidates.sort();
        candidates.truncate(self.ic_size);
        *self.ic_members.write() = candidates;
    }

    /// There is no dedicated wire message for an IC-specific sync; this
    /// is an honest no-op recording the handoff rather than inventing a
    /// protocol message that doesn't otherwise exist.
    pub fn sync_ic_owners(&self) {
        tracing::debug!(members = ?self.ic_members.read(), "information council re-staffed");
    }
}
