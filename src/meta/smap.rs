// src/meta/smap.rs

//! The cluster map (smap): a versioned set of proxies and targets plus
//! the distinguished primary.

use crate::errors::CpError;
use crate::meta::owner::VersionedDoc;
use crate::node::{NodeId, NodeInfo, NodeRole};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Smap {
    /// Stable per cluster lineage. Two smaps with different UUIDs are
    /// distinct lineages, mergeable only via force-join.
    pub uuid: String,
    pub version: u64,
    pub proxies: BTreeMap<NodeId, NodeInfo>,
    pub targets: BTreeMap<NodeId, NodeInfo>,
    pub primary: NodeId,
}

impl VersionedDoc for Smap {
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl Smap {
    pub fn new(uuid: String, primary: NodeInfo) -> Self {
        let mut proxies = BTreeMap::new();
        let primary_id = primary.id.clone();
        proxies.insert(primary_id.clone(), primary);
        Self {
            uuid,
            version: 1,
            proxies,
            targets: BTreeMap::new(),
            primary: primary_id,
        }
    }

    /// Confirms this smap's internal invariants (cross-smap properties
    /// like cluster-lineage compatibility are checked by the force-join
    /// controller, not here).
    pub fn validate(&self) -> Result<(), CpError> {
        if self.uuid.is_empty() {
            return Err(CpError::InvalidSmap("empty UUID".to_string()));
        }
        if !self.proxies.contains_key(&self.primary) {
            return Err(CpError::InvalidSmap(format!(
                "primary {} is not a member of the proxy map",
                self.primary
            )));
        }
        for (id, info) in self.proxies.iter() {
            if info.role != NodeRole::Proxy {
                return Err(CpError::InvalidSmap(format!(
                    "node {id} listed as proxy but has role {}",
                    info.role
                )));
            }
        }
        for (id, info) in self.targets.iter() {
            if info.role != NodeRole::Target {
                return Err(CpError::InvalidSmap(format!(
                    "node {id} listed as target but has role {}",
                    info.role
                )));
            }
        }
        Ok(())
    }

    pub fn is_primary(&self, id: &NodeId) -> bool {
        &self.primary == id
    }

    pub fn primary_info(&self) -> Option<&NodeInfo> {
        self.proxies.get(&self.primary)
    }

    pub fn get_proxy(&self, id: &NodeId) -> Option<&NodeInfo> {
        self.proxies.get(id)
    }

    pub fn get_target(&self, id: &NodeId) -> Option<&NodeInfo> {
        self.targets.get(id)
    }

    pub fn get_node(&self, id: &NodeId) -> Option<&NodeInfo> {
        self.get_proxy(id).or_else(|| self.get_target(id))
    }

    pub fn count_proxies(&self) -> usize {
        self.proxies.len()
    }

    pub fn count_targets(&self) -> usize {
        self.targets.len()
    }

    pub fn count_active_proxies(&self) -> usize {
        self.proxies
            .values()
            .filter(|n| !n.in_maint_or_decomm())
            .count()
    }

    pub fn count_active_targets(&self) -> usize {
        self.targets
            .values()
            .filter(|n| !n.in_maint_or_decomm())
            .count()
    }

    /// All non-primary nodes (proxies minus self, plus all targets) —
    /// the member set a commit broadcast addresses.
    pub fn other_members(&self) -> Vec<&NodeInfo> {
        self.proxies
            .values()
            .filter(|n| n.id != self.primary)
            .chain(self.targets.values())
            .collect()
    }

}
