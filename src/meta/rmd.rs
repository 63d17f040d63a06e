// src/meta/rmd.rs

//! The rebalance map (RMD): a version plus the target-set snapshot
//! used to order rebalance operations. Rebalance itself is out of
//! scope; this crate only carries the document.

use crate::meta::owner::VersionedDoc;
use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rmd {
    pub version: u64,
    pub target_set: BTreeSet<NodeId>,
}

impl VersionedDoc for Rmd {
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl Rmd {
    pub fn new() -> Self {
        Self {
            version: 1,
            target_set: BTreeSet::new(),
        }
    }
}

impl Default for Rmd {
    fn default() -> Self {
        Self::new()
    }
}
