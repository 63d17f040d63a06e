// src/meta/config_md.rs

//! The cluster-wide configuration document. Not to be confused with
//! this process's own `crate::config::Config`, which is local and
//! loaded from a file; `ConfigMd` is a versioned, disseminated
//! document every node converges on.

use crate::errors::CpError;
use crate::meta::owner::VersionedDoc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigMd {
    pub uuid: String,
    pub version: u64,
    /// Cluster-wide key/value settings. Kept generic: the control
    /// plane disseminates this document without interpreting its
    /// contents.
    pub settings: BTreeMap<String, String>,
}

impl VersionedDoc for ConfigMd {
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl ConfigMd {
    pub fn new(uuid: String) -> Self {
        Self {
            uuid,
            version: 1,
            settings: BTreeMap::new(),
        }
    }

    pub fn validate(&self) -> Result<(), CpError> {
        if self.uuid.is_empty() {
            return Err(CpError::InvalidCluMeta("Config: empty UUID".to_string()));
        }
        if self.version == 0 {
            return Err(CpError::InvalidCluMeta(
                "Config: version must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
