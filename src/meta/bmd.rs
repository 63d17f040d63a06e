// src/meta/bmd.rs

//! The bucket map (BMD): the cluster-wide registry of buckets.

use crate::errors::CpError;
use crate::meta::owner::VersionedDoc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single bucket's definition. The data plane owns bucket contents;
/// the control plane only tracks existence and placement-relevant
/// properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketDef {
    pub name: String,
    pub created_version: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bmd {
    pub uuid: String,
    pub version: u64,
    pub buckets: BTreeMap<String, BucketDef>,
}

impl VersionedDoc for Bmd {
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl Bmd {
    pub fn new(uuid: String) -> Self {
        Self {
            uuid,
            version: 1,
            buckets: BTreeMap::new(),
        }
    }

    /// Confirms the document's validation rule: non-nil (trivially true
    /// once constructed), version > 0, UUID valid (non-empty).
    pub fn validate(&self) -> Result<(), CpError> {
        if self.uuid.is_empty() {
            return Err(CpError::InvalidCluMeta("BMD: empty UUID".to_string()));
        }
        if self.version == 0 {
            return Err(CpError::InvalidCluMeta("BMD: version must be > 0".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_bmd_validates() {
        assert!(Bmd::new("U1".to_string()).validate().is_ok());
    }

    #[test]
    fn zero_version_is_invalid() {
        let mut bmd = Bmd::new("U1".to_string());
        bmd.version = 0;
        assert!(bmd.validate().is_err());
    }

    #[test]
    fn empty_uuid_is_invalid() {
        let bmd = Bmd::new(String::new());
        assert!(bmd.validate().is_err());
    }
}
