// src/meta/etl.rs

//! The ETL/transformation registry (EtlMD): optional, version +
//! registry of transform names. Transform execution is out of scope;
//! only the registry document is carried here.

use crate::meta::owner::VersionedDoc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtlMd {
    pub version: u64,
    pub transforms: BTreeSet<String>,
}

impl VersionedDoc for EtlMd {
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl EtlMd {
    pub fn new() -> Self {
        Self {
            version: 1,
            transforms: BTreeSet::new(),
        }
    }
}

impl Default for EtlMd {
    fn default() -> Self {
        Self::new()
    }
}

/// EtlMD is the one optional sub-document. `Owner<Option<EtlMd>>` needs
/// its own `VersionedDoc` impl since the owner container is generic
/// over the document type, not its optionality; absence is modeled as
/// version 0.
impl VersionedDoc for Option<EtlMd> {
    fn version(&self) -> u64 {
        self.as_ref().map_or(0, |e| e.version)
    }
    fn set_version(&mut self, version: u64) {
        if let Some(e) = self.as_mut() {
            e.set_version(version);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_etl_md_starts_at_version_one() {
        assert_eq!(EtlMd::new().version, 1);
    }
}
