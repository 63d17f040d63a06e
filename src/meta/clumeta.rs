// src/meta/clumeta.rs

//! The cluMeta bundle: a point-in-time snapshot of all five versioned
//! documents, used both for wire transfer (force-join, metasync) and
//! for atomic bulk install.

use crate::errors::CpError;
use crate::meta::owner::Owner;
use crate::meta::{Bmd, ConfigMd, EtlMd, Rmd, Smap};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

/// Options controlling what `fill` captures. `skip_smap` omits the
/// membership map entirely (e.g. a force-join prepare probe that only
/// needs BMD/RMD/Config for validation). `skip_prime_time` omits the
/// primary's current monotonic tick, used when the bundle will be
/// installed on a follower that must not adopt the prime's timing.
#[derive(Debug, Clone, Copy, Default)]
pub struct FillOpts {
    pub skip_smap: bool,
    pub skip_prime_time: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CluMeta {
    pub smap: Option<Smap>,
    pub bmd: Bmd,
    pub rmd: Rmd,
    pub config: ConfigMd,
    pub etl: Option<EtlMd>,
    /// The primary's wall-clock tick at fill time, in milliseconds
    /// since the epoch. `None` when `FillOpts::skip_prime_time` was set.
    pub prime_time: Option<u64>,
}

impl CluMeta {
    /// Snapshots the five owned documents into a bundle per `opts`.
    pub fn fill(
        smap: &Owner<Smap>,
        bmd: &Owner<Bmd>,
        rmd: &Owner<Rmd>,
        config: &Owner<ConfigMd>,
        etl: &Owner<Option<EtlMd>>,
        opts: FillOpts,
    ) -> Self {
        let prime_time = if opts.skip_prime_time {
            None
        } else {
            Some(
                SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_millis() as u64)
                    .unwrap_or(0),
            )
        };
        Self {
            smap: if opts.skip_smap {
                None
            } else {
                Some((*smap.get()).clone())
            },
            bmd: (*bmd.get()).clone(),
            rmd: (*rmd.get()).clone(),
            config: (*config.get()).clone(),
            etl: (*etl.get()).clone(),
            prime_time,
        }
    }

    /// Enforces the bundle's validation rules. Fatal conditions return
    /// an error naming which sub-document failed; non-fatal conditions
    /// are logged as warnings and do not block install.
    pub fn validate(&self) -> Result<(), CpError> {
        let smap = self
            .smap
            .as_ref()
            .ok_or_else(|| CpError::InvalidCluMeta("smap".to_string()))?;
        smap.validate()
            .map_err(|e| CpError::InvalidCluMeta(format!("smap: {e}")))?;
        self.bmd
            .validate()
            .map_err(|e| CpError::InvalidCluMeta(format!("bmd: {e}")))?;
        self.config
            .validate()
            .map_err(|e| CpError::InvalidCluMeta(format!("config: {e}")))?;

        if self.bmd.uuid != smap.uuid {
            warn!(
                bmd_uuid = %self.bmd.uuid,
                smap_uuid = %smap.uuid,
                "cluMeta: BMD.UUID does not match smap.UUID"
            );
        }
        if smap.count_active_targets() < smap.count_targets() {
            warn!(
                active = smap.count_active_targets(),
                total = smap.count_targets(),
                "cluMeta: not all targets are active"
            );
        }
        if smap.count_active_proxies() < smap.count_proxies() {
            warn!(
                active = smap.count_active_proxies(),
                total = smap.count_proxies(),
                "cluMeta: not all proxies are active"
            );
        }
        Ok(())
    }

    /// Atomically replaces all local documents with those carried in
    /// `self`, in the order Config → BMD → RMD → smap → EtlMD. Config
    /// must land first because nodes consult it when interpreting smap
    /// diffs; EtlMD lands last because transforms reference buckets.
    pub fn install(
        &self,
        smap: &Owner<Smap>,
        bmd: &Owner<Bmd>,
        rmd: &Owner<Rmd>,
        config: &Owner<ConfigMd>,
        etl: &Owner<Option<EtlMd>>,
    ) {
        config.install(self.config.clone());
        bmd.install(self.bmd.clone());
        rmd.install(self.rmd.clone());
        if let Some(ref s) = self.smap {
            smap.install(s.clone());
        }
        etl.install(self.etl.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeId, NodeInfo, NodeRole};

    fn sample_smap() -> Smap {
        let primary = NodeInfo::new(
            NodeId::from("p1"),
            NodeRole::Proxy,
            "http://p1:51080".to_string(),
            "http://p1:51080".to_string(),
        );
        Smap::new("U1".to_string(), primary)
    }

    fn owners() -> (
        Owner<Smap>,
        Owner<Bmd>,
        Owner<Rmd>,
        Owner<ConfigMd>,
        Owner<Option<EtlMd>>,
    ) {
        (
            Owner::new(sample_smap()),
            Owner::new(Bmd::new("U1".to_string())),
            Owner::new(Rmd::new()),
            Owner::new(ConfigMd::new("U1".to_string())),
            Owner::new(None),
        )
    }

    #[test]
    fn fill_captures_all_documents_by_default() {
        let (smap, bmd, rmd, config, etl) = owners();
        let bundle = CluMeta::fill(&smap, &bmd, &rmd, &config, &etl, FillOpts::default());
        assert!(bundle.smap.is_some());
        assert!(bundle.prime_time.is_some());
    }

    #[test]
    fn fill_honors_skip_smap_and_skip_prime_time() {
        let (smap, bmd, rmd, config, etl) = owners();
        let bundle = CluMeta::fill(
            &smap,
            &bmd,
            &rmd,
            &config,
            &etl,
            FillOpts {
                skip_smap: true,
                skip_prime_time: true,
            },
        );
        assert!(bundle.smap.is_none());
        assert!(bundle.prime_time.is_none());
    }

    #[test]
    fn validate_rejects_missing_smap() {
        let (smap, bmd, rmd, config, etl) = owners();
        let bundle = CluMeta::fill(
            &smap,
            &bmd,
            &rmd,
            &config,
            &etl,
            FillOpts {
                skip_smap: true,
                skip_prime_time: false,
            },
        );
        assert!(bundle.validate().is_err());
    }

    #[test]
    fn validate_accepts_well_formed_bundle() {
        let (smap, bmd, rmd, config, etl) = owners();
        let bundle = CluMeta::fill(&smap, &bmd, &rmd, &config, &etl, FillOpts::default());
        assert!(bundle.validate().is_ok());
    }

    #[test]
    fn install_replaces_all_five_documents() {
        let (smap, bmd, rmd, config, etl) = owners();
        let mut foreign = CluMeta::fill(&smap, &bmd, &rmd, &config, &etl, FillOpts::default());
        foreign.config.settings.insert("k".to_string(), "v".to_string());
        foreign.bmd.version = 99;

        foreign.install(&smap, &bmd, &rmd, &config, &etl);

        assert_eq!(bmd.get().version, 99);
        assert_eq!(config.get().settings.get("k"), Some(&"v".to_string()));
    }
}
