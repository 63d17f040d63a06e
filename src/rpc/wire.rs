// src/rpc/wire.rs

//! Wire-level constants and DTOs for the control-plane HTTP protocol.

use crate::meta::clumeta::CluMeta;
use crate::meta::Smap;
use serde::{Deserialize, Serialize};

// --- Paths ---
pub const PATH_DAEMON_PROXY_PREFIX: &str = "/daemon/proxy";
pub const PATH_DAEMON_FORCE_JOIN: &str = "/daemon/force-join";
pub const PATH_DAEMON: &str = "/daemon";
pub const PATH_CLUSTER: &str = "/cluster";
pub const PATH_CLUSTER_PROXY_PREFIX: &str = "/cluster/proxy";
/// The metasync engine needs a delivery endpoint for its routine
/// document pushes distinct from the handoff/force-join/bump-metasync
/// paths, so one is added here rather than overloading an unrelated path.
pub const PATH_DAEMON_METASYNC: &str = "/daemon/metasync";

// --- Query parameters ---
pub const QPARAM_PREPARE: &str = "prepare";
pub const QPARAM_FORCE: &str = "force";
pub const QPARAM_PRIMARY_CANDIDATE_URL: &str = "primary-candidate-url";
pub const QPARAM_WHAT: &str = "what";

pub const WHAT_SMAP: &str = "smap";
pub const WHAT_SMAP_VOTE: &str = "smap-vote";

// --- Headers ---
pub const HDR_CALLER_ID: &str = "caller-id";

// --- Action-message action names ---
pub const ACT_PRIMARY_FORCE: &str = "primary-force";
pub const ACT_BUMP_METASYNC: &str = "bump-metasync";

/// The generic action-message envelope used by the force-join and
/// bump-metasync RPCs. `value` is morph-unmarshalled by the receiver:
/// unknown fields are tolerated, missing required ones rejected by the
/// target type's own `Deserialize` impl.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionMessage {
    pub action: String,
    pub value: serde_json::Value,
}

impl ActionMessage {
    pub fn new(action: &str, value: impl Serialize) -> Result<Self, crate::errors::CpError> {
        Ok(Self {
            action: action.to_string(),
            value: serde_json::to_value(value)?,
        })
    }

    pub fn bump_metasync() -> Self {
        Self {
            action: ACT_BUMP_METASYNC.to_string(),
            value: serde_json::Value::Null,
        }
    }

    pub fn value_as<T: for<'de> Deserialize<'de>>(&self) -> Result<T, crate::errors::CpError> {
        serde_json::from_value(self.value.clone()).map_err(Into::into)
    }
}

/// Body of the force-join prepare RPC: `{action: "primary-force", value: nsmap}`.
pub fn force_join_prepare_msg(nsmap: &Smap) -> Result<ActionMessage, crate::errors::CpError> {
    ActionMessage::new(ACT_PRIMARY_FORCE, nsmap)
}

/// Body of the force-join commit RPC: `{action: "primary-force", value: ncm}`.
pub fn force_join_commit_msg(ncm: &CluMeta) -> Result<ActionMessage, crate::errors::CpError> {
    ActionMessage::new(ACT_PRIMARY_FORCE, ncm)
}
