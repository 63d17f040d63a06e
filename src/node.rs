// src/node.rs

//! Node identity: role, network endpoints, and the electability flags
//! that gate who may become primary.

use crate::errors::CpError;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A node's unique identifier, stable for the node's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    /// Generates a fresh, random node id: 20 random bytes, hex-encoded.
    pub fn generate() -> Self {
        NodeId(hex::encode(rand::random::<[u8; 20]>()))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        NodeId(s)
    }
}

/// The role of a node in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeRole {
    Proxy,
    Target,
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRole::Proxy => write!(f, "proxy"),
            NodeRole::Target => write!(f, "target"),
        }
    }
}

bitflags! {
    /// Electability and maintenance flags for a node.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct NodeFlags: u8 {
        /// The node has opted out of ever becoming primary.
        const NON_ELECTABLE    = 1 << 0;
        /// The node is under maintenance and must not take on new duties.
        const UNDER_MAINTENANCE = 1 << 1;
        /// The node is being decommissioned and will soon leave the cluster.
        const DECOMMISSIONING   = 1 << 2;
    }
}

impl Default for NodeFlags {
    fn default() -> Self {
        NodeFlags::empty()
    }
}

/// A node's static, gossiped/persisted descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub id: NodeId,
    pub role: NodeRole,
    /// The node's control-network URL (used for cluster-internal RPCs).
    pub control_url: String,
    /// The node's public-network URL. May coincide with `control_url`.
    pub public_url: String,
    #[serde(default)]
    pub flags: NodeFlags,
}

impl NodeInfo {
    pub fn new(id: NodeId, role: NodeRole, control_url: String, public_url: String) -> Self {
        Self {
            id,
            role,
            control_url,
            public_url,
            flags: NodeFlags::empty(),
        }
    }

    /// True iff the node may legally become primary: not under
    /// maintenance, not being decommissioned, not flagged non-electable.
    pub fn eligible_for_primary(&self) -> Result<(), CpError> {
        if self.flags.contains(NodeFlags::UNDER_MAINTENANCE) {
            return Err(CpError::Ineligible {
                id: self.id.clone(),
                reason: "under maintenance".to_string(),
            });
        }
        if self.flags.contains(NodeFlags::DECOMMISSIONING) {
            return Err(CpError::Ineligible {
                id: self.id.clone(),
                reason: "being decommissioned".to_string(),
            });
        }
        if self.flags.contains(NodeFlags::NON_ELECTABLE) {
            return Err(CpError::Ineligible {
                id: self.id.clone(),
                reason: "non-electable".to_string(),
            });
        }
        Ok(())
    }

    /// True if the node is in maintenance or being decommissioned
    /// (used to exclude it from active-node counts).
    pub fn in_maint_or_decomm(&self) -> bool {
        self.flags
            .intersects(NodeFlags::UNDER_MAINTENANCE | NodeFlags::DECOMMISSIONING)
    }

    /// Picks a destination URL preferring the control network, falling
    /// back to the public network. Empty if neither is set.
    pub fn preferred_url(&self) -> Option<&str> {
        if !self.control_url.is_empty() {
            Some(&self.control_url)
        } else if !self.public_url.is_empty() {
            Some(&self.public_url)
        } else {
            None
        }
    }

    /// Returns `(first, second)`: the control/public networks ordered so
    /// that `first` matches whichever one `preferred` names, letting a
    /// retry fall back to the other network rather than trying the same
    /// one twice.
    pub fn join_urls(&self, preferred: &str) -> (String, String) {
        if preferred == self.public_url {
            (self.public_url.clone(), self.control_url.clone())
        } else {
            (self.control_url.clone(), self.public_url.clone())
        }
    }

    /// A compact string for logging: id + role + urls.
    pub fn string_ex(&self) -> String {
        format!(
            "{}[{}, ctrl={}, pub={}]",
            self.id, self.role, self.control_url, self.public_url
        )
    }
}

impl fmt::Display for NodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.string_ex())
    }
}
