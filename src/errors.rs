// src/errors.rs

//! Defines the primary error type for the control plane.

use crate::node::NodeId;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// The control-plane error taxonomy: a single flat enum rather than a
/// tree of per-subsystem error types.
#[derive(Error, Debug, Clone)]
pub enum CpError {
    #[error("not primary")]
    NotPrimary,

    #[error("node {id} not found")]
    NodeNotFound { id: NodeId },

    #[error("{id} cannot become primary: {reason}")]
    Ineligible { id: NodeId, reason: String },

    #[error("setting new primary is already in progress")]
    Busy,

    #[error("invalid smap: {0}")]
    InvalidSmap(String),

    #[error("invalid cluMeta: {0}")]
    InvalidCluMeta(String),

    #[error("unreachable: {0}")]
    Unreachable(String),

    /// Constructed only at call sites where the local document is left
    /// in an inconsistent state; the caller logs and exits rather than
    /// returning this to an RPC client.
    #[error("fatal: {0}")]
    Fatal(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CpError {
    /// Attaches a stage name to the descriptive message ("prepare",
    /// "local-commit", "commit-broadcast", "self-join", "bump-metasync").
    /// Call sites wrap errors with this instead of inventing ad hoc
    /// strings inline.
    pub fn at_stage(stage: &str, err: impl std::fmt::Display) -> Self {
        CpError::Internal(format!("{stage}: {err}"))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            CpError::NotPrimary => StatusCode::FORBIDDEN,
            CpError::NodeNotFound { .. } => StatusCode::NOT_FOUND,
            CpError::Ineligible { .. } => StatusCode::BAD_REQUEST,
            CpError::Busy => StatusCode::CONFLICT,
            CpError::InvalidSmap(_) | CpError::InvalidCluMeta(_) => StatusCode::BAD_REQUEST,
            CpError::Unreachable(_) => StatusCode::BAD_GATEWAY,
            CpError::Fatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CpError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CpError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<std::io::Error> for CpError {
    fn from(e: std::io::Error) -> Self {
        CpError::Internal(e.to_string())
    }
}

impl From<reqwest::Error> for CpError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            CpError::Unreachable(e.to_string())
        } else {
            CpError::Internal(e.to_string())
        }
    }
}

impl From<serde_json::Error> for CpError {
    fn from(e: serde_json::Error) -> Self {
        CpError::Internal(format!("(de)serialization error: {e}"))
    }
}

impl From<url::ParseError> for CpError {
    fn from(e: url::ParseError) -> Self {
        CpError::Internal(format!("invalid URL: {e}"))
    }
}
