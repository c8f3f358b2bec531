// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Union Domain Errors
//!
//! Transport-independent failure conditions raised by the splitter, attacher
//! and union orchestrator. The orchestrator passes them through unchanged;
//! `crate::presentation::grpc` is the only place that maps them to status
//! codes.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Typed error conditions for the union orchestration core

use thiserror::Error;

use crate::domain::cluster::StoreError;

#[derive(Debug, Error)]
pub enum UnionError {
    /// A repeated create request does not match the persisted plan
    #[error("idempotent request for volume {0} is incompatible with previous request(s)")]
    IdempotencyConflict(String),

    #[error("volume {0} not found")]
    VolumeNotFound(String),

    #[error("node {0} not found")]
    NodeNotFound(String),

    #[error("attachment of volume {volume_id} at node {node_id} not found")]
    AttachmentNotFound { volume_id: String, node_id: String },

    /// Attach pod is running on a node other than the requested one
    #[error("volume {volume_id} is in use at node {node_id}")]
    VolumeInUse { volume_id: String, node_id: String },

    #[error("access mode {0} is currently not supported")]
    UnsupportedAccessMode(String),

    #[error("attach pod {pod} for volume {volume_id} is terminating")]
    Terminating { pod: String, volume_id: String },

    #[error("timed out waiting for the condition")]
    WaitTimeout,

    #[error("context deadline exceeded")]
    DeadlineExceeded,

    #[error("context canceled")]
    Cancelled,

    #[error("invalid volume split {split}: {reason}")]
    InvalidSplit { split: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Internal(String),
}

impl UnionError {
    pub fn is_volume_not_found(&self) -> bool {
        matches!(self, UnionError::VolumeNotFound(_))
    }

    pub fn is_attachment_not_found(&self) -> bool {
        matches!(self, UnionError::AttachmentNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_convert_transparently() {
        let err: UnionError = StoreError::Network("connection refused".to_string()).into();
        assert_eq!(err.to_string(), "Network error: connection refused");
    }

    #[test]
    fn test_in_use_names_conflicting_node() {
        let err = UnionError::VolumeInUse {
            volume_id: "v1".to_string(),
            node_id: "node-b".to_string(),
        };
        assert!(err.to_string().contains("node-b"));
    }
}
