// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Union Volume Domain Model
//!
//! A union volume is one logical volume backed by several lower claims that
//! are merged on the node at attach time. Neither [`Volume`] nor
//! [`VolumeAttachment`] is persisted: both are derived on demand from the
//! `VolumeSplit` resource and the attach pod respectively, and every related
//! cluster object is addressed by a name derived from the volume id.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Logical volume model, access mode translation and naming

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::PathBuf;

use crate::domain::cluster::storage_of;
use crate::domain::errors::UnionError;
use crate::domain::split::VolumeSplit;

/// Root directory under which merged views are exposed on every node
pub const VOLUMES_ROOT: &str = "/var/lib/union-csi-driver.union.io/volumes";

// ============================================================================
// Access Modes
// ============================================================================

/// Access modes a CSI `VolumeCapability` can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VolumeAccessMode {
    SingleNodeWriter,
    SingleNodeReaderOnly,
    MultiNodeReaderOnly,
    MultiNodeSingleWriter,
    MultiNodeMultiWriter,
    SingleNodeSingleWriter,
    SingleNodeMultiWriter,
}

impl VolumeAccessMode {
    /// Translate to the claim access mode lower volumes are requested with
    pub fn to_claim_access_mode(self) -> Result<ClaimAccessMode, UnionError> {
        match self {
            VolumeAccessMode::SingleNodeWriter
            | VolumeAccessMode::SingleNodeSingleWriter
            | VolumeAccessMode::SingleNodeMultiWriter => Ok(ClaimAccessMode::ReadWriteOnce),
            VolumeAccessMode::SingleNodeReaderOnly | VolumeAccessMode::MultiNodeReaderOnly => {
                Ok(ClaimAccessMode::ReadOnlyMany)
            }
            VolumeAccessMode::MultiNodeMultiWriter => Ok(ClaimAccessMode::ReadWriteMany),
            VolumeAccessMode::MultiNodeSingleWriter => Err(UnionError::UnsupportedAccessMode(
                self.to_string(),
            )),
        }
    }
}

impl fmt::Display for VolumeAccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VolumeAccessMode::SingleNodeWriter => "SINGLE_NODE_WRITER",
            VolumeAccessMode::SingleNodeReaderOnly => "SINGLE_NODE_READER_ONLY",
            VolumeAccessMode::MultiNodeReaderOnly => "MULTI_NODE_READER_ONLY",
            VolumeAccessMode::MultiNodeSingleWriter => "MULTI_NODE_SINGLE_WRITER",
            VolumeAccessMode::MultiNodeMultiWriter => "MULTI_NODE_MULTI_WRITER",
            VolumeAccessMode::SingleNodeSingleWriter => "SINGLE_NODE_SINGLE_WRITER",
            VolumeAccessMode::SingleNodeMultiWriter => "SINGLE_NODE_MULTI_WRITER",
        };
        f.write_str(name)
    }
}

/// `PersistentVolumeAccessMode` of a lower claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ClaimAccessMode {
    ReadWriteOnce,
    ReadOnlyMany,
    ReadWriteMany,
    ReadWriteOncePod,
}

/// Translate every requested mode, failing on the first unsupported one
pub fn claim_access_modes(modes: &[VolumeAccessMode]) -> Result<Vec<ClaimAccessMode>, UnionError> {
    modes.iter().map(|m| m.to_claim_access_mode()).collect()
}

// ============================================================================
// Volume
// ============================================================================

/// Parameters for creating the lower claims of a union volume
#[derive(Debug, Clone, PartialEq)]
pub struct CreateLowerOptions {
    pub capacity_bytes: i64,
    pub lower_namespace: String,
    pub lower_storage_class_name: Option<String>,
    pub access_modes: Vec<VolumeAccessMode>,
}

/// Logical ("upper") volume view of a `VolumeSplit`
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    pub volume_id: String,
    pub capacity_bytes: i64,
    pub access_modes: Vec<ClaimAccessMode>,
    pub namespace: String,
    /// Lower claim names in split order
    pub claim_names: Vec<String>,
    pub storage_class_name: Option<String>,
}

impl From<&VolumeSplit> for Volume {
    fn from(split: &VolumeSplit) -> Self {
        let spec = &split.spec;
        Volume {
            volume_id: spec.volume_name.clone(),
            capacity_bytes: storage_of(&spec.capacity_total),
            access_modes: spec.access_modes.clone(),
            namespace: spec.namespace.clone(),
            claim_names: spec.splits.iter().map(|s| s.claim_name.clone()).collect(),
            storage_class_name: spec.storage_class_name.clone(),
        }
    }
}

/// Observed attachment of a volume at a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeAttachment {
    pub volume_id: String,
    pub node_id: String,
    /// Node-local directory holding the merged view
    pub host_path: String,
}

// ============================================================================
// Naming
// ============================================================================

/// Name of the `VolumeSplit` backing `volume_id`
pub fn split_name(volume_id: &str) -> String {
    format!("{}-split", volume_id)
}

/// Name of the lower claim at `index`, optionally prefixed
pub fn claim_name(prefix: Option<&str>, volume_name: &str, index: usize) -> String {
    match prefix.filter(|p| !p.is_empty()) {
        Some(prefix) => format!("{}-{}-lower{}", prefix, volume_name, index),
        None => format!("{}-lower{}", volume_name, index),
    }
}

/// `attach-pod-<sha256(volume_id)>` in lower-case hex
pub fn attach_pod_name(volume_id: &str) -> String {
    let digest = Sha256::digest(volume_id.as_bytes());
    format!("attach-pod-{}", hex::encode(digest))
}

/// Node-local path the attach pod exposes the merged view at
pub fn host_path(volume_id: &str) -> String {
    let mut path = PathBuf::from(VOLUMES_ROOT);
    path.push(volume_id);
    path.push("merged");
    path.to_string_lossy().into_owned()
}
