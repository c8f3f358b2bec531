// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Negotiated Capabilities
//!
//! Each service advertises a fixed capability set and enforces it on the
//! requests it serves: access modes outside the negotiated set, read-only
//! publishing without `PUBLISH_READONLY` and missing staging paths under
//! `STAGE_UNSTAGE_VOLUME` are rejected after the field checks pass.
//!
//! # Architecture
//!
//! - **Layer:** Presentation Layer
//! - **Purpose:** Capability negotiation and request admission

use std::collections::BTreeSet;
use thiserror::Error;
use tonic::Status;

use super::field::FieldErrors;
use super::requests::{
    access_mode_of, validate_controller_publish_volume_request, validate_controller_unpublish_volume_request,
    validate_create_volume_request, validate_delete_volume_request, validate_node_publish_volume_request,
    validate_node_unpublish_volume_request,
};
use crate::presentation::grpc::csi::controller_service_capability::rpc::Type as ControllerRpcType;
use crate::presentation::grpc::csi::node_service_capability::rpc::Type as NodeRpcType;
use crate::presentation::grpc::csi::plugin_capability::service::Type as PluginServiceType;
use crate::presentation::grpc::csi::volume_capability::access_mode::Mode;
use crate::presentation::grpc::csi::{
    controller_service_capability, node_service_capability, plugin_capability, ControllerPublishVolumeRequest,
    ControllerServiceCapability, ControllerUnpublishVolumeRequest, CreateVolumeRequest, DeleteVolumeRequest,
    NodePublishVolumeRequest, NodeServiceCapability, NodeUnpublishVolumeRequest, PluginCapability,
};

/// Capabilities the union driver negotiates
pub const PLUGIN_CAPABILITIES: &[PluginServiceType] = &[PluginServiceType::ControllerService];
pub const CONTROLLER_CAPABILITIES: &[ControllerRpcType] = &[
    ControllerRpcType::CreateDeleteVolume,
    ControllerRpcType::PublishUnpublishVolume,
];
pub const NODE_CAPABILITIES: &[NodeRpcType] = &[];
pub const VOLUME_ACCESS_MODES: &[Mode] = &[Mode::SingleNodeWriter];

#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("{0} capability is UNKNOWN")]
    Unknown(&'static str),
}

/// Reasons a request is refused before reaching the service
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error(transparent)]
    Fields(#[from] FieldErrors),

    #[error("Plugin does not support access mode: {mode}. Supported access modes: [{supported}]")]
    UnsupportedAccessMode { mode: String, supported: String },

    #[error("readonly is true but plugin does not support controller capability PUBLISH_READONLY")]
    ReadonlyNotSupported,

    #[error("stagingTargetPath is empty but plugin supports node capability STAGE_UNSTAGE_VOLUME")]
    StagingTargetPathRequired,
}

impl From<ValidationError> for Status {
    fn from(err: ValidationError) -> Self {
        Status::invalid_argument(err.to_string())
    }
}

// ============================================================================
// Volume Access Modes
// ============================================================================

#[derive(Debug, Clone)]
pub struct VolumeModes {
    modes: BTreeSet<Mode>,
}

impl VolumeModes {
    pub fn new(modes: &[Mode]) -> Result<Self, CapabilityError> {
        if modes.contains(&Mode::Unknown) {
            return Err(CapabilityError::Unknown("volume"));
        }
        Ok(Self {
            modes: modes.iter().copied().collect(),
        })
    }

    pub fn has(&self, mode: Mode) -> bool {
        self.modes.contains(&mode)
    }

    pub fn modes(&self) -> Vec<Mode> {
        self.modes.iter().copied().collect()
    }

    /// Refuse a mode outside the negotiated set; absent modes were already
    /// reported by the field checks
    fn admit(&self, mode: Option<Mode>) -> Result<(), ValidationError> {
        match mode {
            Some(mode) if !self.has(mode) => Err(ValidationError::UnsupportedAccessMode {
                mode: mode.as_str_name().to_string(),
                supported: self
                    .modes
                    .iter()
                    .map(|m| m.as_str_name())
                    .collect::<Vec<_>>()
                    .join(" "),
            }),
            _ => Ok(()),
        }
    }
}

// ============================================================================
// Identity
// ============================================================================

#[derive(Debug, Clone)]
pub struct IdentityCapabilities {
    types: BTreeSet<PluginServiceType>,
}

impl IdentityCapabilities {
    pub fn new(types: &[PluginServiceType]) -> Result<Self, CapabilityError> {
        if types.contains(&PluginServiceType::Unknown) {
            return Err(CapabilityError::Unknown("plugin"));
        }
        Ok(Self {
            types: types.iter().copied().collect(),
        })
    }

    pub fn has(&self, capability: PluginServiceType) -> bool {
        self.types.contains(&capability)
    }

    pub fn capabilities(&self) -> Vec<PluginCapability> {
        self.types
            .iter()
            .map(|t| PluginCapability {
                r#type: Some(plugin_capability::Type::Service(plugin_capability::Service {
                    r#type: *t as i32,
                })),
            })
            .collect()
    }
}

// ============================================================================
// Controller
// ============================================================================

#[derive(Debug, Clone)]
pub struct ControllerCapabilities {
    types: BTreeSet<ControllerRpcType>,
    volume: VolumeModes,
}

impl ControllerCapabilities {
    pub fn new(types: &[ControllerRpcType], modes: &[Mode]) -> Result<Self, CapabilityError> {
        if types.contains(&ControllerRpcType::Unknown) {
            return Err(CapabilityError::Unknown("controller"));
        }
        Ok(Self {
            types: types.iter().copied().collect(),
            volume: VolumeModes::new(modes)?,
        })
    }

    pub fn has(&self, capability: ControllerRpcType) -> bool {
        self.types.contains(&capability)
    }

    pub fn volume_modes(&self) -> &VolumeModes {
        &self.volume
    }

    pub fn capabilities(&self) -> Vec<ControllerServiceCapability> {
        self.types
            .iter()
            .map(|t| ControllerServiceCapability {
                r#type: Some(controller_service_capability::Type::Rpc(
                    controller_service_capability::Rpc { r#type: *t as i32 },
                )),
            })
            .collect()
    }

    pub fn validate_create_volume(&self, req: &CreateVolumeRequest) -> Result<(), ValidationError> {
        validate_create_volume_request(req).into_result()?;
        for capability in &req.volume_capabilities {
            self.volume.admit(access_mode_of(capability))?;
        }
        Ok(())
    }

    pub fn validate_delete_volume(&self, req: &DeleteVolumeRequest) -> Result<(), ValidationError> {
        Ok(validate_delete_volume_request(req).into_result()?)
    }

    pub fn validate_controller_publish_volume(
        &self,
        req: &ControllerPublishVolumeRequest,
    ) -> Result<(), ValidationError> {
        validate_controller_publish_volume_request(req).into_result()?;
        self.volume
            .admit(req.volume_capability.as_ref().and_then(access_mode_of))?;

        if req.readonly && !self.has(ControllerRpcType::PublishReadonly) {
            return Err(ValidationError::ReadonlyNotSupported);
        }
        Ok(())
    }

    pub fn validate_controller_unpublish_volume(
        &self,
        req: &ControllerUnpublishVolumeRequest,
    ) -> Result<(), ValidationError> {
        Ok(validate_controller_unpublish_volume_request(req).into_result()?)
    }
}

// ============================================================================
// Node
// ============================================================================

#[derive(Debug, Clone)]
pub struct NodeCapabilities {
    types: BTreeSet<NodeRpcType>,
    volume: VolumeModes,
}

impl NodeCapabilities {
    pub fn new(types: &[NodeRpcType], modes: &[Mode]) -> Result<Self, CapabilityError> {
        if types.contains(&NodeRpcType::Unknown) {
            return Err(CapabilityError::Unknown("node"));
        }
        Ok(Self {
            types: types.iter().copied().collect(),
            volume: VolumeModes::new(modes)?,
        })
    }

    pub fn has(&self, capability: NodeRpcType) -> bool {
        self.types.contains(&capability)
    }

    pub fn volume_modes(&self) -> &VolumeModes {
        &self.volume
    }

    pub fn capabilities(&self) -> Vec<NodeServiceCapability> {
        self.types
            .iter()
            .map(|t| NodeServiceCapability {
                r#type: Some(node_service_capability::Type::Rpc(node_service_capability::Rpc {
                    r#type: *t as i32,
                })),
            })
            .collect()
    }

    pub fn validate_node_publish_volume(&self, req: &NodePublishVolumeRequest) -> Result<(), ValidationError> {
        validate_node_publish_volume_request(req).into_result()?;
        self.volume
            .admit(req.volume_capability.as_ref().and_then(access_mode_of))?;

        if self.has(NodeRpcType::StageUnstageVolume) && req.staging_target_path.is_empty() {
            return Err(ValidationError::StagingTargetPathRequired);
        }
        Ok(())
    }

    pub fn validate_node_unpublish_volume(&self, req: &NodeUnpublishVolumeRequest) -> Result<(), ValidationError> {
        Ok(validate_node_unpublish_volume_request(req).into_result()?)
    }
}
