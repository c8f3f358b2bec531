// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! CSI Controller Service
//!
//! Cluster-level half of the driver. `CreateVolume` / `DeleteVolume` plan and
//! remove the lower claims; `ControllerPublishVolume` /
//! `ControllerUnpublishVolume` start and stop the attach pod that merges them
//! on a node. The merged view's host path travels to the node service in the
//! publish context under [`PATH_PUBLISH_CONTEXT_KEY`].
//!
//! Status mapping:
//!
//! | Condition | Status |
//! |-----------|--------|
//! | field or capability validation | `INVALID_ARGUMENT` |
//! | `IdempotencyConflict` | `ALREADY_EXISTS` |
//! | `VolumeNotFound` on delete, `AttachmentNotFound` on unpublish | `OK` |
//! | `VolumeNotFound`, `NodeNotFound` | `NOT_FOUND` |
//! | `VolumeInUse` | `FAILED_PRECONDITION` |
//! | anything else | `INTERNAL` |
//!
//! # Architecture
//!
//! - **Layer:** Presentation Layer
//! - **Purpose:** CSI Controller gRPC service

use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};
use tracing::info;

use crate::application::union::UnionService;
use crate::domain::errors::UnionError;
use crate::domain::volume::{CreateLowerOptions, VolumeAccessMode};
use crate::presentation::grpc::context::call_context;
use crate::presentation::grpc::csi::controller_server::{Controller, ControllerServer};
use crate::presentation::grpc::csi::volume_capability::access_mode::Mode;
use crate::presentation::grpc::csi::volume_capability::AccessType;
use crate::presentation::grpc::csi::*;
use crate::presentation::grpc::logging::logged;
use crate::presentation::grpc::validation::requests::access_mode_of;
use crate::presentation::grpc::validation::ControllerCapabilities;

pub const DEFAULT_LOWER_NAMESPACE: &str = "union";
/// Capacity requested when the request carries no range
pub const DEFAULT_CAPACITY_BYTES: i64 = 1024;
pub const PATH_PUBLISH_CONTEXT_KEY: &str = "path";

// StorageClass parameter keys, matched case-insensitively
pub const LOWER_NAMESPACE_PARAM: &str = "lowernamespace";
pub const LOWER_STORAGE_CLASS_NAME_PARAM: &str = "lowerstorageclassname";
pub const PVC_NAME_PARAM: &str = "csi.storage.k8s.io/pvc/name";
pub const PVC_NAMESPACE_PARAM: &str = "csi.storage.k8s.io/pvc/namespace";
pub const PV_NAME_PARAM: &str = "csi.storage.k8s.io/pv/name";

pub(crate) const BLOCK_NOT_SUPPORTED: &str =
    "Volume capability with access type of block not supported. Support only mount volumes";

pub struct CsiControllerService {
    union: Arc<dyn UnionService>,
    capabilities: ControllerCapabilities,
    default_lower_namespace: String,
    shutdown: CancellationToken,
}

impl CsiControllerService {
    pub fn new(
        union: Arc<dyn UnionService>,
        capabilities: ControllerCapabilities,
        default_lower_namespace: impl Into<String>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            union,
            capabilities,
            default_lower_namespace: default_lower_namespace.into(),
            shutdown,
        }
    }

    /// Create a gRPC server instance
    pub fn into_server(self) -> ControllerServer<Self> {
        ControllerServer::new(self)
    }

    fn create_options(&self, req: &CreateVolumeRequest) -> Result<CreateLowerOptions, Status> {
        let mut options = CreateLowerOptions {
            capacity_bytes: capacity_bytes(req.capacity_range.as_ref()),
            lower_namespace: self.default_lower_namespace.clone(),
            lower_storage_class_name: None,
            access_modes: req
                .volume_capabilities
                .iter()
                .filter_map(access_mode_of)
                .filter_map(volume_access_mode)
                .collect(),
        };
        parse_parameters(&req.parameters, &mut options)?;
        Ok(options)
    }
}

/// Only `requiredBytes` is honoured; the limit is not set by provisioners
fn capacity_bytes(range: Option<&CapacityRange>) -> i64 {
    match range {
        Some(range) => range.required_bytes,
        None => DEFAULT_CAPACITY_BYTES,
    }
}

fn volume_access_mode(mode: Mode) -> Option<VolumeAccessMode> {
    match mode {
        Mode::Unknown => None,
        Mode::SingleNodeWriter => Some(VolumeAccessMode::SingleNodeWriter),
        Mode::SingleNodeReaderOnly => Some(VolumeAccessMode::SingleNodeReaderOnly),
        Mode::MultiNodeReaderOnly => Some(VolumeAccessMode::MultiNodeReaderOnly),
        Mode::MultiNodeSingleWriter => Some(VolumeAccessMode::MultiNodeSingleWriter),
        Mode::MultiNodeMultiWriter => Some(VolumeAccessMode::MultiNodeMultiWriter),
        Mode::SingleNodeSingleWriter => Some(VolumeAccessMode::SingleNodeSingleWriter),
        Mode::SingleNodeMultiWriter => Some(VolumeAccessMode::SingleNodeMultiWriter),
    }
}

fn parse_parameters(parameters: &HashMap<String, String>, options: &mut CreateLowerOptions) -> Result<(), Status> {
    let mut keys: Vec<&String> = parameters.keys().collect();
    keys.sort();

    for key in keys {
        let value = &parameters[key];
        match key.to_lowercase().as_str() {
            LOWER_NAMESPACE_PARAM => options.lower_namespace = value.clone(),
            LOWER_STORAGE_CLASS_NAME_PARAM => {
                if value.is_empty() {
                    return Err(Status::invalid_argument(format!(
                        "{} value cannot be empty (\"\") when specified in parameters",
                        key
                    )));
                }
                options.lower_storage_class_name = Some(value.clone());
            }
            // Injected by the external provisioner, unused
            PVC_NAME_PARAM | PVC_NAMESPACE_PARAM | PV_NAME_PARAM => {}
            _ => {
                return Err(Status::invalid_argument(format!(
                    "unknown parameters key: {:?}",
                    key
                )))
            }
        }
    }
    Ok(())
}

/// Status for a union failure that is not an idempotent success
pub(crate) fn union_status(err: &UnionError, message: String) -> Status {
    match err {
        UnionError::IdempotencyConflict(_) => Status::already_exists(message),
        UnionError::VolumeNotFound(_) | UnionError::NodeNotFound(_) => Status::not_found(message),
        UnionError::VolumeInUse { .. } => Status::failed_precondition(message),
        _ => Status::internal(message),
    }
}

fn unimplemented(method: &str) -> Status {
    Status::unimplemented(format!("Unimplemented {} method", method))
}

#[tonic::async_trait]
impl Controller for CsiControllerService {
    async fn create_volume(
        &self,
        request: Request<CreateVolumeRequest>,
    ) -> Result<Response<CreateVolumeResponse>, Status> {
        logged("CreateVolume", request, move |request| async move {
            let req = request.into_inner();
            self.capabilities.validate_create_volume(&req)?;

            if req
                .volume_capabilities
                .iter()
                .any(|c| matches!(c.access_type, Some(AccessType::Block(_))))
            {
                return Err(Status::invalid_argument(BLOCK_NOT_SUPPORTED));
            }

            let options = self.create_options(&req)?;

            info!(name = %req.name, "CreateVolume: creating");
            let volume = self
                .union
                .create_lower(&req.name, &options)
                .await
                .map_err(|e| union_status(&e, format!("Failed to create volume {}: {}", req.name, e)))?;
            info!(name = %req.name, "CreateVolume: created");

            Ok(Response::new(CreateVolumeResponse {
                volume: Some(Volume {
                    volume_id: volume.volume_id,
                    capacity_bytes: volume.capacity_bytes,
                    ..Default::default()
                }),
            }))
        })
        .await
    }

    async fn delete_volume(
        &self,
        request: Request<DeleteVolumeRequest>,
    ) -> Result<Response<DeleteVolumeResponse>, Status> {
        logged("DeleteVolume", request, move |request| async move {
            let req = request.into_inner();
            self.capabilities.validate_delete_volume(&req)?;
            let volume_id = req.volume_id.as_str();

            info!(volume_id, "DeleteVolume: deleting");
            match self.union.delete_lower(volume_id).await {
                Ok(()) => info!(volume_id, "DeleteVolume: deleted"),
                Err(e) if e.is_volume_not_found() => {
                    info!(volume_id, "DeleteVolume: volume not found, return OK");
                }
                Err(e) => {
                    return Err(union_status(
                        &e,
                        format!("Failed to delete volume {}: {}", volume_id, e),
                    ))
                }
            }

            Ok(Response::new(DeleteVolumeResponse {}))
        })
        .await
    }

    async fn controller_publish_volume(
        &self,
        request: Request<ControllerPublishVolumeRequest>,
    ) -> Result<Response<ControllerPublishVolumeResponse>, Status> {
        logged("ControllerPublishVolume", request, move |request| async move {
            let ctx = call_context(&self.shutdown, request.metadata());
            let req = request.into_inner();
            self.capabilities.validate_controller_publish_volume(&req)?;
            let (volume_id, node_id) = (req.volume_id.as_str(), req.node_id.as_str());

            info!(volume_id, node_id, "ControllerPublishVolume: attaching");
            let attachment = self
                .union
                .attach_lower(&ctx, volume_id, node_id)
                .await
                .map_err(|e| {
                    let message = match &e {
                        UnionError::VolumeInUse {
                            node_id: attached_at, ..
                        } => format!(
                            "Volume {:?} cannot be attached at node {:?}, already attached at node {:?}",
                            volume_id, node_id, attached_at
                        ),
                        _ => format!("Failed to attach volume {} at node {}: {}", volume_id, node_id, e),
                    };
                    union_status(&e, message)
                })?;
            info!(volume_id, node_id, "ControllerPublishVolume: attached");

            let mut publish_context = HashMap::new();
            publish_context.insert(PATH_PUBLISH_CONTEXT_KEY.to_string(), attachment.host_path);
            Ok(Response::new(ControllerPublishVolumeResponse { publish_context }))
        })
        .await
    }

    async fn controller_unpublish_volume(
        &self,
        request: Request<ControllerUnpublishVolumeRequest>,
    ) -> Result<Response<ControllerUnpublishVolumeResponse>, Status> {
        logged("ControllerUnpublishVolume", request, move |request| async move {
            let ctx = call_context(&self.shutdown, request.metadata());
            let req = request.into_inner();
            self.capabilities.validate_controller_unpublish_volume(&req)?;

            // Optional in the protocol, but a detach cannot be located without it
            if req.node_id.is_empty() {
                return Err(Status::invalid_argument("nodeId is missing"));
            }
            let (volume_id, node_id) = (req.volume_id.as_str(), req.node_id.as_str());

            info!(volume_id, node_id, "ControllerUnpublishVolume: detaching");
            match self.union.detach_lower(&ctx, volume_id, node_id).await {
                Ok(()) => info!(volume_id, node_id, "ControllerUnpublishVolume: detached"),
                Err(e) if e.is_attachment_not_found() => {
                    info!(volume_id, node_id, "ControllerUnpublishVolume: attachment not found, return OK");
                }
                Err(e) => {
                    return Err(union_status(
                        &e,
                        format!("Failed to detach volume {} at node {}: {}", volume_id, node_id, e),
                    ))
                }
            }

            Ok(Response::new(ControllerUnpublishVolumeResponse {}))
        })
        .await
    }

    async fn validate_volume_capabilities(
        &self,
        request: Request<ValidateVolumeCapabilitiesRequest>,
    ) -> Result<Response<ValidateVolumeCapabilitiesResponse>, Status> {
        logged("ValidateVolumeCapabilities", request, |_| async {
            Err(unimplemented("ValidateVolumeCapabilities"))
        })
        .await
    }

    async fn list_volumes(
        &self,
        request: Request<ListVolumesRequest>,
    ) -> Result<Response<ListVolumesResponse>, Status> {
        logged("ListVolumes", request, |_| async { Err(unimplemented("ListVolumes")) }).await
    }

    async fn get_capacity(
        &self,
        request: Request<GetCapacityRequest>,
    ) -> Result<Response<GetCapacityResponse>, Status> {
        logged("GetCapacity", request, |_| async { Err(unimplemented("GetCapacity")) }).await
    }

    async fn controller_get_capabilities(
        &self,
        request: Request<ControllerGetCapabilitiesRequest>,
    ) -> Result<Response<ControllerGetCapabilitiesResponse>, Status> {
        logged("ControllerGetCapabilities", request, move |_| async move {
            Ok(Response::new(ControllerGetCapabilitiesResponse {
                capabilities: self.capabilities.capabilities(),
            }))
        })
        .await
    }

    async fn create_snapshot(
        &self,
        request: Request<CreateSnapshotRequest>,
    ) -> Result<Response<CreateSnapshotResponse>, Status> {
        logged("CreateSnapshot", request, |_| async { Err(unimplemented("CreateSnapshot")) }).await
    }

    async fn delete_snapshot(
        &self,
        request: Request<DeleteSnapshotRequest>,
    ) -> Result<Response<DeleteSnapshotResponse>, Status> {
        logged("DeleteSnapshot", request, |_| async { Err(unimplemented("DeleteSnapshot")) }).await
    }

    async fn list_snapshots(
        &self,
        request: Request<ListSnapshotsRequest>,
    ) -> Result<Response<ListSnapshotsResponse>, Status> {
        logged("ListSnapshots", request, |_| async { Err(unimplemented("ListSnapshots")) }).await
    }

    async fn controller_expand_volume(
        &self,
        request: Request<ControllerExpandVolumeRequest>,
    ) -> Result<Response<ControllerExpandVolumeResponse>, Status> {
        logged("ControllerExpandVolume", request, |_| async {
            Err(unimplemented("ControllerExpandVolume"))
        })
        .await
    }

    async fn controller_get_volume(
        &self,
        request: Request<ControllerGetVolumeRequest>,
    ) -> Result<Response<ControllerGetVolumeResponse>, Status> {
        logged("ControllerGetVolume", request, |_| async {
            Err(unimplemented("ControllerGetVolume"))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::context::CallContext;
    use crate::domain::volume::{Volume as UnionVolume, VolumeAttachment};
    use crate::presentation::grpc::csi::volume_capability::{AccessMode, BlockVolume, MountVolume};
    use crate::presentation::grpc::validation::{CONTROLLER_CAPABILITIES, VOLUME_ACCESS_MODES};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tonic::Code;

    /// Scripted union service recording the options it was called with
    #[derive(Default)]
    struct ScriptedUnion {
        create: Mutex<Option<UnionError>>,
        delete: Mutex<Option<UnionError>>,
        attach: Mutex<Option<UnionError>>,
        detach: Mutex<Option<UnionError>>,
        last_options: Mutex<Option<CreateLowerOptions>>,
    }

    #[async_trait]
    impl UnionService for ScriptedUnion {
        async fn create_lower(&self, volume_name: &str, options: &CreateLowerOptions) -> Result<UnionVolume, UnionError> {
            *self.last_options.lock() = Some(options.clone());
            if let Some(err) = self.create.lock().take() {
                return Err(err);
            }
            Ok(UnionVolume {
                volume_id: volume_name.to_string(),
                capacity_bytes: 0,
                access_modes: Vec::new(),
                namespace: options.lower_namespace.clone(),
                claim_names: Vec::new(),
                storage_class_name: None,
            })
        }

        async fn delete_lower(&self, _volume_id: &str) -> Result<(), UnionError> {
            self.delete.lock().take().map_or(Ok(()), Err)
        }

        async fn attach_lower(
            &self,
            _ctx: &CallContext,
            volume_id: &str,
            node_id: &str,
        ) -> Result<VolumeAttachment, UnionError> {
            if let Some(err) = self.attach.lock().take() {
                return Err(err);
            }
            Ok(VolumeAttachment {
                volume_id: volume_id.to_string(),
                node_id: node_id.to_string(),
                host_path: crate::domain::volume::host_path(volume_id),
            })
        }

        async fn detach_lower(&self, _ctx: &CallContext, _volume_id: &str, _node_id: &str) -> Result<(), UnionError> {
            self.detach.lock().take().map_or(Ok(()), Err)
        }
    }

    fn service(union: Arc<ScriptedUnion>) -> CsiControllerService {
        CsiControllerService::new(
            union,
            ControllerCapabilities::new(CONTROLLER_CAPABILITIES, VOLUME_ACCESS_MODES).unwrap(),
            DEFAULT_LOWER_NAMESPACE,
            CancellationToken::new(),
        )
    }

    fn mount_capability() -> VolumeCapability {
        VolumeCapability {
            access_type: Some(AccessType::Mount(MountVolume::default())),
            access_mode: Some(AccessMode {
                mode: Mode::SingleNodeWriter as i32,
            }),
        }
    }

    fn create_request(parameters: &[(&str, &str)]) -> CreateVolumeRequest {
        CreateVolumeRequest {
            name: "pvc-1".to_string(),
            capacity_range: Some(CapacityRange {
                required_bytes: 4096,
                limit_bytes: 0,
            }),
            volume_capabilities: vec![mount_capability()],
            parameters: parameters
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    fn publish_request() -> ControllerPublishVolumeRequest {
        ControllerPublishVolumeRequest {
            volume_id: "pvc-1".to_string(),
            node_id: "node-a".to_string(),
            volume_capability: Some(mount_capability()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_volume_parses_parameters() {
        let union = Arc::new(ScriptedUnion::default());
        let response = service(union.clone())
            .create_volume(Request::new(create_request(&[
                ("LowerNamespace", "lowers"),
                ("lowerStorageClassName", "fast"),
                (PVC_NAME_PARAM, "claim"),
                (PVC_NAMESPACE_PARAM, "default"),
                (PV_NAME_PARAM, "pvc-1"),
            ])))
            .await
            .unwrap()
            .into_inner();

        let volume = response.volume.unwrap();
        assert_eq!(volume.volume_id, "pvc-1");
        assert_eq!(volume.capacity_bytes, 0);

        let options = union.last_options.lock().clone().unwrap();
        assert_eq!(
            options,
            CreateLowerOptions {
                capacity_bytes: 4096,
                lower_namespace: "lowers".to_string(),
                lower_storage_class_name: Some("fast".to_string()),
                access_modes: vec![VolumeAccessMode::SingleNodeWriter],
            }
        );
    }

    #[tokio::test]
    async fn test_create_volume_defaults() {
        let union = Arc::new(ScriptedUnion::default());
        let mut req = create_request(&[]);
        req.capacity_range = None;
        service(union.clone()).create_volume(Request::new(req)).await.unwrap();

        let options = union.last_options.lock().clone().unwrap();
        assert_eq!(options.capacity_bytes, DEFAULT_CAPACITY_BYTES);
        assert_eq!(options.lower_namespace, DEFAULT_LOWER_NAMESPACE);
        assert_eq!(options.lower_storage_class_name, None);
    }

    #[tokio::test]
    async fn test_create_volume_rejections() {
        let svc = service(Arc::new(ScriptedUnion::default()));

        let status = svc
            .create_volume(Request::new(create_request(&[("unknown", "x")])))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
        assert_eq!(status.message(), "unknown parameters key: \"unknown\"");

        let status = svc
            .create_volume(Request::new(create_request(&[("lowerStorageClassName", "")])))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);

        let mut req = create_request(&[]);
        req.volume_capabilities[0].access_type = Some(AccessType::Block(BlockVolume {}));
        let status = svc.create_volume(Request::new(req)).await.unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
        assert_eq!(status.message(), BLOCK_NOT_SUPPORTED);

        let status = svc
            .create_volume(Request::new(CreateVolumeRequest::default()))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_create_volume_idempotency_conflict() {
        let union = Arc::new(ScriptedUnion::default());
        *union.create.lock() = Some(UnionError::IdempotencyConflict("pvc-1".to_string()));

        let status = service(union)
            .create_volume(Request::new(create_request(&[])))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::AlreadyExists);
        assert!(status.message().starts_with("Failed to create volume pvc-1"));
    }

    #[tokio::test]
    async fn test_delete_volume_is_idempotent() {
        let union = Arc::new(ScriptedUnion::default());
        *union.delete.lock() = Some(UnionError::VolumeNotFound("pvc-1".to_string()));
        let svc = service(union.clone());
        let req = || {
            Request::new(DeleteVolumeRequest {
                volume_id: "pvc-1".to_string(),
                ..Default::default()
            })
        };
        assert!(svc.delete_volume(req()).await.is_ok());

        *union.delete.lock() = Some(UnionError::Internal("api down".to_string()));
        let status = svc.delete_volume(req()).await.unwrap_err();
        assert_eq!(status.code(), Code::Internal);
    }

    #[tokio::test]
    async fn test_publish_returns_host_path() {
        let response = service(Arc::new(ScriptedUnion::default()))
            .controller_publish_volume(Request::new(publish_request()))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(
            response.publish_context[PATH_PUBLISH_CONTEXT_KEY],
            "/var/lib/union-csi-driver.union.io/volumes/pvc-1/merged"
        );
    }

    #[tokio::test]
    async fn test_publish_error_mapping() {
        let union = Arc::new(ScriptedUnion::default());
        let svc = service(union.clone());

        *union.attach.lock() = Some(UnionError::VolumeInUse {
            volume_id: "pvc-1".to_string(),
            node_id: "node-b".to_string(),
        });
        let status = svc
            .controller_publish_volume(Request::new(publish_request()))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::FailedPrecondition);
        assert_eq!(
            status.message(),
            "Volume \"pvc-1\" cannot be attached at node \"node-a\", already attached at node \"node-b\""
        );

        *union.attach.lock() = Some(UnionError::NodeNotFound("node-a".to_string()));
        let status = svc
            .controller_publish_volume(Request::new(publish_request()))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::NotFound);

        *union.attach.lock() = Some(UnionError::WaitTimeout);
        let status = svc
            .controller_publish_volume(Request::new(publish_request()))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::Internal);

        let mut readonly = publish_request();
        readonly.readonly = true;
        let status = svc.controller_publish_volume(Request::new(readonly)).await.unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_unpublish() {
        let union = Arc::new(ScriptedUnion::default());
        let svc = service(union.clone());
        let req = |node_id: &str| {
            Request::new(ControllerUnpublishVolumeRequest {
                volume_id: "pvc-1".to_string(),
                node_id: node_id.to_string(),
                ..Default::default()
            })
        };

        let status = svc.controller_unpublish_volume(req("")).await.unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
        assert_eq!(status.message(), "nodeId is missing");

        *union.detach.lock() = Some(UnionError::AttachmentNotFound {
            volume_id: "pvc-1".to_string(),
            node_id: "node-a".to_string(),
        });
        assert!(svc.controller_unpublish_volume(req("node-a")).await.is_ok());

        *union.detach.lock() = Some(UnionError::VolumeNotFound("pvc-1".to_string()));
        let status = svc.controller_unpublish_volume(req("node-a")).await.unwrap_err();
        assert_eq!(status.code(), Code::NotFound);
    }

    #[tokio::test]
    async fn test_capabilities_and_unimplemented() {
        let svc = service(Arc::new(ScriptedUnion::default()));
        let caps = svc
            .controller_get_capabilities(Request::new(ControllerGetCapabilitiesRequest {}))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(caps.capabilities.len(), 2);

        let status = svc
            .list_volumes(Request::new(ListVolumesRequest::default()))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::Unimplemented);
        assert_eq!(status.message(), "Unimplemented ListVolumes method");
    }
}
