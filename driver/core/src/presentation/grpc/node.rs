// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! CSI Node Service
//!
//! Node-local half of the driver. `NodePublishVolume` bind-mounts the merged
//! view named by the publish context into the workload target path;
//! `NodeUnpublishVolume` removes it. Staging and the remaining node
//! operations are not offered.
//!
//! # Architecture
//!
//! - **Layer:** Presentation Layer
//! - **Purpose:** CSI Node gRPC service

use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::info;

use crate::application::mount_manager::MountManager;
use crate::domain::mount::PublishOptions;
use crate::presentation::grpc::controller::{BLOCK_NOT_SUPPORTED, PATH_PUBLISH_CONTEXT_KEY};
use crate::presentation::grpc::csi::node_server::{Node, NodeServer};
use crate::presentation::grpc::csi::volume_capability::AccessType;
use crate::presentation::grpc::csi::*;
use crate::presentation::grpc::logging::logged;
use crate::presentation::grpc::validation::NodeCapabilities;

pub struct CsiNodeService {
    node_id: String,
    mount_manager: Arc<dyn MountManager>,
    capabilities: NodeCapabilities,
}

impl CsiNodeService {
    pub fn new(node_id: impl Into<String>, mount_manager: Arc<dyn MountManager>, capabilities: NodeCapabilities) -> Self {
        Self {
            node_id: node_id.into(),
            mount_manager,
            capabilities,
        }
    }

    /// Create a gRPC server instance
    pub fn into_server(self) -> NodeServer<Self> {
        NodeServer::new(self)
    }
}

fn unimplemented(method: &str) -> Status {
    Status::unimplemented(format!("Unimplemented {} method", method))
}

#[tonic::async_trait]
impl Node for CsiNodeService {
    async fn node_stage_volume(
        &self,
        request: Request<NodeStageVolumeRequest>,
    ) -> Result<Response<NodeStageVolumeResponse>, Status> {
        logged("NodeStageVolume", request, |_| async { Err(unimplemented("NodeStageVolume")) }).await
    }

    async fn node_unstage_volume(
        &self,
        request: Request<NodeUnstageVolumeRequest>,
    ) -> Result<Response<NodeUnstageVolumeResponse>, Status> {
        logged("NodeUnstageVolume", request, |_| async {
            Err(unimplemented("NodeUnstageVolume"))
        })
        .await
    }

    async fn node_publish_volume(
        &self,
        request: Request<NodePublishVolumeRequest>,
    ) -> Result<Response<NodePublishVolumeResponse>, Status> {
        logged("NodePublishVolume", request, move |request| async move {
            let req = request.into_inner();
            self.capabilities.validate_node_publish_volume(&req)?;
            let (volume_id, target) = (req.volume_id.as_str(), req.target_path.as_str());

            if req.publish_context.is_empty() {
                return Err(Status::invalid_argument("publishContext is missing"));
            }
            let source = req.publish_context.get(PATH_PUBLISH_CONTEXT_KEY).ok_or_else(|| {
                Status::invalid_argument(format!(
                    "Missing publishContext key: {:?}",
                    PATH_PUBLISH_CONTEXT_KEY
                ))
            })?;

            let options = match req.volume_capability.as_ref().and_then(|c| c.access_type.as_ref()) {
                Some(AccessType::Mount(mount)) => PublishOptions {
                    fs_type: mount.fs_type.clone(),
                    read_only: req.readonly,
                    mount_flags: mount.mount_flags.clone(),
                },
                // Field validation guarantees an access type
                Some(AccessType::Block(_)) | None => {
                    return Err(Status::invalid_argument(BLOCK_NOT_SUPPORTED));
                }
            };

            info!(volume_id, target_path = target, "NodePublishVolume: mounting");
            self.mount_manager
                .publish(source, target, &options)
                .await
                .map_err(|e| {
                    Status::internal(format!(
                        "Failed to mount volume {} at path {}: {}",
                        volume_id, target, e
                    ))
                })?;
            info!(volume_id, target_path = target, "NodePublishVolume: mounted");

            Ok(Response::new(NodePublishVolumeResponse {}))
        })
        .await
    }

    async fn node_unpublish_volume(
        &self,
        request: Request<NodeUnpublishVolumeRequest>,
    ) -> Result<Response<NodeUnpublishVolumeResponse>, Status> {
        logged("NodeUnpublishVolume", request, move |request| async move {
            let req = request.into_inner();
            self.capabilities.validate_node_unpublish_volume(&req)?;
            let (volume_id, target) = (req.volume_id.as_str(), req.target_path.as_str());

            info!(volume_id, target_path = target, "NodeUnpublishVolume: unmounting");
            self.mount_manager.unpublish(target).await.map_err(|e| {
                Status::internal(format!(
                    "Failed to unmount volume {} at path {}: {}",
                    volume_id, target, e
                ))
            })?;
            info!(volume_id, target_path = target, "NodeUnpublishVolume: unmounted");

            Ok(Response::new(NodeUnpublishVolumeResponse {}))
        })
        .await
    }

    async fn node_get_volume_stats(
        &self,
        request: Request<NodeGetVolumeStatsRequest>,
    ) -> Result<Response<NodeGetVolumeStatsResponse>, Status> {
        logged("NodeGetVolumeStats", request, |_| async {
            Err(unimplemented("NodeGetVolumeStats"))
        })
        .await
    }

    async fn node_expand_volume(
        &self,
        request: Request<NodeExpandVolumeRequest>,
    ) -> Result<Response<NodeExpandVolumeResponse>, Status> {
        logged("NodeExpandVolume", request, |_| async { Err(unimplemented("NodeExpandVolume")) }).await
    }

    async fn node_get_capabilities(
        &self,
        request: Request<NodeGetCapabilitiesRequest>,
    ) -> Result<Response<NodeGetCapabilitiesResponse>, Status> {
        logged("NodeGetCapabilities", request, move |_| async move {
            Ok(Response::new(NodeGetCapabilitiesResponse {
                capabilities: self.capabilities.capabilities(),
            }))
        })
        .await
    }

    async fn node_get_info(
        &self,
        request: Request<NodeGetInfoRequest>,
    ) -> Result<Response<NodeGetInfoResponse>, Status> {
        logged("NodeGetInfo", request, move |_| async move {
            Ok(Response::new(NodeGetInfoResponse {
                node_id: self.node_id.clone(),
                max_volumes_per_node: 0,
                accessible_topology: None,
            }))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mount::MountError;
    use crate::presentation::grpc::csi::volume_capability::access_mode::Mode;
    use crate::presentation::grpc::csi::volume_capability::{AccessMode, BlockVolume, MountVolume};
    use crate::presentation::grpc::validation::{NODE_CAPABILITIES, VOLUME_ACCESS_MODES};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use tonic::Code;

    #[derive(Default)]
    struct RecordingMountManager {
        published: Mutex<Vec<(String, String, PublishOptions)>>,
        unpublished: Mutex<Vec<String>>,
        fail: Mutex<bool>,
    }

    #[async_trait]
    impl MountManager for RecordingMountManager {
        async fn publish(&self, source: &str, target: &str, options: &PublishOptions) -> Result<(), MountError> {
            if *self.fail.lock() {
                return Err(MountError::TargetBusy(target.to_string()));
            }
            self.published
                .lock()
                .push((source.to_string(), target.to_string(), options.clone()));
            Ok(())
        }

        async fn unpublish(&self, target: &str) -> Result<(), MountError> {
            if *self.fail.lock() {
                return Err(MountError::Command {
                    command: format!("umount {}", target),
                    output: "target is busy".to_string(),
                });
            }
            self.unpublished.lock().push(target.to_string());
            Ok(())
        }
    }

    fn service(manager: Arc<RecordingMountManager>) -> CsiNodeService {
        CsiNodeService::new(
            "node-a",
            manager,
            NodeCapabilities::new(NODE_CAPABILITIES, VOLUME_ACCESS_MODES).unwrap(),
        )
    }

    fn publish_request() -> NodePublishVolumeRequest {
        let mut publish_context = HashMap::new();
        publish_context.insert(
            PATH_PUBLISH_CONTEXT_KEY.to_string(),
            "/var/lib/union-csi-driver.union.io/volumes/pvc-1/merged".to_string(),
        );
        NodePublishVolumeRequest {
            volume_id: "pvc-1".to_string(),
            publish_context,
            target_path: "/var/lib/kubelet/pods/uid/volumes/kubernetes.io~csi/pvc-1/mount".to_string(),
            volume_capability: Some(VolumeCapability {
                access_type: Some(AccessType::Mount(MountVolume {
                    fs_type: "ext4".to_string(),
                    mount_flags: vec!["noatime".to_string()],
                    ..Default::default()
                })),
                access_mode: Some(AccessMode {
                    mode: Mode::SingleNodeWriter as i32,
                }),
            }),
            readonly: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_publish_passes_mount_options() {
        let manager = Arc::new(RecordingMountManager::default());
        service(manager.clone())
            .node_publish_volume(Request::new(publish_request()))
            .await
            .unwrap();

        let published = manager.published.lock();
        let (source, target, options) = &published[0];
        assert_eq!(source, "/var/lib/union-csi-driver.union.io/volumes/pvc-1/merged");
        assert!(target.ends_with("/pvc-1/mount"));
        assert_eq!(
            options,
            &PublishOptions {
                fs_type: "ext4".to_string(),
                read_only: true,
                mount_flags: vec!["noatime".to_string()],
            }
        );
    }

    #[tokio::test]
    async fn test_publish_context_checks() {
        let svc = service(Arc::new(RecordingMountManager::default()));

        let mut req = publish_request();
        req.publish_context.clear();
        let status = svc.node_publish_volume(Request::new(req)).await.unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
        assert_eq!(status.message(), "publishContext is missing");

        let mut req = publish_request();
        req.publish_context.clear();
        req.publish_context.insert("other".to_string(), "x".to_string());
        let status = svc.node_publish_volume(Request::new(req)).await.unwrap_err();
        assert_eq!(status.message(), "Missing publishContext key: \"path\"");
    }

    #[tokio::test]
    async fn test_publish_rejects_block_and_invalid_requests() {
        let svc = service(Arc::new(RecordingMountManager::default()));

        let mut req = publish_request();
        if let Some(capability) = req.volume_capability.as_mut() {
            capability.access_type = Some(AccessType::Block(BlockVolume {}));
        }
        let status = svc.node_publish_volume(Request::new(req)).await.unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
        assert_eq!(status.message(), BLOCK_NOT_SUPPORTED);

        let mut req = publish_request();
        req.target_path = "relative".to_string();
        let status = svc.node_publish_volume(Request::new(req)).await.unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_mount_failures_are_internal() {
        let manager = Arc::new(RecordingMountManager::default());
        *manager.fail.lock() = true;
        let svc = service(manager);

        let status = svc
            .node_publish_volume(Request::new(publish_request()))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::Internal);
        assert!(status.message().starts_with("Failed to mount volume pvc-1 at path "));

        let status = svc
            .node_unpublish_volume(Request::new(NodeUnpublishVolumeRequest {
                volume_id: "pvc-1".to_string(),
                target_path: "/target".to_string(),
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::Internal);
        assert!(status.message().starts_with("Failed to unmount volume pvc-1 at path /target"));
    }

    #[tokio::test]
    async fn test_unpublish_and_info() {
        let manager = Arc::new(RecordingMountManager::default());
        let svc = service(manager.clone());

        svc.node_unpublish_volume(Request::new(NodeUnpublishVolumeRequest {
            volume_id: "pvc-1".to_string(),
            target_path: "/target".to_string(),
        }))
        .await
        .unwrap();
        assert_eq!(*manager.unpublished.lock(), vec!["/target".to_string()]);

        let info = svc
            .node_get_info(Request::new(NodeGetInfoRequest {}))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(info.node_id, "node-a");
        assert_eq!(info.max_volumes_per_node, 0);

        let caps = svc
            .node_get_capabilities(Request::new(NodeGetCapabilitiesRequest {}))
            .await
            .unwrap()
            .into_inner();
        assert!(caps.capabilities.is_empty());

        let status = svc
            .node_stage_volume(Request::new(NodeStageVolumeRequest::default()))
            .await
            .unwrap_err();
        assert_eq!(status.message(), "Unimplemented NodeStageVolume method");
    }
}
