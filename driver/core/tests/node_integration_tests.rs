// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Node publish/unpublish tests over a fake mount table and a real
//! temporary directory tree.

use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tonic::{Code, Request};

use union_csi_driver_core::application::StandardMountManager;
use union_csi_driver_core::domain::mount::Mounter;
use union_csi_driver_core::infrastructure::mount::FakeMounter;
use union_csi_driver_core::presentation::grpc::csi::node_server::Node;
use union_csi_driver_core::presentation::grpc::csi::volume_capability::{access_mode, AccessMode, AccessType, MountVolume};
use union_csi_driver_core::presentation::grpc::csi::*;
use union_csi_driver_core::presentation::grpc::validation::{NodeCapabilities, NODE_CAPABILITIES, VOLUME_ACCESS_MODES};
use union_csi_driver_core::presentation::grpc::CsiNodeService;

struct Host {
    _dir: TempDir,
    merged: String,
    pods: String,
    mounter: Arc<FakeMounter>,
    service: CsiNodeService,
}

/// A merged view mounted at `<tmp>/merged`, as the attach pod leaves it
fn host() -> Host {
    let dir = tempfile::tempdir().unwrap();
    let base = std::fs::canonicalize(dir.path()).unwrap();
    let merged = base.join("merged");
    std::fs::create_dir(&merged).unwrap();

    let mounter = Arc::new(FakeMounter::new());
    mounter.add_mount(merged.to_str().unwrap(), "fuse.mergerfs", "1:2");

    let service = CsiNodeService::new(
        "node-a",
        Arc::new(StandardMountManager::new(mounter.clone())),
        NodeCapabilities::new(NODE_CAPABILITIES, VOLUME_ACCESS_MODES).unwrap(),
    );

    Host {
        _dir: dir,
        merged: merged.to_string_lossy().into_owned(),
        pods: base.join("pods").to_string_lossy().into_owned(),
        mounter,
        service,
    }
}

fn publish_request(source: &str, target: &str) -> NodePublishVolumeRequest {
    NodePublishVolumeRequest {
        volume_id: "v1".to_string(),
        publish_context: [("path".to_string(), source.to_string())].into(),
        target_path: target.to_string(),
        volume_capability: Some(VolumeCapability {
            access_mode: Some(AccessMode {
                mode: access_mode::Mode::SingleNodeWriter as i32,
            }),
            access_type: Some(AccessType::Mount(MountVolume {
                fs_type: "ext4".to_string(),
                mount_flags: vec!["noatime".to_string()],
                ..Default::default()
            })),
        }),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_publish_then_unpublish() {
    let host = host();
    let target = format!("{}/uid-1/volumes/v1/mount", host.pods);

    for _ in 0..2 {
        host.service
            .node_publish_volume(Request::new(publish_request(&host.merged, &target)))
            .await
            .unwrap();
    }
    assert!(Path::new(&target).is_dir());
    let mounts = host.mounter.list().await.unwrap();
    let bound = mounts.iter().find(|mp| mp.path == target).unwrap();
    assert_eq!(bound.fs_type, "fuse.mergerfs");
    assert_eq!(bound.options, vec!["bind", "noatime"]);

    for _ in 0..2 {
        host.service
            .node_unpublish_volume(Request::new(NodeUnpublishVolumeRequest {
                volume_id: "v1".to_string(),
                target_path: target.clone(),
            }))
            .await
            .unwrap();
    }
    assert!(!Path::new(&target).exists());
    assert!(host.mounter.list().await.unwrap().iter().all(|mp| mp.path != target));
}

#[tokio::test]
async fn test_publish_second_target_is_refused() {
    let host = host();
    let first = format!("{}/uid-1/mount", host.pods);
    let second = format!("{}/uid-2/mount", host.pods);

    host.service
        .node_publish_volume(Request::new(publish_request(&host.merged, &first)))
        .await
        .unwrap();
    let status = host
        .service
        .node_publish_volume(Request::new(publish_request(&host.merged, &second)))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Internal);
    assert!(!Path::new(&second).exists());
}

#[tokio::test]
async fn test_publish_requires_path_in_context() {
    let host = host();
    let mut request = publish_request(&host.merged, &format!("{}/uid-1/mount", host.pods));
    request.publish_context.clear();

    let status = host.service.node_publish_volume(Request::new(request)).await.unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn test_node_get_info() {
    let host = host();
    let info = host
        .service
        .node_get_info(Request::new(NodeGetInfoRequest {}))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(info.node_id, "node-a");
    assert_eq!(info.max_volumes_per_node, 0);
    assert!(info.accessible_topology.is_none());
}
