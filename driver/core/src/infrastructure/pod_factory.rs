// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Attach Pod Factory
//!
//! Builds the pod that performs the union merge on a node. The pod mounts
//! every lower claim under `/volume/{id}/branches/`, merges them with
//! mergerfs into `/volume/{id}/merged`, and propagates that mount back to the
//! host through a bidirectional hostPath volume.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Attach pod manifest construction

use std::collections::BTreeMap;

use crate::domain::cluster::ObjectMeta;
use crate::domain::resources::{
    ClaimVolumeSource, Container, HostPathVolumeSource, Pod, PodSpec, PodVolume, SecurityContext,
    VolumeMount,
};

/// mergerfs-wrapped image the attach pod runs
pub const MERGE_IMAGE: &str = "docker.io/on2e/gogomergerfs:demo-mergerfs2.37.1";

pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY_VALUE: &str = "union-csi-driver";
pub const VOLUME_ID_LABEL: &str = "union.io/volume-id";
pub const HOSTNAME_LABEL: &str = "kubernetes.io/hostname";

const CONTAINER_NAME: &str = "gogomergerfs";
const TARGET_VOLUME: &str = "target";

/// Everything needed to render one attach pod
#[derive(Debug, Clone)]
pub struct AttachPodRequest<'a> {
    pub pod_name: &'a str,
    pub namespace: &'a str,
    pub volume_id: &'a str,
    pub claim_names: &'a [String],
    pub host_path: &'a str,
    pub node_id: &'a str,
}

#[derive(Debug, Clone)]
pub struct AttachPodFactory {
    image: String,
}

impl AttachPodFactory {
    pub fn new() -> Self {
        Self {
            image: MERGE_IMAGE.to_string(),
        }
    }

    pub fn build(&self, request: &AttachPodRequest<'_>) -> Pod {
        let container_path = format!("/volume/{}", request.volume_id);

        let mut volumes = Vec::with_capacity(request.claim_names.len() + 1);
        let mut mounts = Vec::with_capacity(request.claim_names.len() + 1);

        for (index, claim_name) in request.claim_names.iter().enumerate() {
            // Branch dirs must not start with the claim name: mergerfs strips the
            // common branch prefix when naming the union device
            let volume_name = format!("branch{}", index);
            mounts.push(VolumeMount {
                name: volume_name.clone(),
                mount_path: format!("{}/branches/{}-{}", container_path, volume_name, claim_name),
                mount_propagation: None,
            });
            volumes.push(PodVolume {
                name: volume_name,
                persistent_volume_claim: Some(ClaimVolumeSource {
                    claim_name: claim_name.clone(),
                }),
                host_path: None,
            });
        }

        volumes.push(PodVolume {
            name: TARGET_VOLUME.to_string(),
            persistent_volume_claim: None,
            host_path: Some(HostPathVolumeSource {
                path: request.host_path.to_string(),
                path_type: Some("DirectoryOrCreate".to_string()),
            }),
        });
        mounts.push(VolumeMount {
            name: TARGET_VOLUME.to_string(),
            mount_path: format!("{}/merged", container_path),
            mount_propagation: Some("Bidirectional".to_string()),
        });

        let command = format!(
            "gogomergerfs mergerfs --branches={}/branches/\\* --target={}/merged --block",
            container_path, container_path
        );

        let mut metadata = ObjectMeta::namespaced(request.namespace, request.pod_name);
        metadata
            .labels
            .insert(MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string());
        metadata
            .labels
            .insert(VOLUME_ID_LABEL.to_string(), request.volume_id.to_string());

        let mut node_selector = BTreeMap::new();
        node_selector.insert(HOSTNAME_LABEL.to_string(), request.node_id.to_string());

        Pod::new(
            metadata,
            PodSpec {
                containers: vec![Container {
                    name: CONTAINER_NAME.to_string(),
                    image: self.image.clone(),
                    image_pull_policy: Some("Always".to_string()),
                    command: vec!["/bin/sh".to_string()],
                    args: vec!["-c".to_string(), command],
                    volume_mounts: mounts,
                    security_context: Some(SecurityContext {
                        privileged: Some(true),
                    }),
                }],
                volumes,
                node_selector,
                node_name: None,
            },
        )
    }
}

impl Default for AttachPodFactory {
    fn default() -> Self {
        Self::new()
    }
}
