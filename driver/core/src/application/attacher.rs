// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Attacher Application Service
//!
//! Attaching a union volume to a node means running an attach pod there: the
//! pod consumes every lower claim, merges them and exposes the result on a
//! host path. The pod's observed state is the only record of an attachment.
//!
//! Attach observation, polled with bounded exponential backoff:
//! - pod not found: keep waiting (the store may lag behind the create)
//! - pod `Failed` / `Succeeded`: fail, the merge will never come up
//! - pod not scheduled or not `Running`: keep waiting
//! - pod running on the requested node: attached
//! - pod running on another node: `VolumeInUse` naming that node
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Attach/detach state machine over attach pods

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use crate::application::backoff::{exponential_backoff, Backoff};
use crate::application::context::CallContext;
use crate::domain::cluster::{ResourceKey, ResourceStore};
use crate::domain::errors::UnionError;
use crate::domain::resources::Pod;
use crate::domain::volume::{attach_pod_name, host_path, Volume, VolumeAttachment};
use crate::infrastructure::pod_factory::{AttachPodFactory, AttachPodRequest};

// ============================================================================
// Service Trait
// ============================================================================

#[async_trait]
pub trait Attacher: Send + Sync {
    /// Bring up the merged view of `volume` at `node_id` and wait for it
    async fn attach(
        &self,
        ctx: &CallContext,
        volume: &Volume,
        node_id: &str,
    ) -> Result<VolumeAttachment, UnionError>;

    /// Tear down the attachment of `volume` at `node_id` and wait for it to go
    async fn detach(&self, ctx: &CallContext, volume: &Volume, node_id: &str) -> Result<(), UnionError>;
}

// ============================================================================
// Standard Implementation
// ============================================================================

pub struct StandardAttacher {
    pods: Arc<dyn ResourceStore<Pod>>,
    factory: AttachPodFactory,
    attach_backoff: Backoff,
    detach_backoff: Backoff,
}

impl StandardAttacher {
    pub fn new(pods: Arc<dyn ResourceStore<Pod>>) -> Self {
        Self {
            pods,
            factory: AttachPodFactory::new(),
            attach_backoff: Backoff::attach(),
            detach_backoff: Backoff::detach(),
        }
    }

    /// Override the polling schedules
    pub fn with_backoff(mut self, attach: Backoff, detach: Backoff) -> Self {
        self.attach_backoff = attach;
        self.detach_backoff = detach;
        self
    }

    async fn wait_for_attach(
        &self,
        ctx: &CallContext,
        volume_id: &str,
        expected_node: &str,
        key: &ResourceKey,
    ) -> Result<String, UnionError> {
        exponential_backoff(ctx, self.attach_backoff, || {
            let pods = self.pods.clone();
            async move {
                let pod = match pods.get(key).await {
                    Ok(pod) => pod,
                    Err(e) if e.is_not_found() => {
                        debug!(pod = %key, "Attach pod not visible yet, continue waiting for attachment");
                        return Ok(None);
                    }
                    Err(e) => return Err(UnionError::Store(e)),
                };

                if pod.is_terminating() {
                    info!(pod = %key, volume_id = %volume_id, "Attach pod is terminating, stop waiting for attachment");
                    return Err(UnionError::Terminating {
                        pod: key.to_string(),
                        volume_id: volume_id.to_string(),
                    });
                }

                let node = match pod.node_name() {
                    Some(node) if pod.is_running() => node.to_string(),
                    _ => {
                        info!(
                            pod = %key,
                            volume_id = %volume_id,
                            "Attach pod is not running on a node yet, continue waiting for attachment"
                        );
                        return Ok(None);
                    }
                };

                if node != expected_node {
                    info!(
                        pod = %key,
                        volume_id = %volume_id,
                        node = %node,
                        expected = %expected_node,
                        "Attach pod is running on another node, stop waiting for attachment"
                    );
                    return Err(UnionError::VolumeInUse {
                        volume_id: volume_id.to_string(),
                        node_id: node,
                    });
                }

                Ok(Some(node))
            }
        })
        .await
    }

    async fn wait_for_detach(
        &self,
        ctx: &CallContext,
        volume_id: &str,
        expected_node: &str,
        key: &ResourceKey,
    ) -> Result<(), UnionError> {
        exponential_backoff(ctx, self.detach_backoff, || {
            let pods = self.pods.clone();
            async move {
                let pod = match pods.get(key).await {
                    Ok(pod) => pod,
                    Err(e) if e.is_not_found() => return Ok(Some(())),
                    Err(e) => return Err(UnionError::Store(e)),
                };

                if pod.node_name() != Some(expected_node) {
                    info!(
                        pod = %key,
                        volume_id = %volume_id,
                        node = ?pod.node_name(),
                        expected = %expected_node,
                        "Attach pod found on another node, stop waiting for detachment"
                    );
                    return Err(UnionError::AttachmentNotFound {
                        volume_id: volume_id.to_string(),
                        node_id: expected_node.to_string(),
                    });
                }

                info!(
                    pod = %key,
                    volume_id = %volume_id,
                    "Attach pod is not removed yet, continue waiting for detachment"
                );
                Ok(None)
            }
        })
        .await
    }
}

#[async_trait]
impl Attacher for StandardAttacher {
    async fn attach(
        &self,
        ctx: &CallContext,
        volume: &Volume,
        node_id: &str,
    ) -> Result<VolumeAttachment, UnionError> {
        let pod_name = attach_pod_name(&volume.volume_id);
        let key = ResourceKey::namespaced(&volume.namespace, &pod_name);
        let host_path = host_path(&volume.volume_id);

        match self.pods.get(&key).await {
            Ok(_) => {
                info!(pod = %key, volume_id = %volume.volume_id, "Attach pod already exists");
            }
            Err(e) if e.is_not_found() => {
                let pod = self.factory.build(&AttachPodRequest {
                    pod_name: &pod_name,
                    namespace: &volume.namespace,
                    volume_id: &volume.volume_id,
                    claim_names: &volume.claim_names,
                    host_path: &host_path,
                    node_id,
                });
                match self.pods.create(&pod).await {
                    Ok(_) => info!(
                        pod = %key,
                        volume_id = %volume.volume_id,
                        node_id = %node_id,
                        "Created attach pod"
                    ),
                    Err(e) if e.is_already_exists() => {
                        info!(pod = %key, volume_id = %volume.volume_id, "Attach pod already exists")
                    }
                    Err(e) => return Err(UnionError::Store(e)),
                }
            }
            Err(e) => return Err(UnionError::Store(e)),
        }

        info!(volume_id = %volume.volume_id, node_id = %node_id, "Start waiting for attachment");
        let node = self
            .wait_for_attach(ctx, &volume.volume_id, node_id, &key)
            .await?;

        Ok(VolumeAttachment {
            volume_id: volume.volume_id.clone(),
            node_id: node,
            host_path,
        })
    }

    async fn detach(&self, ctx: &CallContext, volume: &Volume, node_id: &str) -> Result<(), UnionError> {
        let pod_name = attach_pod_name(&volume.volume_id);
        let key = ResourceKey::namespaced(&volume.namespace, &pod_name);
        let not_attached = || UnionError::AttachmentNotFound {
            volume_id: volume.volume_id.clone(),
            node_id: node_id.to_string(),
        };

        let pod = match self.pods.get(&key).await {
            Ok(pod) => pod,
            Err(e) if e.is_not_found() => {
                info!(pod = %key, volume_id = %volume.volume_id, "Attach pod does not exist");
                return Err(not_attached());
            }
            Err(e) => return Err(UnionError::Store(e)),
        };

        match pod.node_name() {
            None => {
                info!(
                    pod = %key,
                    volume_id = %volume.volume_id,
                    "Attach pod is not scheduled on a node yet, will not attempt to delete"
                );
                return Err(not_attached());
            }
            Some(node) if node != node_id => {
                info!(
                    pod = %key,
                    volume_id = %volume.volume_id,
                    node = %node,
                    expected = %node_id,
                    "Attach pod found on another node, will not attempt to delete"
                );
                return Err(not_attached());
            }
            Some(_) => {}
        }

        if !pod.is_being_deleted() {
            match self.pods.delete(&key).await {
                Ok(()) => info!(
                    pod = %key,
                    volume_id = %volume.volume_id,
                    node_id = %node_id,
                    "Deleted attach pod"
                ),
                Err(e) if e.is_not_found() => {
                    info!(pod = %key, volume_id = %volume.volume_id, "Attach pod does not exist");
                    return Err(not_attached());
                }
                Err(e) => return Err(UnionError::Store(e)),
            }
        }

        info!(volume_id = %volume.volume_id, node_id = %node_id, "Start waiting for detachment");
        self.wait_for_detach(ctx, &volume.volume_id, node_id, &key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::resources::{PodPhase, PodStatus};
    use crate::domain::volume::ClaimAccessMode;
    use crate::infrastructure::kube::memory::InMemoryStore;
    use std::time::Duration;

    fn fast() -> Backoff {
        Backoff {
            duration: Duration::from_millis(2),
            factor: 1.5,
            steps: 12,
        }
    }

    fn volume() -> Volume {
        Volume {
            volume_id: "v1".to_string(),
            capacity_bytes: 1024,
            access_modes: vec![ClaimAccessMode::ReadWriteOnce],
            namespace: "union".to_string(),
            claim_names: vec!["v1-lower0".to_string(), "v1-lower1".to_string()],
            storage_class_name: None,
        }
    }

    fn pod_key() -> ResourceKey {
        ResourceKey::namespaced("union", attach_pod_name("v1"))
    }

    fn attacher() -> (Arc<InMemoryStore<Pod>>, StandardAttacher) {
        let pods = Arc::new(InMemoryStore::<Pod>::new());
        let attacher = StandardAttacher::new(pods.clone()).with_backoff(fast(), fast());
        (pods, attacher)
    }

    fn seeded_pod(node: Option<&str>, phase: PodPhase) -> Pod {
        let claims = volume().claim_names;
        let mut pod = AttachPodFactory::new().build(&AttachPodRequest {
            pod_name: &attach_pod_name("v1"),
            namespace: "union",
            volume_id: "v1",
            claim_names: &claims,
            host_path: &host_path("v1"),
            node_id: node.unwrap_or("node-a"),
        });
        pod.spec.node_name = node.map(str::to_string);
        pod.status = Some(PodStatus { phase });
        pod
    }

    /// Mark the attach pod as running on `node` once it shows up
    fn schedule_when_created(pods: Arc<InMemoryStore<Pod>>, node: &'static str) {
        tokio::spawn(async move {
            loop {
                if let Ok(mut pod) = pods.get(&pod_key()).await {
                    pod.spec.node_name = Some(node.to_string());
                    pod.status = Some(PodStatus { phase: PodPhase::Running });
                    pods.upsert(pod);
                    return;
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        });
    }

    #[tokio::test]
    async fn test_attach_creates_pod_and_waits_until_running() {
        let (pods, attacher) = attacher();
        schedule_when_created(pods.clone(), "node-a");

        let attachment = attacher
            .attach(&CallContext::background(), &volume(), "node-a")
            .await
            .unwrap();
        assert_eq!(attachment.volume_id, "v1");
        assert_eq!(attachment.node_id, "node-a");
        assert_eq!(attachment.host_path, host_path("v1"));

        let pod = pods.get(&pod_key()).await.unwrap();
        assert_eq!(pod.spec.node_selector["kubernetes.io/hostname"], "node-a");
    }

    #[tokio::test]
    async fn test_attach_is_idempotent_for_running_pod() {
        let (pods, attacher) = attacher();
        pods.upsert(seeded_pod(Some("node-a"), PodPhase::Running));

        let ctx = CallContext::background();
        let first = attacher.attach(&ctx, &volume(), "node-a").await.unwrap();
        let second = attacher.attach(&ctx, &volume(), "node-a").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(pods.len(), 1);
    }

    #[tokio::test]
    async fn test_attach_elsewhere_reports_volume_in_use() {
        let (pods, attacher) = attacher();
        pods.upsert(seeded_pod(Some("node-b"), PodPhase::Running));

        let err = attacher
            .attach(&CallContext::background(), &volume(), "node-a")
            .await
            .unwrap_err();
        assert!(matches!(err, UnionError::VolumeInUse { ref node_id, .. } if node_id == "node-b"));
    }

    #[tokio::test]
    async fn test_attach_fails_on_terminated_pod() {
        let (pods, attacher) = attacher();
        pods.upsert(seeded_pod(Some("node-a"), PodPhase::Failed));

        let err = attacher
            .attach(&CallContext::background(), &volume(), "node-a")
            .await
            .unwrap_err();
        assert!(matches!(err, UnionError::Terminating { .. }));
    }

    #[tokio::test]
    async fn test_attach_times_out_when_never_scheduled() {
        let pods = Arc::new(InMemoryStore::<Pod>::new());
        let short = Backoff {
            duration: Duration::from_millis(1),
            factor: 1.0,
            steps: 3,
        };
        let attacher = StandardAttacher::new(pods.clone()).with_backoff(short, short);

        let err = attacher
            .attach(&CallContext::background(), &volume(), "node-a")
            .await
            .unwrap_err();
        assert!(matches!(err, UnionError::WaitTimeout));
        assert_eq!(pods.len(), 1, "pod is left for a later retry");
    }

    #[tokio::test]
    async fn test_attach_observes_cancellation() {
        let (_, attacher) = attacher();
        let ctx = CallContext::background();
        ctx.cancel();
        let err = attacher.attach(&ctx, &volume(), "node-a").await.unwrap_err();
        assert!(matches!(err, UnionError::Cancelled));
    }

    #[tokio::test]
    async fn test_detach_deletes_pod_and_waits_until_gone() {
        let (pods, attacher) = attacher();
        pods.upsert(seeded_pod(Some("node-a"), PodPhase::Running));

        attacher
            .detach(&CallContext::background(), &volume(), "node-a")
            .await
            .unwrap();
        assert!(pods.is_empty());
    }

    #[tokio::test]
    async fn test_detach_without_pod_is_attachment_not_found() {
        let (_, attacher) = attacher();
        let err = attacher
            .detach(&CallContext::background(), &volume(), "node-a")
            .await
            .unwrap_err();
        assert!(err.is_attachment_not_found());
    }

    #[tokio::test]
    async fn test_detach_leaves_unscheduled_or_foreign_pods_alone() {
        let (pods, attacher) = attacher();
        let ctx = CallContext::background();

        pods.upsert(seeded_pod(None, PodPhase::Pending));
        let err = attacher.detach(&ctx, &volume(), "node-a").await.unwrap_err();
        assert!(err.is_attachment_not_found());
        assert_eq!(pods.len(), 1);

        pods.upsert(seeded_pod(Some("node-b"), PodPhase::Running));
        let err = attacher.detach(&ctx, &volume(), "node-a").await.unwrap_err();
        assert!(err.is_attachment_not_found());
        assert_eq!(pods.len(), 1);
    }

    #[tokio::test]
    async fn test_detach_waits_out_pending_deletion() {
        let (pods, attacher) = attacher();
        let mut pod = seeded_pod(Some("node-a"), PodPhase::Running);
        pod.metadata.deletion_timestamp = Some("2026-01-01T00:00:00Z".to_string());
        pods.upsert(pod);

        let remover = pods.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            remover.delete(&pod_key()).await.unwrap();
        });

        attacher
            .detach(&CallContext::background(), &volume(), "node-a")
            .await
            .unwrap();
        assert!(pods.is_empty());
    }
}
