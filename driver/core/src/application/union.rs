// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Union Orchestrator Application Service
//!
//! Composes the splitter, the attacher and lower claim management into the
//! four lower-level operations the controller service exposes. Domain errors
//! from the collaborators pass through unchanged.
//!
//! Deletion removes the lower claims before the split plan, so a crash
//! midway leaves the plan behind as the anchor for a retried delete.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Logical volume lifecycle over lower cluster resources

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::attacher::Attacher;
use crate::application::context::CallContext;
use crate::application::splitter::Splitter;
use crate::domain::cluster::{ObjectMeta, Quantity, ResourceKey, ResourceList, ResourceStore, RESOURCE_STORAGE};
use crate::domain::errors::UnionError;
use crate::domain::resources::{Node, PersistentVolumeClaim, PersistentVolumeClaimSpec};
use crate::domain::split::{ClaimSplit, VolumeSplit, VolumeSplitSpec};
use crate::domain::volume::{claim_access_modes, CreateLowerOptions, Volume, VolumeAttachment};

// ============================================================================
// Service Trait
// ============================================================================

#[async_trait]
pub trait UnionService: Send + Sync {
    /// Plan and create the lower claims of a new union volume
    async fn create_lower(&self, volume_name: &str, options: &CreateLowerOptions) -> Result<Volume, UnionError>;

    /// Delete the lower claims and then the split plan of a volume
    async fn delete_lower(&self, volume_id: &str) -> Result<(), UnionError>;

    async fn attach_lower(
        &self,
        ctx: &CallContext,
        volume_id: &str,
        node_id: &str,
    ) -> Result<VolumeAttachment, UnionError>;

    async fn detach_lower(&self, ctx: &CallContext, volume_id: &str, node_id: &str) -> Result<(), UnionError>;
}

// ============================================================================
// Standard Implementation
// ============================================================================

pub struct StandardUnionService {
    splitter: Arc<dyn Splitter>,
    attacher: Arc<dyn Attacher>,
    claims: Arc<dyn ResourceStore<PersistentVolumeClaim>>,
    nodes: Arc<dyn ResourceStore<Node>>,
}

impl StandardUnionService {
    pub fn new(
        splitter: Arc<dyn Splitter>,
        attacher: Arc<dyn Attacher>,
        claims: Arc<dyn ResourceStore<PersistentVolumeClaim>>,
        nodes: Arc<dyn ResourceStore<Node>>,
    ) -> Self {
        Self {
            splitter,
            attacher,
            claims,
            nodes,
        }
    }

    async fn create_lower_from_split(&self, split: &VolumeSplit) -> Result<(), UnionError> {
        if split.spec.splits.is_empty() {
            return Err(UnionError::InvalidSplit {
                split: split.metadata.name.clone(),
                reason: "unable to create lower claim(s) because splits is empty".to_string(),
            });
        }

        let total = split.spec.splits.len();
        for (index, claim_split) in split.spec.splits.iter().enumerate() {
            if self.create_lower_claim(split, claim_split).await? {
                info!(
                    claim = %format!("{}/{}", split.spec.namespace, claim_split.claim_name),
                    "Created lower claim ({}/{})",
                    index + 1,
                    total
                );
            }
        }
        Ok(())
    }

    /// Returns whether the claim was newly created
    async fn create_lower_claim(&self, split: &VolumeSplit, claim_split: &ClaimSplit) -> Result<bool, UnionError> {
        let key = ResourceKey::namespaced(&split.spec.namespace, &claim_split.claim_name);

        match self.claims.get(&key).await {
            Ok(_) => {
                // Pre-existing claims are accepted as-is; their spec is not checked against the plan
                info!(claim = %key, split = %split.metadata.name, "Lower claim already exists");
                return Ok(false);
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(UnionError::Store(e)),
        }

        let claim = PersistentVolumeClaim::new(
            ObjectMeta::namespaced(&split.spec.namespace, &claim_split.claim_name),
            PersistentVolumeClaimSpec {
                access_modes: split.spec.access_modes.clone(),
                resources: claim_split.resources.clone(),
                storage_class_name: split.spec.storage_class_name.clone(),
            },
        );

        match self.claims.create(&claim).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_already_exists() => {
                info!(claim = %key, split = %split.metadata.name, "Lower claim already exists");
                Ok(false)
            }
            Err(e) => {
                warn!(claim = %key, error = %e, "Failed to create lower claim");
                Err(UnionError::Store(e))
            }
        }
    }

    async fn delete_lower_from_split(&self, split: &VolumeSplit) -> Result<(), UnionError> {
        let total = split.spec.splits.len();
        for (index, claim_split) in split.spec.splits.iter().enumerate() {
            let key = ResourceKey::namespaced(&split.spec.namespace, &claim_split.claim_name);
            match self.claims.delete(&key).await {
                Ok(()) => info!(claim = %key, "Deleted lower claim ({}/{})", index + 1, total),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(UnionError::Store(e)),
            }
        }
        Ok(())
    }

    /// Resolve the volume and check the node exists
    async fn resolve(&self, volume_id: &str, node_id: &str) -> Result<Volume, UnionError> {
        let split = self.splitter.get_split(volume_id).await?;

        match self.nodes.get(&ResourceKey::cluster(node_id)).await {
            Ok(_) => Ok(Volume::from(&split)),
            Err(e) if e.is_not_found() => Err(UnionError::NodeNotFound(node_id.to_string())),
            Err(e) => Err(UnionError::Store(e)),
        }
    }
}

#[async_trait]
impl UnionService for StandardUnionService {
    async fn create_lower(&self, volume_name: &str, options: &CreateLowerOptions) -> Result<Volume, UnionError> {
        let access_modes = claim_access_modes(&options.access_modes)?;

        let mut capacity_total = ResourceList::new();
        capacity_total.insert(
            RESOURCE_STORAGE.to_string(),
            Quantity::from_bytes(options.capacity_bytes),
        );

        let spec = VolumeSplitSpec {
            volume_name: volume_name.to_string(),
            capacity_total,
            access_modes,
            namespace: options.lower_namespace.clone(),
            storage_class_name: options.lower_storage_class_name.clone(),
            splits: Vec::new(),
        };

        let split = self.splitter.create_split(volume_name, &spec).await?;
        self.create_lower_from_split(&split).await?;

        // Bound capacity of the lower claims is not tracked yet
        let mut volume = Volume::from(&split);
        volume.capacity_bytes = 0;
        Ok(volume)
    }

    async fn delete_lower(&self, volume_id: &str) -> Result<(), UnionError> {
        let split = self.splitter.get_split(volume_id).await?;
        self.delete_lower_from_split(&split).await?;
        self.splitter.delete_split(volume_id).await
    }

    async fn attach_lower(
        &self,
        ctx: &CallContext,
        volume_id: &str,
        node_id: &str,
    ) -> Result<VolumeAttachment, UnionError> {
        let volume = self.resolve(volume_id, node_id).await?;
        self.attacher.attach(ctx, &volume, node_id).await
    }

    async fn detach_lower(&self, ctx: &CallContext, volume_id: &str, node_id: &str) -> Result<(), UnionError> {
        let volume = self.resolve(volume_id, node_id).await?;
        self.attacher.detach(ctx, &volume, node_id).await
    }
}
