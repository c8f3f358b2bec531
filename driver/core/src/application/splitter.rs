// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Splitter Application Service
//!
//! Decides how a union volume decomposes into lower claims and persists that
//! decision as a `VolumeSplit`. Creation is create-or-validate: an existing
//! plan (found up front or after losing a create race) is returned only if
//! the new request is compatible with it.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Idempotent split plan persistence

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::cluster::{ResourceKey, ResourceStore, StoreError, RESOURCE_STORAGE};
use crate::domain::errors::UnionError;
use crate::domain::resources::ResourceRequirements;
use crate::domain::split::{split_capacity, ClaimSplit, VolumeSplit, VolumeSplitSpec};
use crate::domain::volume::{claim_name, split_name};

// ============================================================================
// Service Trait
// ============================================================================

#[async_trait]
pub trait Splitter: Send + Sync {
    /// Create the split plan for `volume_id`, or return a compatible existing one
    async fn create_split(
        &self,
        volume_id: &str,
        spec: &VolumeSplitSpec,
    ) -> Result<VolumeSplit, UnionError>;

    /// Delete the split plan; `VolumeNotFound` if there is none
    async fn delete_split(&self, volume_id: &str) -> Result<(), UnionError>;

    async fn get_split(&self, volume_id: &str) -> Result<VolumeSplit, UnionError>;
}

// ============================================================================
// Standard Implementation
// ============================================================================

pub struct StandardSplitter {
    store: Arc<dyn ResourceStore<VolumeSplit>>,
    claim_name_prefix: Option<String>,
}

impl StandardSplitter {
    pub fn new(store: Arc<dyn ResourceStore<VolumeSplit>>) -> Self {
        Self {
            store,
            claim_name_prefix: None,
        }
    }

    /// Prefix every lower claim name with `prefix`
    pub fn with_claim_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.claim_name_prefix = if prefix.is_empty() { None } else { Some(prefix) };
        self
    }

    fn build_split(&self, name: &str, spec: &VolumeSplitSpec) -> VolumeSplit {
        let mut spec = spec.clone();
        spec.splits = split_capacity(spec.capacity_bytes())
            .into_iter()
            .enumerate()
            .map(|(index, share)| {
                let mut requirements = ResourceRequirements::default();
                requirements.requests.insert(RESOURCE_STORAGE.to_string(), share);
                ClaimSplit {
                    claim_name: claim_name(
                        self.claim_name_prefix.as_deref(),
                        &spec.volume_name,
                        index,
                    ),
                    resources: requirements,
                }
            })
            .collect();
        VolumeSplit::new(name, spec)
    }

    async fn do_create_split(
        &self,
        volume_id: &str,
        name: &str,
        spec: &VolumeSplitSpec,
    ) -> Result<VolumeSplit, StoreError> {
        let split = self.build_split(name, spec);
        match self.store.create(&split).await {
            Ok(created) => {
                info!(split = %name, volume_id = %volume_id, "Created VolumeSplit");
                Ok(created)
            }
            Err(e) if e.is_already_exists() => {
                info!(split = %name, volume_id = %volume_id, "VolumeSplit already exists");
                Err(e)
            }
            Err(e) => {
                warn!(split = %name, error = %e, "Error creating VolumeSplit");
                Err(e)
            }
        }
    }
}

fn translate_not_found(volume_id: &str, err: StoreError) -> UnionError {
    if err.is_not_found() {
        UnionError::VolumeNotFound(volume_id.to_string())
    } else {
        UnionError::Store(err)
    }
}

#[async_trait]
impl Splitter for StandardSplitter {
    async fn create_split(
        &self,
        volume_id: &str,
        spec: &VolumeSplitSpec,
    ) -> Result<VolumeSplit, UnionError> {
        let name = split_name(volume_id);
        let key = ResourceKey::cluster(&name);

        let existing = match self.store.get(&key).await {
            Ok(split) => {
                info!(split = %name, volume_id = %volume_id, "VolumeSplit already exists");
                split
            }
            Err(e) if e.is_not_found() => match self.do_create_split(volume_id, &name, spec).await {
                Ok(created) => return Ok(created),
                Err(e) if e.is_already_exists() => {
                    // Lost a create race; the winner's plan is what must be validated
                    self.store.get(&key).await.map_err(|e| {
                        info!(
                            split = %name,
                            volume_id = %volume_id,
                            error = %e,
                            "Failed to get VolumeSplit after already-exists indication"
                        );
                        UnionError::Store(e)
                    })?
                }
                Err(e) => return Err(UnionError::Store(e)),
            },
            Err(e) => return Err(UnionError::Store(e)),
        };

        if !existing.spec.is_compatible_with(spec) {
            return Err(UnionError::IdempotencyConflict(volume_id.to_string()));
        }

        Ok(existing)
    }

    async fn delete_split(&self, volume_id: &str) -> Result<(), UnionError> {
        let name = split_name(volume_id);
        match self.store.delete(&ResourceKey::cluster(&name)).await {
            Ok(()) => {
                info!(split = %name, volume_id = %volume_id, "Deleted VolumeSplit");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                info!(split = %name, volume_id = %volume_id, "VolumeSplit does not exist");
                Err(translate_not_found(volume_id, e))
            }
            Err(e) => {
                warn!(split = %name, error = %e, "Error deleting VolumeSplit");
                Err(UnionError::Store(e))
            }
        }
    }

    async fn get_split(&self, volume_id: &str) -> Result<VolumeSplit, UnionError> {
        self.store
            .get(&ResourceKey::cluster(split_name(volume_id)))
            .await
            .map_err(|e| translate_not_found(volume_id, e))
    }
}
