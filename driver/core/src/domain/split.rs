// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! VolumeSplit Resource
//!
//! The persisted decomposition of one union volume into lower claims. One
//! cluster-scoped `VolumeSplit` (`union.io/v1alpha1`) exists per volume and
//! is named `{volumeId}-split`. Once created its spec is never rewritten;
//! repeated create requests are checked with [`VolumeSplitSpec::is_compatible_with`].
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Split plan resource and compatibility rules

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::domain::cluster::{storage_of, ObjectMeta, Quantity, Resource, ResourceList};
use crate::domain::resources::ResourceRequirements;
use crate::domain::volume::ClaimAccessMode;

pub const SPLIT_API_VERSION: &str = "union.io/v1alpha1";

fn split_api_version() -> String {
    SPLIT_API_VERSION.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSplit {
    #[serde(default = "split_api_version")]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: VolumeSplitSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSplitSpec {
    #[serde(default)]
    pub volume_name: String,
    #[serde(default)]
    pub capacity_total: ResourceList,
    #[serde(default)]
    pub access_modes: Vec<ClaimAccessMode>,
    #[serde(default)]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class_name: Option<String>,
    #[serde(default)]
    pub splits: Vec<ClaimSplit>,
}

/// One lower claim of a split plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimSplit {
    pub claim_name: String,
    #[serde(default)]
    pub resources: ResourceRequirements,
}

impl VolumeSplit {
    pub fn new(name: impl Into<String>, spec: VolumeSplitSpec) -> Self {
        Self {
            api_version: split_api_version(),
            kind: Self::KIND.to_string(),
            metadata: ObjectMeta::named(name),
            spec,
        }
    }
}

impl Resource for VolumeSplit {
    const API_VERSION: &'static str = SPLIT_API_VERSION;
    const KIND: &'static str = "VolumeSplit";
    const PLURAL: &'static str = "volumesplits";
    const NAMESPACED: bool = false;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

impl VolumeSplitSpec {
    pub fn capacity_bytes(&self) -> i64 {
        storage_of(&self.capacity_total)
    }

    /// Whether `requested` can be served by a plan already persisted as `self`
    ///
    /// Namespace and storage class must match exactly (both unset counts as a
    /// match), the requested capacity must not exceed the planned total, and
    /// every requested access mode must already be planned.
    pub fn is_compatible_with(&self, requested: &VolumeSplitSpec) -> bool {
        if self.namespace != requested.namespace {
            return false;
        }
        if self.storage_class_name != requested.storage_class_name {
            return false;
        }
        if requested.capacity_bytes() > self.capacity_bytes() {
            return false;
        }
        let planned: BTreeSet<_> = self.access_modes.iter().collect();
        requested.access_modes.iter().all(|mode| planned.contains(mode))
    }
}

/// Divide `capacity` into two equal shares
///
/// Odd totals lose one byte. A plan always has exactly two lower claims.
pub fn split_capacity(capacity: i64) -> Vec<Quantity> {
    let share = Quantity::from_bytes(capacity / 2);
    vec![share, share]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cluster::RESOURCE_STORAGE;

    fn spec(capacity: i64, modes: Vec<ClaimAccessMode>, class: Option<&str>) -> VolumeSplitSpec {
        let mut capacity_total = ResourceList::new();
        capacity_total.insert(RESOURCE_STORAGE.to_string(), Quantity::from_bytes(capacity));
        VolumeSplitSpec {
            volume_name: "v1".to_string(),
            capacity_total,
            access_modes: modes,
            namespace: "union".to_string(),
            storage_class_name: class.map(str::to_string),
            splits: Vec::new(),
        }
    }

    #[test]
    fn test_split_capacity_shares() {
        for capacity in [0i64, 1, 2, 1023, 1024, 7_000_000_001] {
            let shares = split_capacity(capacity);
            assert_eq!(shares.len(), 2);
            let sum: i64 = shares.iter().map(Quantity::value).sum();
            assert!(shares.iter().all(|q| q.value() >= 0));
            assert!(capacity - sum <= 1 && capacity - sum >= 0, "capacity {}", capacity);
            assert_eq!(shares[0], shares[1]);
        }
    }

    #[test]
    fn test_compatible_with_identical_and_smaller_requests() {
        let old = spec(1024, vec![ClaimAccessMode::ReadWriteOnce, ClaimAccessMode::ReadOnlyMany], None);
        assert!(old.is_compatible_with(&old));
        assert!(old.is_compatible_with(&spec(512, vec![ClaimAccessMode::ReadOnlyMany], None)));
    }

    #[test]
    fn test_incompatible_requests() {
        let old = spec(1024, vec![ClaimAccessMode::ReadWriteOnce], Some("fast"));
        assert!(!old.is_compatible_with(&spec(2048, vec![ClaimAccessMode::ReadWriteOnce], Some("fast"))));
        assert!(!old.is_compatible_with(&spec(1024, vec![ClaimAccessMode::ReadWriteMany], Some("fast"))));
        assert!(!old.is_compatible_with(&spec(1024, vec![ClaimAccessMode::ReadWriteOnce], None)));
        assert!(!old.is_compatible_with(&spec(1024, vec![ClaimAccessMode::ReadWriteOnce], Some("slow"))));

        let mut other_ns = spec(1024, vec![ClaimAccessMode::ReadWriteOnce], Some("fast"));
        other_ns.namespace = "other".to_string();
        assert!(!old.is_compatible_with(&other_ns));
    }

    #[test]
    fn test_spec_wire_format() {
        let mut s = spec(1024, vec![ClaimAccessMode::ReadWriteOnce], Some("fast"));
        let mut requests = ResourceList::new();
        requests.insert(RESOURCE_STORAGE.to_string(), Quantity::from_bytes(512));
        s.splits.push(ClaimSplit {
            claim_name: "v1-lower0".to_string(),
            resources: ResourceRequirements {
                requests,
                ..Default::default()
            },
        });
        let json = serde_json::to_value(VolumeSplit::new("v1-split", s)).unwrap();
        assert_eq!(json["apiVersion"], "union.io/v1alpha1");
        assert_eq!(json["kind"], "VolumeSplit");
        assert_eq!(json["spec"]["volumeName"], "v1");
        assert_eq!(json["spec"]["capacityTotal"]["storage"], "1024");
        assert_eq!(json["spec"]["accessModes"][0], "ReadWriteOnce");
        assert_eq!(json["spec"]["storageClassName"], "fast");
        assert_eq!(json["spec"]["splits"][0]["claimName"], "v1-lower0");
        assert_eq!(json["spec"]["splits"][0]["resources"]["requests"]["storage"], "512");
    }
}
