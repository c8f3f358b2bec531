// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Request Field Validation
//!
//! Structural checks of the CSI requests the driver serves. These run
//! before any capability negotiation and collect every field error of a
//! request instead of stopping at the first one.
//!
//! # Architecture
//!
//! - **Layer:** Presentation Layer
//! - **Purpose:** Implements internal responsibilities for requests

use std::collections::HashMap;

use super::field::{FieldError, FieldErrors, FieldPath};
use crate::presentation::grpc::csi::volume_capability::access_mode::Mode;
use crate::presentation::grpc::csi::volume_capability::AccessType;
use crate::presentation::grpc::csi::volume_content_source::Type as ContentSourceType;
use crate::presentation::grpc::csi::{
    CapacityRange, ControllerPublishVolumeRequest, ControllerUnpublishVolumeRequest, CreateVolumeRequest,
    DeleteVolumeRequest, NodePublishVolumeRequest, NodeUnpublishVolumeRequest, Topology, TopologyRequirement,
    VolumeCapability, VolumeContentSource,
};

const LABEL_MAX_LENGTH: usize = 63;
const DNS1123_SUBDOMAIN_MAX_LENGTH: usize = 253;

/// Every access mode a capability may carry, `UNKNOWN` excluded
pub const KNOWN_ACCESS_MODES: [Mode; 7] = [
    Mode::SingleNodeWriter,
    Mode::SingleNodeReaderOnly,
    Mode::MultiNodeReaderOnly,
    Mode::MultiNodeSingleWriter,
    Mode::MultiNodeMultiWriter,
    Mode::SingleNodeSingleWriter,
    Mode::SingleNodeMultiWriter,
];

/// Decoded access mode of a capability, `None` when absent or out of range
pub fn access_mode_of(capability: &VolumeCapability) -> Option<Mode> {
    capability
        .access_mode
        .as_ref()
        .and_then(|m| Mode::try_from(m.mode).ok())
}

// ============================================================================
// Controller Requests
// ============================================================================

pub fn validate_create_volume_request(req: &CreateVolumeRequest) -> FieldErrors {
    let mut errors = FieldErrors::new();

    if req.name.is_empty() {
        errors.push(FieldError::required(FieldPath::new("name"), ""));
    }

    errors.extend(validate_capacity_range(
        req.capacity_range.as_ref(),
        &FieldPath::new("capacityRange"),
    ));
    errors.extend(validate_volume_capabilities(
        &req.volume_capabilities,
        &FieldPath::new("volumeCapabilities"),
    ));
    errors.extend(validate_volume_content_source(
        req.volume_content_source.as_ref(),
        &FieldPath::new("volumeContentSource"),
    ));
    errors.extend(validate_accessibility_requirements(
        req.accessibility_requirements.as_ref(),
        &FieldPath::new("accessibilityRequirements"),
    ));

    errors
}

pub fn validate_delete_volume_request(req: &DeleteVolumeRequest) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if req.volume_id.is_empty() {
        errors.push(FieldError::required(FieldPath::new("volumeId"), ""));
    }
    errors
}

pub fn validate_controller_publish_volume_request(req: &ControllerPublishVolumeRequest) -> FieldErrors {
    let mut errors = FieldErrors::new();

    if req.volume_id.is_empty() {
        errors.push(FieldError::required(FieldPath::new("volumeId"), ""));
    }
    if req.node_id.is_empty() {
        errors.push(FieldError::required(FieldPath::new("nodeId"), ""));
    }
    errors.extend(validate_volume_capability(
        req.volume_capability.as_ref(),
        &FieldPath::new("volumeCapability"),
    ));

    errors
}

pub fn validate_controller_unpublish_volume_request(req: &ControllerUnpublishVolumeRequest) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if req.volume_id.is_empty() {
        errors.push(FieldError::required(FieldPath::new("volumeId"), ""));
    }
    errors
}

fn validate_capacity_range(range: Option<&CapacityRange>, path: &FieldPath) -> FieldErrors {
    let mut errors = FieldErrors::new();
    let Some(range) = range else {
        return errors;
    };

    let (required, limit) = (range.required_bytes, range.limit_bytes);
    if required == 0 && limit == 0 {
        errors.push(FieldError::required(
            path.child("requiredBytes"),
            "must specify either requiredBytes or limitBytes or both when capacityRange is specified",
        ));
        return errors;
    }

    if required < 0 {
        errors.push(FieldError::invalid(
            path.child("requiredBytes"),
            required,
            "must be greater than or equal to 0",
        ));
    }
    if limit < 0 {
        errors.push(FieldError::invalid(
            path.child("limitBytes"),
            limit,
            "must be greater than or equal to 0",
        ));
    }
    if limit > 0 && required > limit {
        errors.push(FieldError::forbidden(
            path.child("requiredBytes"),
            "requiredBytes must not be greater than limitBytes when limitBytes is specified",
        ));
    }

    errors
}

fn validate_volume_capabilities(capabilities: &[VolumeCapability], path: &FieldPath) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if capabilities.is_empty() {
        errors.push(FieldError::required(path.clone(), ""));
        return errors;
    }
    for (i, capability) in capabilities.iter().enumerate() {
        errors.extend(validate_volume_capability(Some(capability), &path.index(i)));
    }
    errors
}

fn validate_volume_capability(capability: Option<&VolumeCapability>, path: &FieldPath) -> FieldErrors {
    let mut errors = FieldErrors::new();
    let Some(capability) = capability else {
        errors.push(FieldError::required(path.clone(), ""));
        return errors;
    };

    match &capability.access_type {
        None => errors.push(FieldError::required(path.child("accessType"), "")),
        Some(AccessType::Block(_)) | Some(AccessType::Mount(_)) => {}
    }

    let mode_path = path.child("accessMode");
    match &capability.access_mode {
        None => errors.push(FieldError::required(mode_path, "")),
        Some(access_mode) => errors.extend(validate_mode(access_mode.mode, &mode_path.child("mode"))),
    }

    errors
}

fn validate_mode(mode: i32, path: &FieldPath) -> FieldErrors {
    let mut errors = FieldErrors::new();
    match Mode::try_from(mode) {
        Ok(Mode::Unknown) => errors.push(FieldError::required(path.clone(), "access mode is UNKNOWN")),
        Ok(_) => {}
        Err(_) => {
            let supported: Vec<&str> = KNOWN_ACCESS_MODES.iter().map(|m| m.as_str_name()).collect();
            errors.push(FieldError::not_supported(path.clone(), mode, &supported));
        }
    }
    errors
}

fn validate_volume_content_source(source: Option<&VolumeContentSource>, path: &FieldPath) -> FieldErrors {
    let mut errors = FieldErrors::new();
    let Some(source) = source else {
        return errors;
    };

    let type_path = path.child("type");
    match &source.r#type {
        None => errors.push(FieldError::required(type_path, "")),
        Some(ContentSourceType::Snapshot(snapshot)) => {
            if snapshot.snapshot_id.is_empty() {
                errors.push(FieldError::required(
                    type_path.child("snapshot").child("snapshotId"),
                    "",
                ));
            }
        }
        Some(ContentSourceType::Volume(volume)) => {
            if volume.volume_id.is_empty() {
                errors.push(FieldError::required(type_path.child("volume").child("volumeId"), ""));
            }
        }
    }

    errors
}

fn validate_accessibility_requirements(requirement: Option<&TopologyRequirement>, path: &FieldPath) -> FieldErrors {
    let mut errors = FieldErrors::new();
    let Some(requirement) = requirement else {
        return errors;
    };

    let requisite_path = path.child("requisite");
    if requirement.requisite.is_empty() && requirement.preferred.is_empty() {
        errors.push(FieldError::required(
            requisite_path,
            "must specify either requisite or preferred or both when topologyRequirement is specified",
        ));
        return errors;
    }

    for (i, topology) in requirement.requisite.iter().enumerate() {
        errors.extend(validate_topology(topology, &requisite_path.index(i)));
    }
    let preferred_path = path.child("preferred");
    for (i, topology) in requirement.preferred.iter().enumerate() {
        errors.extend(validate_topology(topology, &preferred_path.index(i)));
    }

    errors
}

fn validate_topology(topology: &Topology, path: &FieldPath) -> FieldErrors {
    let segments_path = path.child("segments");
    if topology.segments.is_empty() {
        return FieldError::required(segments_path, "topology must contain at least 1 topological segment").into();
    }
    validate_labels(&topology.segments, &segments_path)
}

/// Segments follow the syntax of Kubernetes labels
fn validate_labels(labels: &HashMap<String, String>, path: &FieldPath) -> FieldErrors {
    let mut errors = FieldErrors::new();

    let mut keys: Vec<&String> = labels.keys().collect();
    keys.sort();
    for key in keys {
        for detail in qualified_name_errors(key) {
            errors.push(FieldError::invalid(path.clone(), key, &detail));
        }
        if let Some(value) = labels.get(key) {
            for detail in label_value_errors(value) {
                errors.push(FieldError::invalid(path.clone(), value, &detail));
            }
        }
    }

    errors
}

fn qualified_name_errors(value: &str) -> Vec<String> {
    let mut details = Vec::new();
    let parts: Vec<&str> = value.split('/').collect();

    let name = match parts.as_slice() {
        [name] => *name,
        [prefix, name] => {
            if prefix.is_empty() {
                details.push("prefix part must be non-empty".to_string());
            } else if prefix.len() > DNS1123_SUBDOMAIN_MAX_LENGTH {
                details.push(format!(
                    "prefix part must be no more than {} characters",
                    DNS1123_SUBDOMAIN_MAX_LENGTH
                ));
            } else if !is_dns1123_subdomain(prefix) {
                details.push(
                    "prefix part a lowercase RFC 1123 subdomain must consist of lower case alphanumeric characters, \
                     '-' or '.', and must start and end with an alphanumeric character"
                        .to_string(),
                );
            }
            *name
        }
        _ => {
            details.push(
                "a qualified name must consist of alphanumeric characters, '-', '_' or '.', and must start and end \
                 with an alphanumeric character, with an optional DNS subdomain prefix and '/'"
                    .to_string(),
            );
            return details;
        }
    };

    if name.is_empty() {
        details.push("name part must be non-empty".to_string());
    } else if name.len() > LABEL_MAX_LENGTH {
        details.push(format!("name part must be no more than {} characters", LABEL_MAX_LENGTH));
    } else if !is_label_token(name) {
        details.push(
            "name part must consist of alphanumeric characters, '-', '_' or '.', and must start and end with an \
             alphanumeric character"
                .to_string(),
        );
    }

    details
}

fn label_value_errors(value: &str) -> Vec<String> {
    let mut details = Vec::new();
    if value.len() > LABEL_MAX_LENGTH {
        details.push(format!("must be no more than {} characters", LABEL_MAX_LENGTH));
    }
    if !value.is_empty() && !is_label_token(value) {
        details.push(
            "a valid label must be an empty string or consist of alphanumeric characters, '-', '_' or '.', and \
             must start and end with an alphanumeric character"
                .to_string(),
        );
    }
    details
}

/// `([A-Za-z0-9][-A-Za-z0-9_.]*)?[A-Za-z0-9]`
fn is_label_token(value: &str) -> bool {
    let bytes = value.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            first.is_ascii_alphanumeric()
                && last.is_ascii_alphanumeric()
                && bytes
                    .iter()
                    .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
        }
        _ => false,
    }
}

/// Dot-separated RFC 1123 labels: lowercase alphanumerics and inner dashes
fn is_dns1123_subdomain(value: &str) -> bool {
    value.split('.').all(|label| {
        let bytes = label.as_bytes();
        match (bytes.first(), bytes.last()) {
            (Some(first), Some(last)) => {
                first.is_ascii_alphanumeric()
                    && last.is_ascii_alphanumeric()
                    && bytes
                        .iter()
                        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
            }
            _ => false,
        }
    })
}

// ============================================================================
// Node Requests
// ============================================================================

pub fn validate_node_publish_volume_request(req: &NodePublishVolumeRequest) -> FieldErrors {
    let mut errors = FieldErrors::new();

    if req.volume_id.is_empty() {
        errors.push(FieldError::required(FieldPath::new("volumeId"), ""));
    }
    if !req.staging_target_path.is_empty() {
        errors.extend(validate_target_path(
            &req.staging_target_path,
            &FieldPath::new("stagingTargetPath"),
        ));
    }
    errors.extend(validate_target_path(&req.target_path, &FieldPath::new("targetPath")));
    errors.extend(validate_volume_capability(
        req.volume_capability.as_ref(),
        &FieldPath::new("volumeCapability"),
    ));

    errors
}

pub fn validate_node_unpublish_volume_request(req: &NodeUnpublishVolumeRequest) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if req.volume_id.is_empty() {
        errors.push(FieldError::required(FieldPath::new("volumeId"), ""));
    }
    errors.extend(validate_target_path(&req.target_path, &FieldPath::new("targetPath")));
    errors
}

fn validate_target_path(target: &str, path: &FieldPath) -> FieldErrors {
    if target.is_empty() {
        return FieldError::required(path.clone(), "").into();
    }
    if !target.starts_with('/') {
        return FieldError::invalid(path.clone(), target, "must be an absolute path").into();
    }
    FieldErrors::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presentation::grpc::csi::volume_capability::{AccessMode, BlockVolume, MountVolume};
    use crate::presentation::grpc::csi::volume_content_source::SnapshotSource;

    fn mount_capability(mode: Mode) -> VolumeCapability {
        VolumeCapability {
            access_type: Some(AccessType::Mount(MountVolume::default())),
            access_mode: Some(AccessMode { mode: mode as i32 }),
        }
    }

    fn create_request() -> CreateVolumeRequest {
        CreateVolumeRequest {
            name: "v1".to_string(),
            capacity_range: Some(CapacityRange {
                required_bytes: 1024,
                limit_bytes: 0,
            }),
            volume_capabilities: vec![mount_capability(Mode::SingleNodeWriter)],
            ..Default::default()
        }
    }

    #[test]
    fn test_create_volume_valid() {
        assert!(validate_create_volume_request(&create_request()).is_empty());

        let mut req = create_request();
        req.capacity_range = None;
        req.volume_capabilities = vec![VolumeCapability {
            access_type: Some(AccessType::Block(BlockVolume {})),
            access_mode: Some(AccessMode {
                mode: Mode::MultiNodeMultiWriter as i32,
            }),
        }];
        assert!(validate_create_volume_request(&req).is_empty());
    }

    #[test]
    fn test_create_volume_missing_fields() {
        let req = CreateVolumeRequest::default();
        let errors = validate_create_volume_request(&req);
        assert_eq!(
            errors.to_string(),
            "[name: Required value, volumeCapabilities: Required value]"
        );
    }

    #[test]
    fn test_capacity_range_rules() {
        let mut req = create_request();
        req.capacity_range = Some(CapacityRange::default());
        assert!(validate_create_volume_request(&req)
            .to_string()
            .starts_with("capacityRange.requiredBytes: Required value"));

        req.capacity_range = Some(CapacityRange {
            required_bytes: -5,
            limit_bytes: 10,
        });
        assert_eq!(
            validate_create_volume_request(&req).to_string(),
            "capacityRange.requiredBytes: Invalid value: -5: must be greater than or equal to 0"
        );

        req.capacity_range = Some(CapacityRange {
            required_bytes: 20,
            limit_bytes: 10,
        });
        let errors = validate_create_volume_request(&req);
        assert_eq!(errors.len(), 1);
        assert!(errors.to_string().contains("Forbidden"));

        // No upper bound when the limit is unset
        req.capacity_range = Some(CapacityRange {
            required_bytes: 20,
            limit_bytes: 0,
        });
        assert!(validate_create_volume_request(&req).is_empty());
    }

    #[test]
    fn test_capability_access_type_and_mode() {
        let mut req = create_request();
        req.volume_capabilities = vec![
            VolumeCapability {
                access_type: None,
                access_mode: None,
            },
            mount_capability(Mode::Unknown),
            VolumeCapability {
                access_type: Some(AccessType::Mount(MountVolume::default())),
                access_mode: Some(AccessMode { mode: 42 }),
            },
        ];

        let errors: Vec<String> = validate_create_volume_request(&req).iter().map(ToString::to_string).collect();
        assert_eq!(errors[0], "volumeCapabilities[0].accessType: Required value");
        assert_eq!(errors[1], "volumeCapabilities[0].accessMode: Required value");
        assert_eq!(
            errors[2],
            "volumeCapabilities[1].accessMode.mode: Required value: access mode is UNKNOWN"
        );
        assert!(errors[3].starts_with("volumeCapabilities[2].accessMode.mode: Unsupported value: 42"));
        assert!(errors[3].contains("\"SINGLE_NODE_WRITER\""));
    }

    #[test]
    fn test_content_source_and_topology() {
        let mut req = create_request();
        req.volume_content_source = Some(VolumeContentSource {
            r#type: Some(ContentSourceType::Snapshot(SnapshotSource::default())),
        });
        req.accessibility_requirements = Some(TopologyRequirement::default());

        let errors: Vec<String> = validate_create_volume_request(&req).iter().map(ToString::to_string).collect();
        assert_eq!(errors[0], "volumeContentSource.type.snapshot.snapshotId: Required value");
        assert!(errors[1].starts_with("accessibilityRequirements.requisite: Required value"));
    }

    #[test]
    fn test_topology_segments_are_labels() {
        let mut req = create_request();
        let mut good = HashMap::new();
        good.insert("topology.union.io/zone".to_string(), "eu-west-1a".to_string());
        let mut bad = HashMap::new();
        bad.insert("Bad_Prefix.io/zone".to_string(), "-dash".to_string());
        req.accessibility_requirements = Some(TopologyRequirement {
            requisite: vec![Topology { segments: good }],
            preferred: vec![Topology { segments: bad }, Topology::default()],
        });

        let errors: Vec<String> = validate_create_volume_request(&req).iter().map(ToString::to_string).collect();
        assert_eq!(errors.len(), 3);
        assert!(errors[0].starts_with("accessibilityRequirements.preferred[0].segments: Invalid value: \"Bad_Prefix.io/zone\": prefix part"));
        assert!(errors[1].starts_with("accessibilityRequirements.preferred[0].segments: Invalid value: \"-dash\""));
        assert!(errors[2].starts_with("accessibilityRequirements.preferred[1].segments: Required value"));
    }

    #[test]
    fn test_qualified_names() {
        assert!(qualified_name_errors("kubernetes.io/hostname").is_empty());
        assert!(qualified_name_errors("zone").is_empty());
        assert_eq!(qualified_name_errors("/zone"), vec!["prefix part must be non-empty"]);
        assert_eq!(qualified_name_errors("a/b/c").len(), 1);
        assert_eq!(qualified_name_errors(&"x".repeat(64)).len(), 1);
        assert!(label_value_errors("").is_empty());
    }

    #[test]
    fn test_label_syntax() {
        assert!(is_label_token("a"));
        assert!(is_label_token("eu-west_1.a"));
        assert!(!is_label_token("-a"));
        assert!(!is_label_token("a."));
        assert!(is_dns1123_subdomain("topology.union.io"));
        assert!(!is_dns1123_subdomain("Upper.io"));
        assert!(!is_dns1123_subdomain("double..dot"));
    }

    #[test]
    fn test_controller_publish_and_unpublish() {
        let errors = validate_controller_publish_volume_request(&ControllerPublishVolumeRequest::default());
        assert_eq!(
            errors.to_string(),
            "[volumeId: Required value, nodeId: Required value, volumeCapability: Required value]"
        );

        let errors = validate_controller_unpublish_volume_request(&ControllerUnpublishVolumeRequest::default());
        assert_eq!(errors.to_string(), "volumeId: Required value");
        assert!(validate_delete_volume_request(&DeleteVolumeRequest {
            volume_id: "v1".to_string(),
            ..Default::default()
        })
        .is_empty());
    }

    #[test]
    fn test_node_publish_paths() {
        let req = NodePublishVolumeRequest {
            volume_id: "v1".to_string(),
            staging_target_path: "staging".to_string(),
            target_path: "relative".to_string(),
            volume_capability: Some(mount_capability(Mode::SingleNodeWriter)),
            ..Default::default()
        };
        assert_eq!(
            validate_node_publish_volume_request(&req).to_string(),
            "[stagingTargetPath: Invalid value: \"staging\": must be an absolute path, \
             targetPath: Invalid value: \"relative\": must be an absolute path]"
        );

        let req = NodeUnpublishVolumeRequest {
            volume_id: "v1".to_string(),
            target_path: "/var/lib/kubelet/pods/x/mount".to_string(),
        };
        assert!(validate_node_unpublish_volume_request(&req).is_empty());
    }
}
