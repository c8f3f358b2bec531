// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Validation
//!
//! Request admission for the CSI services: field checks first, then the
//! negotiated capability rules.
//!
//! # Architecture
//!
//! - **Layer:** Presentation Layer
//! - **Purpose:** Implements validation

pub mod capabilities;
pub mod field;
pub mod requests;

pub use capabilities::{
    CapabilityError, ControllerCapabilities, IdentityCapabilities, NodeCapabilities, ValidationError, VolumeModes,
    CONTROLLER_CAPABILITIES, NODE_CAPABILITIES, PLUGIN_CAPABILITIES, VOLUME_ACCESS_MODES,
};
pub use field::{FieldError, FieldErrorKind, FieldErrors, FieldPath};
