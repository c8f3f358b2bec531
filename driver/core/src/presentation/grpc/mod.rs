// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # CSI gRPC Services
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`identity`] | `GetPluginInfo`, `GetPluginCapabilities`, `Probe` |
//! | [`controller`] | Volume create/delete and attach/detach through the union service |
//! | [`node`] | Bind mounts of the merged view into workload target paths |
//! | [`validation`] | Request field validation and negotiated capabilities |
//! | [`logging`] | Per-call request/response logging with secrets redacted |
//! | [`driver`] | Endpoint parsing, service selection and the server loop |

// Generated protobuf code
pub mod csi {
    tonic::include_proto!("csi.v1");
}

pub mod context;
pub mod controller;
pub mod driver;
pub mod identity;
pub mod logging;
pub mod node;
pub mod validation;

pub use controller::CsiControllerService;
pub use driver::{Driver, DriverConfig, DriverError, DriverMode, Endpoint};
pub use identity::CsiIdentityService;
pub use node::CsiNodeService;
