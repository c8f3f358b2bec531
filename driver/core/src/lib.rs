// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Lib
//!
//! Core of the union CSI driver: presents one logical volume backed by
//! several lower claims merged on the node with a union filesystem.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Implements lib

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;

/// Name the driver registers under
pub const DRIVER_NAME: &str = "union.csi.driver.union.io";

/// Vendor version reported by `GetPluginInfo`
pub const VENDOR_VERSION: &str = env!("CARGO_PKG_VERSION");
