// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Mod
//!
//! Domain model of the union CSI driver: cluster resources, split plans,
//! logical volumes, mount tables and the typed error conditions.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Implements mod

pub mod cluster;
pub mod errors;
pub mod mount;
pub mod resources;
pub mod split;
pub mod volume;
