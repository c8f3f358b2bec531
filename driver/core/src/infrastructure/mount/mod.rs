// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Mod
//!
//! Host mount utilities behind the `Mounter` domain trait.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Implements mod

pub mod fake;
pub mod linux;

pub use fake::FakeMounter;
pub use linux::LinuxMounter;
