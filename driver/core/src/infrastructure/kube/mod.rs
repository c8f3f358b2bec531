// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Mod
//!
//! Cluster resource stores: the REST client for a real API server and an
//! in-memory store with the same conflict semantics.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Implements mod

pub mod client;
pub mod config;
pub mod memory;

pub use client::KubeClient;
pub use config::KubeConfig;
pub use memory::InMemoryStore;
