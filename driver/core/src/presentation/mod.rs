// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`union-csi-driver-core`)
//!
//! gRPC surface the container orchestrator talks to. Requests are validated
//! and translated into application service calls; domain errors are mapped
//! to status codes here and nowhere else.
//!
//! | Module | Transport | Description |
//! |--------|-----------|-------------|
//! | [`grpc`] | gRPC (Tonic) | CSI Identity, Controller and Node services plus the server bootstrap |

pub mod grpc;
