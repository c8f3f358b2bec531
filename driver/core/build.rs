// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Build Script for union-csi-driver-core
//!
//! Compiles the Container Storage Interface protocol definitions into tonic
//! server and client stubs.
//!
//! # Compilation Targets
//!
//! - **CSI v1**: `../../proto/csi.proto` (Identity, Controller and Node services)
//!
//! Generated code is placed in `OUT_DIR` and included via `tonic::include_proto!`
//! in `src/presentation/grpc/mod.rs`.
//!
//! # Dependencies
//!
//! - **protoc**: Protocol buffer compiler (vendored via `protoc-bin-vendored`)
//! - **tonic-prost-build**: Code generator for Rust gRPC stubs
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Implements internal responsibilities for build

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Point prost at the vendored protoc and its well-known type includes
    std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    let well_known = protoc_bin_vendored::include_path()?;

    let protos = [std::path::PathBuf::from("../../proto/csi.proto")];
    let includes = [
        std::path::PathBuf::from("../../proto"),
        well_known,
    ];

    tonic_prost_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&protos, &includes)?;

    println!("cargo:rerun-if-changed=../../proto/csi.proto");

    Ok(())
}
