// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Call Logging
//!
//! Every RPC logs its request on entry and its response or status on exit.
//! `secrets` maps never reach the log: their values are replaced with
//! `***stripped***` before formatting.
//!
//! # Architecture
//!
//! - **Layer:** Presentation Layer
//! - **Purpose:** Implements internal responsibilities for logging

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use tonic::{Request, Response, Status};
use tracing::{error, info};

use crate::presentation::grpc::csi::*;

pub const STRIPPED: &str = "***stripped***";

/// Copy of a message that is safe to log
pub trait StripSecrets {
    fn strip_secrets(&self) -> Self;
}

fn strip(secrets: &mut HashMap<String, String>) {
    for value in secrets.values_mut() {
        *value = STRIPPED.to_string();
    }
}

macro_rules! impl_strip_secrets {
    (with secrets: $($ty:ty),* $(,)?) => {
        $(
            impl StripSecrets for $ty {
                fn strip_secrets(&self) -> Self {
                    let mut stripped = self.clone();
                    strip(&mut stripped.secrets);
                    stripped
                }
            }
        )*
    };
    (without secrets: $($ty:ty),* $(,)?) => {
        $(
            impl StripSecrets for $ty {
                fn strip_secrets(&self) -> Self {
                    self.clone()
                }
            }
        )*
    };
}

impl_strip_secrets!(with secrets:
    CreateVolumeRequest,
    DeleteVolumeRequest,
    ControllerPublishVolumeRequest,
    ControllerUnpublishVolumeRequest,
    ValidateVolumeCapabilitiesRequest,
    CreateSnapshotRequest,
    DeleteSnapshotRequest,
    ListSnapshotsRequest,
    ControllerExpandVolumeRequest,
    NodeStageVolumeRequest,
    NodePublishVolumeRequest,
    NodeExpandVolumeRequest,
);

impl_strip_secrets!(without secrets:
    GetPluginInfoRequest,
    GetPluginCapabilitiesRequest,
    ProbeRequest,
    ListVolumesRequest,
    GetCapacityRequest,
    ControllerGetCapabilitiesRequest,
    ControllerGetVolumeRequest,
    NodeUnstageVolumeRequest,
    NodeUnpublishVolumeRequest,
    NodeGetVolumeStatsRequest,
    NodeGetCapabilitiesRequest,
    NodeGetInfoRequest,
);

/// Run `handler` between request and result logging
pub async fn logged<Req, Resp, F, Fut>(
    method: &'static str,
    request: Request<Req>,
    handler: F,
) -> Result<Response<Resp>, Status>
where
    Req: StripSecrets + Debug,
    Resp: Debug,
    F: FnOnce(Request<Req>) -> Fut,
    Fut: Future<Output = Result<Response<Resp>, Status>>,
{
    info!(method, request = ?request.get_ref().strip_secrets(), "gRPC request");

    let result = handler(request).await;
    match &result {
        Ok(response) => info!(method, response = ?response.get_ref(), "gRPC response"),
        Err(status) => error!(
            method,
            code = ?status.code(),
            message = status.message(),
            "gRPC request failed"
        ),
    }
    result
}
