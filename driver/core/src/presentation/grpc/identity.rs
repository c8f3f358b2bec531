// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! CSI Identity service: plugin name, version and capabilities.

use tonic::{Request, Response, Status};

use crate::presentation::grpc::csi::identity_server::{Identity, IdentityServer};
use crate::presentation::grpc::csi::*;
use crate::presentation::grpc::logging::logged;
use crate::presentation::grpc::validation::IdentityCapabilities;
use crate::{DRIVER_NAME, VENDOR_VERSION};

pub struct CsiIdentityService {
    capabilities: IdentityCapabilities,
}

impl CsiIdentityService {
    pub fn new(capabilities: IdentityCapabilities) -> Self {
        Self { capabilities }
    }

    /// Create a gRPC server instance
    pub fn into_server(self) -> IdentityServer<Self> {
        IdentityServer::new(self)
    }
}

#[tonic::async_trait]
impl Identity for CsiIdentityService {
    async fn get_plugin_info(
        &self,
        request: Request<GetPluginInfoRequest>,
    ) -> Result<Response<GetPluginInfoResponse>, Status> {
        logged("GetPluginInfo", request, move |_| async move {
            Ok(Response::new(GetPluginInfoResponse {
                name: DRIVER_NAME.to_string(),
                vendor_version: VENDOR_VERSION.to_string(),
                manifest: Default::default(),
            }))
        })
        .await
    }

    async fn get_plugin_capabilities(
        &self,
        request: Request<GetPluginCapabilitiesRequest>,
    ) -> Result<Response<GetPluginCapabilitiesResponse>, Status> {
        logged("GetPluginCapabilities", request, move |_| async move {
            Ok(Response::new(GetPluginCapabilitiesResponse {
                capabilities: self.capabilities.capabilities(),
            }))
        })
        .await
    }

    /// Reports ready unconditionally
    async fn probe(&self, request: Request<ProbeRequest>) -> Result<Response<ProbeResponse>, Status> {
        logged("Probe", request, move |_| async move {
            Ok(Response::new(ProbeResponse { ready: Some(true) }))
        })
        .await
    }
}
