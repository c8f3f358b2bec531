// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! CSI Driver
//!
//! Composes the identity, controller and node services into one gRPC server.
//! Which of the controller and node services are registered is decided by
//! [`DriverMode`]; identity is always served.
//!
//! # Architecture
//!
//! - **Layer:** Presentation Layer
//! - **Purpose:** Endpoint parsing, service selection and the server loop

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::{TcpListener, UnixListener};
use tokio_stream::wrappers::{TcpListenerStream, UnixListenerStream};
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tracing::info;
use url::Url;

use crate::application::mount_manager::MountManager;
use crate::application::union::UnionService;
use crate::presentation::grpc::controller::{CsiControllerService, DEFAULT_LOWER_NAMESPACE};
use crate::presentation::grpc::identity::CsiIdentityService;
use crate::presentation::grpc::node::CsiNodeService;
use crate::presentation::grpc::validation::{
    CapabilityError, ControllerCapabilities, IdentityCapabilities, NodeCapabilities, CONTROLLER_CAPABILITIES,
    NODE_CAPABILITIES, PLUGIN_CAPABILITIES, VOLUME_ACCESS_MODES,
};
use crate::{DRIVER_NAME, VENDOR_VERSION};

pub const DEFAULT_CSI_ENDPOINT: &str = "unix:///tmp/csi.sock";

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("unknown driver mode: {0:?}. Must be one of [all controller node]")]
    UnknownMode(String),

    #[error("failed to parse endpoint {endpoint}: {source}")]
    InvalidEndpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported protocol: {0}")]
    UnsupportedProtocol(String),

    #[error("endpoint {0} has no address")]
    MissingAddress(String),

    #[error("node id is required when the node service runs")]
    MissingNodeId,

    #[error("{0} service requested but not provided")]
    MissingService(&'static str),

    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error("failed to remove unix domain socket {path:?}: {source}")]
    RemoveSocket {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to listen on {address}: {source}")]
    Listen {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("gRPC server failed: {0}")]
    Transport(#[from] tonic::transport::Error),
}

// ============================================================================
// Mode
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriverMode {
    #[default]
    All,
    Controller,
    Node,
}

impl DriverMode {
    pub fn runs_controller(self) -> bool {
        matches!(self, DriverMode::All | DriverMode::Controller)
    }

    pub fn runs_node(self) -> bool {
        matches!(self, DriverMode::All | DriverMode::Node)
    }
}

impl FromStr for DriverMode {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(DriverMode::All),
            "controller" => Ok(DriverMode::Controller),
            "node" => Ok(DriverMode::Node),
            _ => Err(DriverError::UnknownMode(s.to_string())),
        }
    }
}

impl fmt::Display for DriverMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DriverMode::All => "All",
            DriverMode::Controller => "Controller",
            DriverMode::Node => "Node",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Endpoint
// ============================================================================

/// Listen address of the gRPC server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Unix(PathBuf),
    /// `host:port`
    Tcp(String),
}

impl Endpoint {
    /// Parse `unix://<path>` or `tcp://<host>:<port>`
    ///
    /// For unix endpoints the authority is folded into the path, so
    /// `unix://tmp/csi.sock` and `unix:///tmp/csi.sock` name the same socket.
    pub fn parse(endpoint: &str) -> Result<Self, DriverError> {
        let url = Url::parse(endpoint).map_err(|source| DriverError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            source,
        })?;
        let host = url.host_str().unwrap_or_default();

        match url.scheme().to_ascii_lowercase().as_str() {
            "unix" => {
                let mut path = PathBuf::from("/");
                for segment in host.split('/').chain(url.path().split('/')) {
                    if !segment.is_empty() {
                        path.push(segment);
                    }
                }
                if path == Path::new("/") {
                    return Err(DriverError::MissingAddress(endpoint.to_string()));
                }
                Ok(Endpoint::Unix(path))
            }
            "tcp" => match url.port() {
                Some(port) if !host.is_empty() => Ok(Endpoint::Tcp(format!("{}:{}", host, port))),
                _ => Err(DriverError::MissingAddress(endpoint.to_string())),
            },
            scheme => Err(DriverError::UnsupportedProtocol(scheme.to_string())),
        }
    }
}

impl FromStr for Endpoint {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Endpoint::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Unix(path) => write!(f, "unix://{}", path.display()),
            Endpoint::Tcp(address) => write!(f, "tcp://{}", address),
        }
    }
}

fn remove_stale_socket(path: &Path) -> Result<(), DriverError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(DriverError::RemoveSocket {
            path: path.to_path_buf(),
            source,
        }),
    }
}

// ============================================================================
// Driver
// ============================================================================

#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub mode: DriverMode,
    pub endpoint: Endpoint,
    /// Namespace for lower claims when the StorageClass names none
    pub default_lower_namespace: String,
    /// Required when the node service runs
    pub node_id: Option<String>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            mode: DriverMode::All,
            endpoint: Endpoint::Unix(PathBuf::from("/tmp/csi.sock")),
            default_lower_namespace: DEFAULT_LOWER_NAMESPACE.to_string(),
            node_id: None,
        }
    }
}

pub struct Driver {
    config: DriverConfig,
    identity: CsiIdentityService,
    controller: Option<CsiControllerService>,
    node: Option<CsiNodeService>,
    shutdown: CancellationToken,
}

impl Driver {
    /// Build the services `config.mode` asks for
    ///
    /// `union` is needed when the controller runs and `mount_manager` when
    /// the node runs; either may be `None` otherwise.
    pub fn new(
        config: DriverConfig,
        union: Option<Arc<dyn UnionService>>,
        mount_manager: Option<Arc<dyn MountManager>>,
        shutdown: CancellationToken,
    ) -> Result<Self, DriverError> {
        let identity = CsiIdentityService::new(IdentityCapabilities::new(PLUGIN_CAPABILITIES)?);

        let controller = if config.mode.runs_controller() {
            let union = union.ok_or(DriverError::MissingService("controller"))?;
            Some(CsiControllerService::new(
                union,
                ControllerCapabilities::new(CONTROLLER_CAPABILITIES, VOLUME_ACCESS_MODES)?,
                config.default_lower_namespace.clone(),
                shutdown.clone(),
            ))
        } else {
            None
        };

        let node = if config.mode.runs_node() {
            let node_id = match config.node_id.as_deref() {
                Some(id) if !id.is_empty() => id.to_string(),
                _ => return Err(DriverError::MissingNodeId),
            };
            let mount_manager = mount_manager.ok_or(DriverError::MissingService("node"))?;
            Some(CsiNodeService::new(
                node_id,
                mount_manager,
                NodeCapabilities::new(NODE_CAPABILITIES, VOLUME_ACCESS_MODES)?,
            ))
        } else {
            None
        };

        info!(name = DRIVER_NAME, version = VENDOR_VERSION, mode = %config.mode, "CSI driver");

        Ok(Self {
            config,
            identity,
            controller,
            node,
            shutdown,
        })
    }

    pub fn mode(&self) -> DriverMode {
        self.config.mode
    }

    /// Serve until the shutdown token is cancelled
    pub async fn run(self) -> Result<(), DriverError> {
        let Driver {
            config,
            identity,
            controller,
            node,
            shutdown,
        } = self;

        info!("Starting driver ...");

        let router = Server::builder()
            .add_service(identity.into_server())
            .add_optional_service(controller.map(CsiControllerService::into_server))
            .add_optional_service(node.map(CsiNodeService::into_server));

        match &config.endpoint {
            Endpoint::Unix(path) => {
                remove_stale_socket(path)?;
                let listener = UnixListener::bind(path).map_err(|source| DriverError::Listen {
                    address: config.endpoint.to_string(),
                    source,
                })?;
                info!("Listening for connections at {}", config.endpoint);
                router
                    .serve_with_incoming_shutdown(UnixListenerStream::new(listener), shutdown.cancelled_owned())
                    .await?;
            }
            Endpoint::Tcp(address) => {
                let listener = TcpListener::bind(address).await.map_err(|source| DriverError::Listen {
                    address: config.endpoint.to_string(),
                    source,
                })?;
                info!("Listening for connections at {}", config.endpoint);
                router
                    .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown.cancelled_owned())
                    .await?;
            }
        }

        info!("Stopping driver ...");
        Ok(())
    }
}
