// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Union CSI Driver
//!
//! The `union-csi-driver` binary serves the CSI Identity, Controller and
//! Node services on one endpoint.
//!
//! ## Modes
//!
//! - `--mode all` (default): controller and node services in one process
//! - `--mode controller`: cluster-level deployment, talks to the API server
//! - `--mode node`: per-node deployment, performs bind mounts
//!
//! The API server client is only built when the controller service runs.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

use union_csi_driver_core::application::{
    MountManager, StandardAttacher, StandardMountManager, StandardSplitter, StandardUnionService, UnionService,
};
use union_csi_driver_core::infrastructure::kube::{KubeClient, KubeConfig};
use union_csi_driver_core::infrastructure::mount::LinuxMounter;
use union_csi_driver_core::presentation::grpc::controller::DEFAULT_LOWER_NAMESPACE;
use union_csi_driver_core::presentation::grpc::driver::DEFAULT_CSI_ENDPOINT;
use union_csi_driver_core::presentation::grpc::{Driver, DriverConfig, DriverMode, Endpoint};

/// Union CSI driver - one logical volume over several merged lower volumes
#[derive(Parser)]
#[command(name = "union-csi-driver")]
#[command(version, about, long_about = None)]
struct Cli {
    /// gRPC endpoint of the CSI driver (unix:// or tcp://)
    #[arg(long, env = "CSI_ENDPOINT", default_value = DEFAULT_CSI_ENDPOINT)]
    endpoint: Endpoint,

    /// Namespace of lower claims when lowerNamespace is unspecified in StorageClass parameters
    #[arg(long, default_value = DEFAULT_LOWER_NAMESPACE)]
    lower_namespace: String,

    /// Prefix prepended to every lower claim name
    #[arg(long)]
    claim_name_prefix: Option<String>,

    /// Absolute path to a kubeconfig file. Useful when running out-of-cluster
    #[arg(long, env = "KUBECONFIG", value_name = "FILE")]
    kubeconfig: Option<PathBuf>,

    /// Driver mode: "controller" runs the Controller service, "node" runs the Node service and "all" runs both
    #[arg(long, default_value = "all")]
    mode: DriverMode,

    /// Name of the node this process runs on (required by the Node service)
    #[arg(long, env = "NODE_NAME")]
    node_id: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "UNION_CSI_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.log_format)?;

    let shutdown = CancellationToken::new();

    let union = if cli.mode.runs_controller() {
        Some(build_union_service(&cli)?)
    } else {
        None
    };

    let mount_manager: Option<Arc<dyn MountManager>> = if cli.mode.runs_node() {
        Some(Arc::new(StandardMountManager::new(Arc::new(LinuxMounter::new()))))
    } else {
        None
    };

    let config = DriverConfig {
        mode: cli.mode,
        endpoint: cli.endpoint.clone(),
        default_lower_namespace: cli.lower_namespace.clone(),
        node_id: cli.node_id.clone(),
    };
    let driver = Driver::new(config, union, mount_manager, shutdown.clone()).context("Failed to create driver")?;

    tokio::spawn(shutdown_signal(shutdown));

    driver.run().await.context("Failed to run driver")?;

    info!("Driver stopped");
    Ok(())
}

fn build_union_service(cli: &Cli) -> Result<Arc<dyn UnionService>> {
    match &cli.kubeconfig {
        Some(path) => info!("Building config from kubeconfig {} ...", path.display()),
        None => info!("Building config from in-cluster ..."),
    }
    let config = KubeConfig::load(cli.kubeconfig.as_deref()).context("Failed to create config")?;
    let client = Arc::new(KubeClient::new(&config).context("Failed to create kubernetes client")?);

    let mut splitter = StandardSplitter::new(client.clone());
    if let Some(prefix) = &cli.claim_name_prefix {
        splitter = splitter.with_claim_name_prefix(prefix.clone());
    }
    let attacher = StandardAttacher::new(client.clone());

    Ok(Arc::new(StandardUnionService::new(
        Arc::new(splitter),
        Arc::new(attacher),
        client.clone(),
        client,
    )))
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        LogFormat::Text => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }

    Ok(())
}

/// Cancel `shutdown` on SIGINT or SIGTERM
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }

    shutdown.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["union-csi-driver"]).unwrap();
        assert_eq!(cli.mode, DriverMode::All);
        assert_eq!(cli.lower_namespace, "union");
        assert_eq!(cli.log_format, LogFormat::Text);
        assert!(cli.claim_name_prefix.is_none());
    }

    #[test]
    fn test_mode_and_endpoint_flags() {
        let cli = Cli::try_parse_from([
            "union-csi-driver",
            "--mode",
            "node",
            "--endpoint",
            "tcp://127.0.0.1:10000",
            "--node-id",
            "node-a",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.mode, DriverMode::Node);
        assert_eq!(cli.endpoint, Endpoint::Tcp("127.0.0.1:10000".to_string()));
        assert_eq!(cli.node_id.as_deref(), Some("node-a"));
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn test_rejects_unknown_mode_and_scheme() {
        assert!(Cli::try_parse_from(["union-csi-driver", "--mode", "both"]).is_err());
        assert!(Cli::try_parse_from(["union-csi-driver", "--endpoint", "http://localhost:80"]).is_err());
    }
}
