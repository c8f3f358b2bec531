// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! API Server Connection Configuration
//!
//! Resolves where and how to reach the API server, either from the pod's
//! service account (in-cluster) or from a kubeconfig file. Only the fields
//! the driver needs are read: server URL, CA bundle, TLS verification,
//! bearer token and client certificate.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Implements internal responsibilities for config

use anyhow::{anyhow, bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";
const SERVICE_HOST_ENV: &str = "KUBERNETES_SERVICE_HOST";
const SERVICE_PORT_ENV: &str = "KUBERNETES_SERVICE_PORT";

/// Resolved connection settings
#[derive(Clone, Default)]
pub struct KubeConfig {
    /// Base URL, e.g. `https://10.96.0.1:443`
    pub server: String,
    pub token: Option<String>,
    /// PEM bundle used to verify the server
    pub ca_pem: Option<Vec<u8>>,
    /// PEM client certificate followed by its private key
    pub identity_pem: Option<Vec<u8>>,
    pub insecure_skip_tls_verify: bool,
}

impl std::fmt::Debug for KubeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeConfig")
            .field("server", &self.server)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("ca_pem", &self.ca_pem.is_some())
            .field("identity_pem", &self.identity_pem.is_some())
            .field("insecure_skip_tls_verify", &self.insecure_skip_tls_verify)
            .finish()
    }
}

impl KubeConfig {
    /// Kubeconfig file when given, in-cluster service account otherwise
    pub fn load(kubeconfig: Option<&Path>) -> Result<Self> {
        match kubeconfig {
            Some(path) => Self::from_kubeconfig(path),
            None => Self::in_cluster(),
        }
    }

    pub fn in_cluster() -> Result<Self> {
        Self::in_cluster_from(Path::new(SERVICE_ACCOUNT_DIR))
    }

    fn in_cluster_from(account_dir: &Path) -> Result<Self> {
        let host = std::env::var(SERVICE_HOST_ENV)
            .with_context(|| format!("{} is not set, not running in a cluster?", SERVICE_HOST_ENV))?;
        let port = std::env::var(SERVICE_PORT_ENV)
            .with_context(|| format!("{} is not set, not running in a cluster?", SERVICE_PORT_ENV))?;

        // IPv6 service hosts need brackets in the authority
        let server = if host.contains(':') {
            format!("https://[{}]:{}", host, port)
        } else {
            format!("https://{}:{}", host, port)
        };

        let token_path = account_dir.join("token");
        let token = std::fs::read_to_string(&token_path)
            .with_context(|| format!("Failed to read service account token {}", token_path.display()))?;
        let ca_path = account_dir.join("ca.crt");
        let ca = std::fs::read(&ca_path)
            .with_context(|| format!("Failed to read service account CA {}", ca_path.display()))?;

        Ok(Self {
            server,
            token: Some(token.trim().to_string()),
            ca_pem: Some(ca),
            identity_pem: None,
            insecure_skip_tls_verify: false,
        })
    }

    pub fn from_kubeconfig(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?;
        let file: KubeconfigFile = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse kubeconfig {}", path.display()))?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        file.resolve(&base_dir)
    }
}

// ============================================================================
// Kubeconfig File Model
// ============================================================================

#[derive(Debug, Deserialize)]
struct KubeconfigFile {
    #[serde(rename = "current-context", default)]
    current_context: String,
    #[serde(default)]
    clusters: Vec<Named<ClusterEntry>>,
    #[serde(default)]
    users: Vec<Named<UserEntry>>,
    #[serde(default)]
    contexts: Vec<Named<ContextEntry>>,
}

#[derive(Debug, Deserialize)]
struct Named<T> {
    name: String,
    #[serde(alias = "cluster", alias = "user", alias = "context")]
    value: T,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ClusterEntry {
    server: String,
    certificate_authority: Option<String>,
    certificate_authority_data: Option<String>,
    #[serde(default)]
    insecure_skip_tls_verify: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct UserEntry {
    token: Option<String>,
    #[serde(rename = "tokenFile")]
    token_file: Option<String>,
    client_certificate: Option<String>,
    client_certificate_data: Option<String>,
    client_key: Option<String>,
    client_key_data: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ContextEntry {
    cluster: String,
    #[serde(default)]
    user: String,
}

impl KubeconfigFile {
    fn resolve(self, base_dir: &Path) -> Result<KubeConfig> {
        let context_name = if self.current_context.is_empty() {
            self.contexts
                .first()
                .map(|c| c.name.clone())
                .ok_or_else(|| anyhow!("kubeconfig has no contexts"))?
        } else {
            self.current_context.clone()
        };

        let context = find(&self.contexts, &context_name)
            .with_context(|| format!("context {:?} not found in kubeconfig", context_name))?;
        let cluster = find(&self.clusters, &context.cluster)
            .with_context(|| format!("cluster {:?} not found in kubeconfig", context.cluster))?;
        let user = if context.user.is_empty() {
            None
        } else {
            Some(
                find(&self.users, &context.user)
                    .with_context(|| format!("user {:?} not found in kubeconfig", context.user))?,
            )
        };

        if cluster.server.is_empty() {
            bail!("cluster {:?} has no server", context.cluster);
        }

        let ca_pem = data_or_file(
            cluster.certificate_authority_data.as_deref(),
            cluster.certificate_authority.as_deref(),
            base_dir,
        )
        .context("Failed to load certificate authority")?;

        let mut token = None;
        let mut identity_pem = None;
        if let Some(user) = user {
            token = match (&user.token, &user.token_file) {
                (Some(token), _) => Some(token.clone()),
                (None, Some(file)) => {
                    let path = relative_to(base_dir, file);
                    let token = std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read token file {}", path.display()))?;
                    Some(token.trim().to_string())
                }
                (None, None) => None,
            };

            let cert = data_or_file(
                user.client_certificate_data.as_deref(),
                user.client_certificate.as_deref(),
                base_dir,
            )
            .context("Failed to load client certificate")?;
            let key = data_or_file(user.client_key_data.as_deref(), user.client_key.as_deref(), base_dir)
                .context("Failed to load client key")?;

            identity_pem = match (cert, key) {
                (Some(mut cert), Some(key)) => {
                    if !cert.ends_with(b"\n") {
                        cert.push(b'\n');
                    }
                    cert.extend_from_slice(&key);
                    Some(cert)
                }
                (None, None) => None,
                _ => bail!("client certificate and client key must be set together"),
            };
        }

        Ok(KubeConfig {
            server: cluster.server.trim_end_matches('/').to_string(),
            token,
            ca_pem,
            identity_pem,
            insecure_skip_tls_verify: cluster.insecure_skip_tls_verify,
        })
    }
}

fn find<'a, T>(entries: &'a [Named<T>], name: &str) -> Option<&'a T> {
    entries.iter().find(|e| e.name == name).map(|e| &e.value)
}

fn relative_to(base_dir: &Path, file: &str) -> PathBuf {
    let path = Path::new(file);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

fn data_or_file(data: Option<&str>, file: Option<&str>, base_dir: &Path) -> Result<Option<Vec<u8>>> {
    if let Some(data) = data.filter(|d| !d.is_empty()) {
        return STANDARD
            .decode(data.trim())
            .map(Some)
            .context("invalid base64 data");
    }
    if let Some(file) = file.filter(|f| !f.is_empty()) {
        let path = relative_to(base_dir, file);
        return std::fs::read(&path)
            .map(Some)
            .with_context(|| format!("Failed to read {}", path.display()));
    }
    Ok(None)
}
