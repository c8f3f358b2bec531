// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Kubernetes REST Client
//!
//! Generic [`ResourceStore`] over the API server's REST interface. Paths are
//! derived from the resource type:
//!
//! - core group: `/api/v1[/namespaces/{ns}]/{plural}[/{name}]`
//! - named groups: `/apis/{group}/{version}[/namespaces/{ns}]/{plural}[/{name}]`
//!
//! HTTP 404 and 409 surface as `NotFound` and `AlreadyExists`; any other
//! failure carries the message of the returned `Status` object.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Cluster resource store adapter

use async_trait::async_trait;
use reqwest::{Certificate, Client, Identity, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::domain::cluster::{Resource, ResourceKey, ResourceStore, StoreError};
use crate::infrastructure::kube::config::KubeConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct KubeClient {
    http: Client,
    server: String,
    token: Option<String>,
}

/// `metav1.Status`, as returned on failed requests
#[derive(Debug, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    message: String,
}

impl KubeClient {
    pub fn new(config: &KubeConfig) -> Result<Self, StoreError> {
        let mut builder = Client::builder().timeout(REQUEST_TIMEOUT);

        if let Some(ca) = &config.ca_pem {
            for cert in Certificate::from_pem_bundle(ca)
                .map_err(|e| StoreError::Config(format!("invalid CA bundle: {}", e)))?
            {
                builder = builder.add_root_certificate(cert);
            }
        }
        if let Some(identity) = &config.identity_pem {
            let identity = Identity::from_pem(identity)
                .map_err(|e| StoreError::Config(format!("invalid client certificate: {}", e)))?;
            builder = builder.identity(identity);
        }
        if config.insecure_skip_tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let http = builder
            .build()
            .map_err(|e| StoreError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            server: config.server.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    /// Collection URL when `name` is `None`, object URL otherwise
    pub fn resource_url<R: Resource>(&self, namespace: Option<&str>, name: Option<&str>) -> String {
        let mut url = self.server.clone();
        if R::API_VERSION.contains('/') {
            url.push_str("/apis/");
        } else {
            url.push_str("/api/");
        }
        url.push_str(R::API_VERSION);

        if R::NAMESPACED {
            if let Some(ns) = namespace {
                url.push_str("/namespaces/");
                url.push_str(ns);
            }
        }
        url.push('/');
        url.push_str(R::PLURAL);

        if let Some(name) = name {
            url.push('/');
            url.push_str(name);
        }
        url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check<R: Resource>(key: &ResourceKey, response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        match status {
            StatusCode::NOT_FOUND => Err(StoreError::not_found::<R>(key)),
            StatusCode::CONFLICT => Err(StoreError::already_exists::<R>(key)),
            _ => {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ApiStatus>(&body)
                    .map(|s| s.message)
                    .ok()
                    .filter(|m| !m.is_empty())
                    .unwrap_or(body);
                Err(StoreError::Api {
                    kind: R::KIND,
                    key: key.to_string(),
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

#[async_trait]
impl<R: Resource> ResourceStore<R> for KubeClient {
    async fn get(&self, key: &ResourceKey) -> Result<R, StoreError> {
        let url = self.resource_url::<R>(key.namespace.as_deref(), Some(&key.name));
        debug!(kind = R::KIND, key = %key, "GET {}", url);

        let response = self.authorize(self.http.get(&url)).send().await?;
        let response = Self::check::<R>(key, response).await?;
        Ok(response.json::<R>().await?)
    }

    async fn create(&self, resource: &R) -> Result<R, StoreError> {
        let key = resource.key();
        let url = self.resource_url::<R>(key.namespace.as_deref(), None);
        debug!(kind = R::KIND, key = %key, "POST {}", url);

        let response = self.authorize(self.http.post(&url)).json(resource).send().await?;
        let response = Self::check::<R>(&key, response).await?;
        Ok(response.json::<R>().await?)
    }

    async fn delete(&self, key: &ResourceKey) -> Result<(), StoreError> {
        let url = self.resource_url::<R>(key.namespace.as_deref(), Some(&key.name));
        debug!(kind = R::KIND, key = %key, "DELETE {}", url);

        let response = self.authorize(self.http.delete(&url)).send().await?;
        Self::check::<R>(key, response).await?;
        Ok(())
    }
}
