// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Cluster Resource Store Domain Interface
//!
//! Defines the keyed `get` / `create` / `delete` contract the driver uses to
//! persist split plans and to manage claims, attach pods and node lookups.
//! Concrete stores live in `crate::infrastructure::kube`.
//!
//! The store is the only serialization point for concurrent requests: every
//! create path must handle [`StoreError::AlreadyExists`] explicitly.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Anti-corruption boundary over the cluster API server

use async_trait::async_trait;
use serde::de::{self, DeserializeOwned, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

// ============================================================================
// Object Metadata
// ============================================================================

/// Subset of Kubernetes `ObjectMeta` the driver reads or writes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,

    /// Set by the API server once graceful deletion has started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<String>,
}

impl ObjectMeta {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
            ..Default::default()
        }
    }
}

// ============================================================================
// Resource Trait
// ============================================================================

/// A typed cluster object addressable by a [`ResourceKey`]
pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// `v1` for the core group, `<group>/<version>` otherwise
    const API_VERSION: &'static str;
    const KIND: &'static str;
    /// Lower-case plural used in REST paths
    const PLURAL: &'static str;
    const NAMESPACED: bool;

    fn metadata(&self) -> &ObjectMeta;

    fn metadata_mut(&mut self) -> &mut ObjectMeta;

    fn key(&self) -> ResourceKey {
        let meta = self.metadata();
        ResourceKey {
            namespace: if Self::NAMESPACED { meta.namespace.clone() } else { None },
            name: meta.name.clone(),
        }
    }
}

/// Namespace/name pair identifying a single object of one resource type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub namespace: Option<String>,
    pub name: String,
}

impl ResourceKey {
    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

// ============================================================================
// Store Trait
// ============================================================================

#[async_trait]
pub trait ResourceStore<R: Resource>: Send + Sync {
    /// Fetch the object stored under `key`
    async fn get(&self, key: &ResourceKey) -> Result<R, StoreError>;

    /// Persist a new object; fails with `AlreadyExists` when the key is taken
    async fn create(&self, resource: &R) -> Result<R, StoreError>;

    /// Request deletion of the object stored under `key`
    async fn delete(&self, key: &ResourceKey) -> Result<(), StoreError>;
}

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {key} not found")]
    NotFound { kind: &'static str, key: String },

    #[error("{kind} {key} already exists")]
    AlreadyExists { kind: &'static str, key: String },

    #[error("API server returned {status} for {kind} {key}: {message}")]
    Api {
        kind: &'static str,
        key: String,
        status: u16,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid client configuration: {0}")]
    Config(String),
}

impl StoreError {
    pub fn not_found<R: Resource>(key: &ResourceKey) -> Self {
        StoreError::NotFound {
            kind: R::KIND,
            key: key.to_string(),
        }
    }

    pub fn already_exists<R: Resource>(key: &ResourceKey) -> Self {
        StoreError::AlreadyExists {
            kind: R::KIND,
            key: key.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists { .. })
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Network(err.to_string())
    }
}

// ============================================================================
// Quantities
// ============================================================================

/// Resource name of storage capacity in a [`ResourceList`]
pub const RESOURCE_STORAGE: &str = "storage";

pub type ResourceList = BTreeMap<String, Quantity>;

/// A Kubernetes resource quantity, held as a whole number of bytes
///
/// Accepts the binary (`Ki`..`Ei`) and decimal (`k`..`E`, `m`) suffixes on
/// input, rounding fractional values up. Always serializes as a plain integer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quantity(pub i64);

impl Quantity {
    pub fn from_bytes(bytes: i64) -> Self {
        Quantity(bytes)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn parse(input: &str) -> Result<Self, String> {
        let trimmed = input.trim();
        let split = trimmed
            .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
            .unwrap_or(trimmed.len());
        let (number, suffix) = trimmed.split_at(split);
        if number.is_empty() {
            return Err(format!("quantity {:?} has no numeric part", input));
        }

        let multiplier: f64 = match suffix {
            "" => 1.0,
            "Ki" => 1024.0,
            "Mi" => 1024f64.powi(2),
            "Gi" => 1024f64.powi(3),
            "Ti" => 1024f64.powi(4),
            "Pi" => 1024f64.powi(5),
            "Ei" => 1024f64.powi(6),
            "m" => 1e-3,
            "k" => 1e3,
            "M" => 1e6,
            "G" => 1e9,
            "T" => 1e12,
            "P" => 1e15,
            "E" => 1e18,
            other => return Err(format!("quantity {:?} has unknown suffix {:?}", input, other)),
        };

        if suffix.is_empty() {
            if let Ok(whole) = number.parse::<i64>() {
                return Ok(Quantity(whole));
            }
        }

        let value: f64 = number
            .parse()
            .map_err(|e| format!("quantity {:?} is not a number: {}", input, e))?;
        Ok(Quantity((value * multiplier).ceil() as i64))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct QuantityVisitor;

        impl<'de> Visitor<'de> for QuantityVisitor {
            type Value = Quantity;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a quantity string or integer")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Quantity, E> {
                Quantity::parse(v).map_err(E::custom)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Quantity, E> {
                Ok(Quantity(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Quantity, E> {
                i64::try_from(v).map(Quantity).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(QuantityVisitor)
    }
}

/// Storage capacity recorded in `list`, zero when absent
pub fn storage_of(list: &ResourceList) -> i64 {
    list.get(RESOURCE_STORAGE).map(Quantity::value).unwrap_or(0)
}
