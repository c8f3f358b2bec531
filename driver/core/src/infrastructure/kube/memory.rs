// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-Memory Resource Store
//!
//! `DashMap`-backed [`ResourceStore`] with the same per-key conflict
//! semantics as the API server. Deletes take effect immediately. Used by the
//! test suites and for running the controller without a cluster.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Test double and local backend for the cluster store

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::domain::cluster::{Resource, ResourceKey, ResourceStore, StoreError};

pub struct InMemoryStore<R: Resource> {
    objects: DashMap<ResourceKey, R>,
    revision: AtomicU64,
    /// Number of upcoming `get` calls that report NotFound regardless of state
    hidden_gets: AtomicUsize,
}

impl<R: Resource> InMemoryStore<R> {
    pub fn new() -> Self {
        Self {
            objects: DashMap::new(),
            revision: AtomicU64::new(0),
            hidden_gets: AtomicUsize::new(0),
        }
    }

    /// Insert or replace an object without conflict checks
    pub fn upsert(&self, mut resource: R) {
        self.stamp(&mut resource);
        self.objects.insert(resource.key(), resource);
    }

    /// All stored objects, ordered by key
    pub fn list(&self) -> Vec<R> {
        let mut entries: Vec<(ResourceKey, R)> = self
            .objects
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.into_iter().map(|(_, r)| r).collect()
    }

    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.objects.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Make the next `get` miss, as a lagging cache would
    pub fn hide_next_get(&self) {
        self.hidden_gets.fetch_add(1, Ordering::SeqCst);
    }

    fn stamp(&self, resource: &mut R) {
        let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        resource.metadata_mut().resource_version = Some(revision.to_string());
    }

    fn take_hidden_get(&self) -> bool {
        self.hidden_gets
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl<R: Resource> Default for InMemoryStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: Resource> ResourceStore<R> for InMemoryStore<R> {
    async fn get(&self, key: &ResourceKey) -> Result<R, StoreError> {
        if self.take_hidden_get() {
            return Err(StoreError::not_found::<R>(key));
        }
        self.objects
            .get(key)
            .map(|r| r.value().clone())
            .ok_or_else(|| StoreError::not_found::<R>(key))
    }

    async fn create(&self, resource: &R) -> Result<R, StoreError> {
        let key = resource.key();
        if key.name.is_empty() {
            return Err(StoreError::Api {
                kind: R::KIND,
                key: key.to_string(),
                status: 422,
                message: "metadata.name: Required value".to_string(),
            });
        }
        if R::NAMESPACED && key.namespace.is_none() {
            return Err(StoreError::Api {
                kind: R::KIND,
                key: key.to_string(),
                status: 422,
                message: "metadata.namespace: Required value".to_string(),
            });
        }

        match self.objects.entry(key.clone()) {
            Entry::Occupied(_) => Err(StoreError::already_exists::<R>(&key)),
            Entry::Vacant(slot) => {
                let mut stored = resource.clone();
                self.stamp(&mut stored);
                slot.insert(stored.clone());
                Ok(stored)
            }
        }
    }

    async fn delete(&self, key: &ResourceKey) -> Result<(), StoreError> {
        self.objects
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found::<R>(key))
    }
}
