// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Mount Manager Application Service
//!
//! Bind-mounts the merged view published by the attach pod into a workload
//! target path, and undoes it. Both directions are safe to repeat: a target
//! already bound to the source is left alone, and cleaning up a target that
//! is gone or no longer mounted succeeds.
//!
//! Mount references are resolved from the mount table the same way the
//! kubelet mount utilities do: find the mount holding the path (last match
//! wins, later mounts shadow earlier ones), derive the filesystem root and
//! device of the path, then collect every other mount of that root on that
//! device.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Node-local publish/unpublish of union volumes

use async_trait::async_trait;
use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::mount::{is_corrupted_mnt, path_exists, MountError, MountPoint, Mounter, PublishOptions};

// ============================================================================
// Service Trait
// ============================================================================

#[async_trait]
pub trait MountManager: Send + Sync {
    /// Bind-mount `source` at `target`
    async fn publish(&self, source: &str, target: &str, options: &PublishOptions) -> Result<(), MountError>;

    /// Unmount and remove `target`
    async fn unpublish(&self, target: &str) -> Result<(), MountError>;
}

// ============================================================================
// Standard Implementation
// ============================================================================

pub struct StandardMountManager {
    mounter: Arc<dyn Mounter>,
}

impl StandardMountManager {
    pub fn new(mounter: Arc<dyn Mounter>) -> Self {
        Self { mounter }
    }

    /// Other mount points showing the same filesystem root as `path`
    ///
    /// A missing or corrupted `path` has no references.
    pub async fn get_mount_refs(&self, path: &str) -> Result<Vec<String>, MountError> {
        match path_exists(Path::new(path)) {
            Ok(true) => {}
            Ok(false) => return Ok(Vec::new()),
            Err(MountError::Corrupted { .. }) => {
                warn!(path = %path, "Found corrupted mount, treating as unmounted path");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        }

        let resolved = resolve(path).await?;
        let mounts = self.mounter.list().await?;
        search_mount_points(&resolved, &mounts)
    }

    /// Whether `path` is itself a mount point
    ///
    /// Fails with [`MountError::NotFound`] when `path` does not exist.
    pub async fn is_mount_point(&self, path: &str) -> Result<bool, MountError> {
        let resolved = resolve(path).await?;
        let mounts = self.mounter.list().await?;
        Ok(mounts.iter().any(|mp| Path::new(&mp.path) == resolved))
    }

    /// Unmount `path` if needed and remove it
    pub async fn cleanup_mount_point(&self, path: &str) -> Result<(), MountError> {
        let corrupted = match path_exists(Path::new(path)) {
            Ok(false) => {
                debug!(path = %path, "Mount point does not exist, nothing to clean up");
                return Ok(());
            }
            Ok(true) => false,
            Err(MountError::Corrupted { .. }) => true,
            Err(e) => return Err(e),
        };

        if !corrupted && self.remove_path_if_not_mount_point(path).await? {
            return Ok(());
        }

        debug!(path = %path, "Path is a mount point, unmounting");
        self.mounter.unmount(path).await?;

        if self.remove_path_if_not_mount_point(path).await? {
            debug!(path = %path, "Path is unmounted, deleted the directory");
            return Ok(());
        }
        Err(MountError::StillMounted(path.to_string()))
    }

    /// Returns true if `path` is not a mount point (it is removed if present)
    async fn remove_path_if_not_mount_point(&self, path: &str) -> Result<bool, MountError> {
        match self.is_mount_point(path).await {
            Ok(true) => Ok(false),
            Ok(false) => {
                debug!(path = %path, "Path is not a mount point, deleting");
                let metadata = tokio::fs::symlink_metadata(path).await.map_err(|e| io_error(path, e))?;
                let removal = if metadata.is_dir() {
                    tokio::fs::remove_dir(path).await
                } else {
                    tokio::fs::remove_file(path).await
                };
                removal.map_err(|e| io_error(path, e))?;
                Ok(true)
            }
            Err(MountError::NotFound { .. }) => Ok(true),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl MountManager for StandardMountManager {
    async fn publish(&self, source: &str, target: &str, options: &PublishOptions) -> Result<(), MountError> {
        if !path_exists(Path::new(source))? {
            return Err(MountError::NotFound {
                path: source.to_string(),
            });
        }

        let refs = self.get_mount_refs(source).await?;
        match refs.as_slice() {
            [] => {}
            [only] if only == target => {
                info!(source = %source, target = %target, "Target already mounted by source");
                return Ok(());
            }
            _ => {
                return Err(MountError::AmbiguousReferences {
                    source_path: source.to_string(),
                    target: target.to_string(),
                    refs,
                })
            }
        }

        match self.is_mount_point(target).await {
            Ok(true) => return Err(MountError::TargetBusy(target.to_string())),
            Ok(false) | Err(MountError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        tokio::fs::DirBuilder::new()
            .recursive(true)
            .mode(0o755)
            .create(target)
            .await
            .map_err(|e| io_error(target, e))?;

        let mut mount_options = Vec::with_capacity(options.mount_flags.len() + 2);
        mount_options.push("bind".to_string());
        mount_options.extend(options.mount_flags.iter().cloned());
        if options.read_only {
            mount_options.push("ro".to_string());
        }

        self.mounter.mount(source, target, "", &mount_options).await?;
        info!(source = %source, target = %target, "Mounted source at target");
        Ok(())
    }

    async fn unpublish(&self, target: &str) -> Result<(), MountError> {
        if let Err(e) = self.cleanup_mount_point(target).await {
            if e.to_string().contains("not mounted") {
                info!(target = %target, "Ignoring 'not mounted' error for target");
            } else {
                return Err(e);
            }
        }
        info!(target = %target, "Cleaned up target");
        Ok(())
    }
}

fn io_error(path: &str, err: io::Error) -> MountError {
    if err.kind() == io::ErrorKind::NotFound {
        MountError::NotFound {
            path: path.to_string(),
        }
    } else if is_corrupted_mnt(&err) {
        MountError::Corrupted {
            path: path.to_string(),
            source: err,
        }
    } else {
        MountError::Io {
            path: path.to_string(),
            source: err,
        }
    }
}

/// Resolve symlinks the way the kernel reports paths in the mount table
async fn resolve(path: &str) -> Result<PathBuf, MountError> {
    tokio::fs::canonicalize(path).await.map_err(|e| io_error(path, e))
}

/// Mount points, other than the one holding `path`, that share its root and device
pub fn search_mount_points(path: &Path, mounts: &[MountPoint]) -> Result<Vec<String>, MountError> {
    let holder = mounts
        .iter()
        .rev()
        .find(|mp| path.starts_with(&mp.path))
        .ok_or_else(|| MountError::Parse(format!("failed to get root path and major:minor for {}", path.display())))?;

    let relative = path.strip_prefix(&holder.path).unwrap_or(Path::new(""));
    let root_path = if relative.as_os_str().is_empty() {
        PathBuf::from(&holder.root)
    } else {
        Path::new(&holder.root).join(relative)
    };

    Ok(mounts
        .iter()
        .filter(|mp| mp.id != holder.id)
        .filter(|mp| Path::new(&mp.root) == root_path && mp.major == holder.major && mp.minor == holder.minor)
        .map(|mp| mp.path.clone())
        .collect())
}
