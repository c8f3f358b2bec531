// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Mount Table Domain Interface
//!
//! The node service bind-mounts the merged view published by the attach pod
//! into the workload's target path. This module defines the mount table
//! model (one [`MountPoint`] per `/proc/self/mountinfo` line) and the
//! [`Mounter`] contract the mount manager drives. Implementations live in
//! `crate::infrastructure::mount`.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Anti-corruption boundary over the host mount utilities

use async_trait::async_trait;
use std::io;
use std::path::Path;
use thiserror::Error;

/// One entry of the host mount table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPoint {
    /// Unique mount id
    pub id: u32,
    pub parent_id: u32,
    pub major: u32,
    pub minor: u32,
    /// Path within the source filesystem that forms the root of this mount
    pub root: String,
    /// Where the mount is visible
    pub path: String,
    pub fs_type: String,
    /// Mount source (device, remote or bind source)
    pub device: String,
    pub options: Vec<String>,
}

/// Options for bind-mounting a published volume
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishOptions {
    pub fs_type: String,
    pub read_only: bool,
    pub mount_flags: Vec<String>,
}

#[async_trait]
pub trait Mounter: Send + Sync {
    /// Snapshot of the current mount table
    async fn list(&self) -> Result<Vec<MountPoint>, MountError>;

    async fn mount(
        &self,
        source: &str,
        target: &str,
        fs_type: &str,
        options: &[String],
    ) -> Result<(), MountError>;

    async fn unmount(&self, target: &str) -> Result<(), MountError>;
}

#[derive(Debug, Error)]
pub enum MountError {
    #[error("{path} does not exist")]
    NotFound { path: String },

    #[error("{path} is corrupted: {source}")]
    Corrupted {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("error checking {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("found more than one mount reference to source {source_path} that is not target {target}: {refs:?}")]
    AmbiguousReferences {
        source_path: String,
        target: String,
        refs: Vec<String>,
    },

    #[error("target {0} is already mounted by a different device, will not attempt to mount")]
    TargetBusy(String),

    #[error("{command} failed: {output}")]
    Command { command: String, output: String },

    #[error("failed to parse mount table: {0}")]
    Parse(String),

    #[error("failed to unmount path {0}")]
    StillMounted(String),
}

/// errno values that mark a mount as unusable but still present
const CORRUPTED_MNT_ERRNOS: [i32; 5] = [
    libc::ENOTCONN,
    libc::ESTALE,
    libc::EIO,
    libc::EACCES,
    libc::EHOSTDOWN,
];

/// Whether `err` is the signature of a disconnected or stale mount
pub fn is_corrupted_mnt(err: &io::Error) -> bool {
    err.raw_os_error()
        .map(|errno| CORRUPTED_MNT_ERRNOS.contains(&errno))
        .unwrap_or(false)
}

/// `Ok(true)` if `path` exists, `Ok(false)` if it does not
///
/// A corrupted mount counts as existing but is still reported as an error so
/// callers can tell it apart.
pub fn path_exists(path: &Path) -> Result<bool, MountError> {
    match std::fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) if is_corrupted_mnt(&e) => Err(MountError::Corrupted {
            path: path.display().to_string(),
            source: e,
        }),
        Err(e) => Err(MountError::Io {
            path: path.display().to_string(),
            source: e,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_corrupted_mnt() {
        assert!(is_corrupted_mnt(&io::Error::from_raw_os_error(libc::ENOTCONN)));
        assert!(is_corrupted_mnt(&io::Error::from_raw_os_error(libc::ESTALE)));
        assert!(!is_corrupted_mnt(&io::Error::from_raw_os_error(libc::ENOENT)));
        assert!(!is_corrupted_mnt(&io::Error::other("plain")));
    }

    #[test]
    fn test_path_exists() {
        let dir = tempfile::tempdir().unwrap();
        assert!(path_exists(dir.path()).unwrap());
        assert!(!path_exists(&dir.path().join("missing")).unwrap());
    }
}
