// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Fake Mounter
//!
//! In-memory mount table with mountinfo semantics: bind mounts inherit the
//! root and device of the mount holding their source, every other mount gets
//! a fresh device. Nothing touches the host.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Test double for the host mount utilities

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::Path;

use crate::domain::mount::{MountError, MountPoint, Mounter};

const ROOT_ID: u32 = 1;

struct MountTable {
    mounts: Vec<MountPoint>,
    next_id: u32,
    unmount_failures: Vec<String>,
}

pub struct FakeMounter {
    table: Mutex<MountTable>,
}

impl FakeMounter {
    /// A table holding only the root filesystem
    pub fn new() -> Self {
        let root = MountPoint {
            id: ROOT_ID,
            parent_id: 0,
            major: 0,
            minor: ROOT_ID,
            root: "/".to_string(),
            path: "/".to_string(),
            fs_type: "rootfs".to_string(),
            device: "rootfs".to_string(),
            options: vec!["rw".to_string()],
        };
        Self {
            table: Mutex::new(MountTable {
                mounts: vec![root],
                next_id: ROOT_ID + 1,
                unmount_failures: Vec::new(),
            }),
        }
    }

    /// Mount a new filesystem from `device` at `path`
    pub fn add_mount(&self, path: &str, fs_type: &str, device: &str) {
        let mut table = self.table.lock();
        let id = table.next_id;
        table.next_id += 1;
        table.mounts.push(MountPoint {
            id,
            parent_id: ROOT_ID,
            major: 0,
            minor: id,
            root: "/".to_string(),
            path: path.to_string(),
            fs_type: fs_type.to_string(),
            device: device.to_string(),
            options: vec!["rw".to_string()],
        });
    }

    /// Make the next `unmount` fail with `output`
    pub fn fail_next_unmount(&self, output: &str) {
        self.table.lock().unmount_failures.push(output.to_string());
    }
}

impl Default for FakeMounter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Mounter for FakeMounter {
    async fn list(&self) -> Result<Vec<MountPoint>, MountError> {
        Ok(self.table.lock().mounts.clone())
    }

    async fn mount(
        &self,
        source: &str,
        target: &str,
        fs_type: &str,
        options: &[String],
    ) -> Result<(), MountError> {
        let mut table = self.table.lock();
        let id = table.next_id;
        table.next_id += 1;

        let entry = if options.iter().any(|o| o == "bind") {
            let source_path = Path::new(source);
            let holder = table
                .mounts
                .iter()
                .rev()
                .find(|mp| source_path.starts_with(&mp.path))
                .cloned()
                .ok_or_else(|| MountError::Command {
                    command: format!("mount -o bind {} {}", source, target),
                    output: format!("mount: {}: special device does not exist.", source),
                })?;
            let relative = source_path.strip_prefix(&holder.path).unwrap_or(Path::new(""));
            let root = if relative.as_os_str().is_empty() {
                holder.root.clone()
            } else {
                Path::new(&holder.root).join(relative).to_string_lossy().into_owned()
            };
            MountPoint {
                id,
                parent_id: holder.id,
                major: holder.major,
                minor: holder.minor,
                root,
                path: target.to_string(),
                fs_type: holder.fs_type.clone(),
                device: holder.device.clone(),
                options: options.to_vec(),
            }
        } else {
            MountPoint {
                id,
                parent_id: ROOT_ID,
                major: 0,
                minor: id,
                root: "/".to_string(),
                path: target.to_string(),
                fs_type: fs_type.to_string(),
                device: source.to_string(),
                options: options.to_vec(),
            }
        };

        table.mounts.push(entry);
        Ok(())
    }

    async fn unmount(&self, target: &str) -> Result<(), MountError> {
        let mut table = self.table.lock();
        if !table.unmount_failures.is_empty() {
            let output = table.unmount_failures.remove(0);
            return Err(MountError::Command {
                command: format!("umount {}", target),
                output,
            });
        }

        match table.mounts.iter().rposition(|mp| mp.path == target) {
            Some(index) => {
                table.mounts.remove(index);
                Ok(())
            }
            None => Err(MountError::Command {
                command: format!("umount {}", target),
                output: format!("umount: {}: not mounted.", target),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_mount_inherits_root_and_device() {
        let mounter = FakeMounter::new();
        mounter.add_mount("/merged", "fuse.mergerfs", "1:2");
        mounter
            .mount("/merged/sub", "/target", "", &["bind".to_string()])
            .await
            .unwrap();

        let mounts = mounter.list().await.unwrap();
        let source = &mounts[1];
        let bound = &mounts[2];
        assert_eq!((bound.major, bound.minor), (source.major, source.minor));
        assert_eq!(bound.root, "/sub");
        assert_eq!(bound.fs_type, "fuse.mergerfs");
    }

    #[tokio::test]
    async fn test_unmount_unknown_target_reports_not_mounted() {
        let mounter = FakeMounter::new();
        let err = mounter.unmount("/nowhere").await.unwrap_err();
        assert!(err.to_string().contains("not mounted"));
    }
}
