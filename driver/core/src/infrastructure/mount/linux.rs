// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Linux Mounter
//!
//! Reads the mount table from `/proc/self/mountinfo` and shells out to the
//! `mount` / `umount` binaries. Bind mounts carrying extra options are done in
//! two steps (`bind`, then `bind,remount,<opts>`) since the kernel ignores
//! most flags on the initial bind.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Host mount utilities adapter

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::domain::mount::{MountError, MountPoint, Mounter};

pub const PROC_MOUNTINFO: &str = "/proc/self/mountinfo";

pub struct LinuxMounter {
    mountinfo_path: String,
}

impl LinuxMounter {
    pub fn new() -> Self {
        Self {
            mountinfo_path: PROC_MOUNTINFO.to_string(),
        }
    }

    async fn run(&self, program: &str, args: &[String]) -> Result<(), MountError> {
        let command = format!("{} {}", program, args.join(" "));
        debug!(command = %command, "Running mount command");

        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| MountError::Command {
                command: command.clone(),
                output: e.to_string(),
            })?;

        if output.status.success() {
            return Ok(());
        }

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Err(MountError::Command {
            command,
            output: format!("{} ({})", combined.trim(), output.status),
        })
    }
}

impl Default for LinuxMounter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Mounter for LinuxMounter {
    async fn list(&self) -> Result<Vec<MountPoint>, MountError> {
        let content = tokio::fs::read_to_string(&self.mountinfo_path)
            .await
            .map_err(|e| MountError::Io {
                path: self.mountinfo_path.clone(),
                source: e,
            })?;
        parse_mountinfo(&content)
    }

    async fn mount(
        &self,
        source: &str,
        target: &str,
        fs_type: &str,
        options: &[String],
    ) -> Result<(), MountError> {
        let (bind, remount_options) = make_bind_opts(options);

        if bind {
            self.run("mount", &mount_args(source, target, "", &["bind".to_string()]))
                .await?;
            if let Some(remount) = remount_options {
                self.run("mount", &mount_args(source, target, "", &remount)).await?;
            }
            return Ok(());
        }

        self.run("mount", &mount_args(source, target, fs_type, options)).await
    }

    async fn unmount(&self, target: &str) -> Result<(), MountError> {
        self.run("umount", &[target.to_string()]).await
    }
}

/// `(is_bind, remount_options)`; remount is only needed when a bind mount
/// carries options beyond `bind` / `remount`
fn make_bind_opts(options: &[String]) -> (bool, Option<Vec<String>>) {
    if !options.iter().any(|o| o == "bind" || o == "rbind") {
        return (false, None);
    }

    let extra: Vec<String> = options
        .iter()
        .filter(|o| !matches!(o.as_str(), "bind" | "rbind" | "remount"))
        .cloned()
        .collect();
    if extra.is_empty() {
        return (true, None);
    }

    let mut remount = vec!["bind".to_string(), "remount".to_string()];
    remount.extend(extra);
    (true, Some(remount))
}

fn mount_args(source: &str, target: &str, fs_type: &str, options: &[String]) -> Vec<String> {
    let mut args = Vec::new();
    if !fs_type.is_empty() {
        args.push("-t".to_string());
        args.push(fs_type.to_string());
    }
    if !options.is_empty() {
        args.push("-o".to_string());
        args.push(options.join(","));
    }
    args.push(source.to_string());
    args.push(target.to_string());
    args
}

/// Parse `/proc/<pid>/mountinfo`
///
/// `36 35 98:0 /mnt1 /mnt2 rw,noatime master:1 - ext3 /dev/root rw,errors=continue`
pub fn parse_mountinfo(content: &str) -> Result<Vec<MountPoint>, MountError> {
    let mut mounts = Vec::new();

    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let separator = fields
            .iter()
            .position(|f| *f == "-")
            .ok_or_else(|| MountError::Parse(format!("missing separator in line {:?}", line)))?;
        if separator < 6 || fields.len() < separator + 3 {
            return Err(MountError::Parse(format!("unexpected field count in line {:?}", line)));
        }

        let number = |value: &str| {
            value
                .parse::<u32>()
                .map_err(|e| MountError::Parse(format!("invalid number {:?} in line {:?}: {}", value, line, e)))
        };
        let (major, minor) = fields[2]
            .split_once(':')
            .ok_or_else(|| MountError::Parse(format!("invalid major:minor {:?}", fields[2])))?;

        mounts.push(MountPoint {
            id: number(fields[0])?,
            parent_id: number(fields[1])?,
            major: number(major)?,
            minor: number(minor)?,
            root: unescape(fields[3]),
            path: unescape(fields[4]),
            fs_type: fields[separator + 1].to_string(),
            device: unescape(fields[separator + 2]),
            options: fields[5].split(',').map(str::to_string).collect(),
        });
    }

    Ok(mounts)
}

/// Decode the octal escapes (`\040` for space) the kernel uses in mountinfo
fn unescape(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let escaped = bytes[i] == b'\\'
            && i + 3 < bytes.len()
            && (b'0'..=b'3').contains(&bytes[i + 1])
            && bytes[i + 2..i + 4].iter().all(|b| (b'0'..=b'7').contains(b));
        if escaped {
            out.push((bytes[i + 1] - b'0') * 64 + (bytes[i + 2] - b'0') * 8 + (bytes[i + 3] - b'0'));
            i += 4;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}
