// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod attacher;
pub mod backoff;
pub mod context;
pub mod mount_manager;
pub mod splitter;
pub mod union;

// Re-export services for convenience
pub use attacher::{Attacher, StandardAttacher};
pub use backoff::Backoff;
pub use context::CallContext;
pub use mount_manager::{MountManager, StandardMountManager};
pub use splitter::{Splitter, StandardSplitter};
pub use union::{StandardUnionService, UnionService};
