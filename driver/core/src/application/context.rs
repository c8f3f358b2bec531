// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Call Context
//!
//! Carries the cancellation signal and optional deadline of one RPC into the
//! long-running attach/detach waits. The presentation layer derives a child
//! of the server shutdown token per call and attaches the `grpc-timeout`
//! deadline when the client sent one.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Cancellation and deadline propagation

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::domain::errors::UnionError;

#[derive(Debug, Clone)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// A context that is never cancelled and has no deadline
    pub fn background() -> Self {
        Self::new(CancellationToken::new())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        });
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Error describing why the context is done, `Ok` while it is live
    pub fn check(&self) -> Result<(), UnionError> {
        if self.token.is_cancelled() {
            return Err(UnionError::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(UnionError::DeadlineExceeded);
            }
        }
        Ok(())
    }

    /// Sleep for `duration` unless the context ends first
    pub async fn sleep(&self, duration: Duration) -> Result<(), UnionError> {
        let deadline = self.deadline;
        let until_deadline = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = self.token.cancelled() => Err(UnionError::Cancelled),
            _ = until_deadline => Err(UnionError::DeadlineExceeded),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::background()
    }
}
