// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Bounded Exponential Backoff
//!
//! Polls a condition with increasing intervals until it yields a value, fails,
//! the step budget is spent or the call context ends. Every step checks the
//! context before running the condition, and no sleep follows the last step.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Polling primitive for attach/detach observation

use std::future::Future;
use std::time::Duration;

use crate::application::context::CallContext;
use crate::domain::errors::UnionError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    /// Interval before the second attempt
    pub duration: Duration,
    /// Multiplier applied to `duration` after every sleep
    pub factor: f64,
    /// Maximum number of condition evaluations
    pub steps: u32,
}

impl Backoff {
    /// Attach wait: 1s initial interval, x1.5, 12 attempts
    pub fn attach() -> Self {
        Self {
            duration: Duration::from_secs(1),
            factor: 1.5,
            steps: 12,
        }
    }

    /// Detach wait: 1s initial interval, x2.0, 12 attempts
    pub fn detach() -> Self {
        Self {
            duration: Duration::from_secs(1),
            factor: 2.0,
            steps: 12,
        }
    }

    fn step(&mut self) -> Duration {
        let current = self.duration;
        if self.factor > 0.0 {
            self.duration = self.duration.mul_f64(self.factor);
        }
        current
    }
}

/// Run `condition` until it returns `Ok(Some(_))` or an error
///
/// `Ok(None)` means "not done yet". Exhausting all steps yields
/// [`UnionError::WaitTimeout`]; an ended context yields `Cancelled` or
/// `DeadlineExceeded`.
pub async fn exponential_backoff<T, F, Fut>(
    ctx: &CallContext,
    mut backoff: Backoff,
    mut condition: F,
) -> Result<T, UnionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, UnionError>>,
{
    while backoff.steps > 0 {
        ctx.check()?;

        if let Some(value) = condition().await? {
            return Ok(value);
        }

        if backoff.steps == 1 {
            break;
        }
        backoff.steps -= 1;

        let wait = backoff.step();
        ctx.sleep(wait).await?;
    }

    Err(UnionError::WaitTimeout)
}
