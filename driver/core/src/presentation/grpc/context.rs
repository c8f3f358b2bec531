// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Per-call context derivation: a child of the server shutdown token plus
//! the client deadline carried in the `grpc-timeout` header.

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tonic::metadata::MetadataMap;

use crate::application::context::CallContext;

const GRPC_TIMEOUT_HEADER: &str = "grpc-timeout";

pub fn call_context(shutdown: &CancellationToken, metadata: &MetadataMap) -> CallContext {
    let ctx = CallContext::new(shutdown.child_token());
    match metadata
        .get(GRPC_TIMEOUT_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_grpc_timeout)
    {
        Some(timeout) => ctx.with_timeout(timeout),
        None => ctx,
    }
}

/// `TimeoutValue TimeoutUnit`: at most 8 ASCII digits followed by one of
/// `H`, `M`, `S`, `m`, `u`, `n`
pub fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    if value.len() < 2 || value.len() > 9 {
        return None;
    }
    let (digits, unit) = value.split_at(value.len() - 1);
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let amount: u64 = digits.parse().ok()?;

    match unit {
        "H" => Some(Duration::from_secs(amount * 3600)),
        "M" => Some(Duration::from_secs(amount * 60)),
        "S" => Some(Duration::from_secs(amount)),
        "m" => Some(Duration::from_millis(amount)),
        "u" => Some(Duration::from_micros(amount)),
        "n" => Some(Duration::from_nanos(amount)),
        _ => None,
    }
}
