// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rate-limit counter collaborator.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::KeywardError;
use crate::types::RateCount;

/// Shared counter used to throttle stateful operations.
///
/// `increment` must be atomic: the count bump and the window expiry are set
/// in a single step, so concurrent callers never observe a counter without
/// an expiry.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Increment the counter for `key`, opening a new window of `window`
    /// length if none is active.
    async fn increment(&self, key: &str, window: Duration) -> Result<RateCount, KeywardError>;

    /// Drop every counter whose window has lapsed. Returns how many were removed.
    async fn purge_expired(&self) -> Result<usize, KeywardError>;
}
