// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Keyward integration tests.
//!
//! # Components
//!
//! - [`TestHarness`] - temp SQLite database, fast KDF registry, recording audit sink
//! - [`RecordingAuditSink`] - captures audit events for assertions
//! - [`MemoryRateLimiter`] / [`FailingRateLimiter`] - rate-limit collaborators

pub mod harness;
pub mod mocks;

pub use harness::{TEST_AUDIT_SECRET, TestHarness, fast_kdf_config};
pub use mocks::{FailingRateLimiter, MemoryRateLimiter, RecordedEvent, RecordingAuditSink};
