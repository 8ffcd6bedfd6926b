// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits at the seams of the Keyward core.
//!
//! Persistence, rate limiting, and audit sinks are external collaborators;
//! the managers in `keyward-auth` and `keyward-audit` only see these traits.
//! All async traits use `#[async_trait]` for dynamic dispatch compatibility.

pub mod audit;
pub mod rate_limit;
pub mod storage;

pub use audit::{AuditSink, NoopAuditSink};
pub use rate_limit::RateLimiter;
pub use storage::{AuditStore, EnvelopeStore, SecretStore, SessionStore};
