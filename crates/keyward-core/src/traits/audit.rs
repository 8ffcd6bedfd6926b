// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sink for security events.

use crate::types::{AuditEvent, AuditMeta};

/// Receives security events from the session and secret paths.
///
/// `append` is fire-and-forget: it must not block the caller and must not
/// report failure back to it. Implementations route their own failures to
/// the operational log.
pub trait AuditSink: Send + Sync {
    fn append(&self, event: AuditEvent, user_id: Option<&str>, meta: AuditMeta);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn append(&self, _event: AuditEvent, _user_id: Option<&str>, _meta: AuditMeta) {}
}
