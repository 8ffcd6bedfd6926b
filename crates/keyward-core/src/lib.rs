// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Keyward secret vault.
//!
//! This crate provides the error taxonomy, domain types, and collaborator
//! traits used throughout the Keyward workspace. Storage backends and audit
//! sinks implement traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{ErrorKind, KeywardError};
pub use types::{
    AuditEntry, AuditEvent, AuditMeta, EncryptedPayload, EncryptedVaultKeyEnvelope, KdfCost,
    KdfParams, RateCount, SecretRecord, SecretRecordWire, SecretType, Session, SessionFilter,
    UnlockMaterial,
};

pub use traits::{
    AuditSink, AuditStore, EnvelopeStore, NoopAuditSink, RateLimiter, SecretStore, SessionStore,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_collaborator_traits_are_exported() {
        // Compile-time check that every seam is reachable from the crate root
        // and object safe.
        fn _session(_: &dyn SessionStore) {}
        fn _secret(_: &dyn SecretStore) {}
        fn _envelope(_: &dyn EnvelopeStore) {}
        fn _audit_store(_: &dyn AuditStore) {}
        fn _limiter(_: &dyn RateLimiter) {}
        fn _sink(_: &dyn AuditSink) {}
    }

    #[test]
    fn noop_sink_accepts_events() {
        let sink = NoopAuditSink;
        sink.append(AuditEvent::Signup, Some("user-1"), AuditMeta::new());
        sink.append(AuditEvent::SessionRevoked, None, AuditMeta::new());
    }
}
