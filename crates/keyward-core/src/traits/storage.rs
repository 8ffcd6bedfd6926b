// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence collaborator traits.
//!
//! The record store is treated as an opaque transactional key-value store.
//! The only multi-statement operation the core relies on is
//! [`SessionStore::rotate_session`], which must commit atomically.

use async_trait::async_trait;

use crate::error::KeywardError;
use crate::types::{AuditEntry, EncryptedVaultKeyEnvelope, SecretRecord, Session, SessionFilter};

/// Refresh-session records.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a new session.
    async fn create_session(&self, session: &Session) -> Result<(), KeywardError>;

    /// Look up a session by id.
    async fn get_session(&self, id: &str) -> Result<Option<Session>, KeywardError>;

    /// Delete a session. Returns whether a row was removed.
    async fn delete_session(&self, id: &str) -> Result<bool, KeywardError>;

    /// Atomically delete `old_id` (only if it still carries `expected_hash`)
    /// and insert `replacement`.
    ///
    /// Returns `false` without writing anything when the old session is gone
    /// or its hash has changed, i.e. another rotation already won.
    async fn rotate_session(
        &self,
        old_id: &str,
        expected_hash: &str,
        replacement: &Session,
    ) -> Result<bool, KeywardError>;

    /// Predicate-based bulk delete. Returns the number of rows removed.
    async fn delete_sessions(&self, filter: &SessionFilter) -> Result<usize, KeywardError>;

    /// All sessions belonging to a user, newest first.
    async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>, KeywardError>;
}

/// Encrypted secret records.
///
/// Implementations must run the metadata boundary validator on every create
/// and update before writing; a violation aborts the write.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn create_secret(&self, record: &SecretRecord) -> Result<(), KeywardError>;

    async fn get_secret(&self, id: &str) -> Result<Option<SecretRecord>, KeywardError>;

    /// Replace payload, payload version, and metadata. Returns whether the
    /// record existed.
    async fn update_secret(&self, record: &SecretRecord) -> Result<bool, KeywardError>;

    /// Delete a record owned by `owner_id`. Returns whether a row was removed.
    async fn delete_secret(&self, id: &str, owner_id: &str) -> Result<bool, KeywardError>;

    async fn list_secrets(&self, owner_id: &str) -> Result<Vec<SecretRecord>, KeywardError>;
}

/// Wrapped vault keys, one per user.
#[async_trait]
pub trait EnvelopeStore: Send + Sync {
    /// Store the first envelope for a user. Fails if one already exists.
    async fn put_envelope(
        &self,
        user_id: &str,
        envelope: &EncryptedVaultKeyEnvelope,
    ) -> Result<(), KeywardError>;

    async fn get_envelope(
        &self,
        user_id: &str,
    ) -> Result<Option<EncryptedVaultKeyEnvelope>, KeywardError>;

    /// Replace an existing envelope (password change). Returns whether one
    /// existed.
    async fn replace_envelope(
        &self,
        user_id: &str,
        envelope: &EncryptedVaultKeyEnvelope,
    ) -> Result<bool, KeywardError>;
}

/// Append-only audit rows.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn insert_audit_entry(&self, entry: &AuditEntry) -> Result<(), KeywardError>;

    async fn get_audit_entry(&self, id: &str) -> Result<Option<AuditEntry>, KeywardError>;

    /// Entries oldest first, optionally restricted to one user.
    async fn list_audit_entries(
        &self,
        user_id: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<AuditEntry>, KeywardError>;
}
