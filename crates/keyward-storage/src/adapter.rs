// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the Keyward persistence traits.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use keyward_config::model::StorageConfig;
use keyward_core::{
    AuditEntry, AuditStore, EncryptedVaultKeyEnvelope, EnvelopeStore, KeywardError, RateCount,
    RateLimiter, SecretRecord, SecretStore, Session, SessionFilter, SessionStore,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed storage.
///
/// Wraps a [`Database`] handle and delegates to the typed query modules.
/// Secret writes pass through the metadata boundary validator first; a
/// rejected record never reaches the database.
#[derive(Clone, Debug)]
pub struct SqliteStorage {
    db: Database,
}

impl SqliteStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Open the configured database and run migrations.
    pub async fn open(config: &StorageConfig) -> Result<Self, KeywardError> {
        let db = Database::open_with(&config.database_path, config.wal_mode).await?;
        debug!(path = %config.database_path, "SQLite storage initialized");
        Ok(Self::new(db))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Checkpoint the WAL before shutdown.
    pub async fn close(&self) -> Result<(), KeywardError> {
        self.db.checkpoint().await
    }

    fn check_metadata(record: &SecretRecord) -> Result<(), KeywardError> {
        keyward_security::validate_metadata(&record.metadata).inspect_err(|e| {
            warn!(
                security_alert = true,
                secret_id = %record.id,
                owner_id = %record.owner_id,
                error = %e,
                "metadata rejected before write"
            );
        })
    }
}

#[async_trait]
impl SessionStore for SqliteStorage {
    async fn create_session(&self, session: &Session) -> Result<(), KeywardError> {
        queries::sessions::create_session(&self.db, session).await
    }

    async fn get_session(&self, id: &str) -> Result<Option<Session>, KeywardError> {
        queries::sessions::get_session(&self.db, id).await
    }

    async fn delete_session(&self, id: &str) -> Result<bool, KeywardError> {
        queries::sessions::delete_session(&self.db, id).await
    }

    async fn rotate_session(
        &self,
        old_id: &str,
        expected_hash: &str,
        replacement: &Session,
    ) -> Result<bool, KeywardError> {
        queries::sessions::rotate_session(&self.db, old_id, expected_hash, replacement).await
    }

    async fn delete_sessions(&self, filter: &SessionFilter) -> Result<usize, KeywardError> {
        queries::sessions::delete_sessions(&self.db, filter).await
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>, KeywardError> {
        queries::sessions::list_sessions(&self.db, user_id).await
    }
}

#[async_trait]
impl SecretStore for SqliteStorage {
    async fn create_secret(&self, record: &SecretRecord) -> Result<(), KeywardError> {
        Self::check_metadata(record)?;
        queries::secrets::insert_secret(&self.db, record).await
    }

    async fn get_secret(&self, id: &str) -> Result<Option<SecretRecord>, KeywardError> {
        queries::secrets::get_secret(&self.db, id).await
    }

    async fn update_secret(&self, record: &SecretRecord) -> Result<bool, KeywardError> {
        Self::check_metadata(record)?;
        queries::secrets::update_secret(&self.db, record).await
    }

    async fn delete_secret(&self, id: &str, owner_id: &str) -> Result<bool, KeywardError> {
        queries::secrets::delete_secret(&self.db, id, owner_id).await
    }

    async fn list_secrets(&self, owner_id: &str) -> Result<Vec<SecretRecord>, KeywardError> {
        queries::secrets::list_secrets(&self.db, owner_id).await
    }
}

#[async_trait]
impl EnvelopeStore for SqliteStorage {
    async fn put_envelope(
        &self,
        user_id: &str,
        envelope: &EncryptedVaultKeyEnvelope,
    ) -> Result<(), KeywardError> {
        if queries::envelopes::insert_envelope(&self.db, user_id, envelope).await? {
            Ok(())
        } else {
            Err(KeywardError::Validation(format!(
                "vault already initialized for user {user_id}"
            )))
        }
    }

    async fn get_envelope(
        &self,
        user_id: &str,
    ) -> Result<Option<EncryptedVaultKeyEnvelope>, KeywardError> {
        queries::envelopes::get_envelope(&self.db, user_id).await
    }

    async fn replace_envelope(
        &self,
        user_id: &str,
        envelope: &EncryptedVaultKeyEnvelope,
    ) -> Result<bool, KeywardError> {
        queries::envelopes::replace_envelope(&self.db, user_id, envelope).await
    }
}

#[async_trait]
impl AuditStore for SqliteStorage {
    async fn insert_audit_entry(&self, entry: &AuditEntry) -> Result<(), KeywardError> {
        queries::audit::insert_audit_entry(&self.db, entry).await
    }

    async fn get_audit_entry(&self, id: &str) -> Result<Option<AuditEntry>, KeywardError> {
        queries::audit::get_audit_entry(&self.db, id).await
    }

    async fn list_audit_entries(
        &self,
        user_id: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<AuditEntry>, KeywardError> {
        queries::audit::list_audit_entries(&self.db, user_id, limit).await
    }
}

#[async_trait]
impl RateLimiter for SqliteStorage {
    async fn increment(&self, key: &str, window: Duration) -> Result<RateCount, KeywardError> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        queries::rate_limit::increment(&self.db, key, window, now_ms).await
    }

    async fn purge_expired(&self) -> Result<usize, KeywardError> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        queries::rate_limit::purge_expired(&self.db, now_ms).await
    }
}
