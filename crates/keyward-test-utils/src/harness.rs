// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for integration testing.
//!
//! `TestHarness` assembles a temp SQLite database, a KDF registry with
//! deliberately cheap parameters, and a recording audit sink.

use std::sync::Arc;

use keyward_config::model::{AuditConfig, KdfConfig, KeywardConfig, StorageConfig};
use keyward_core::KeywardError;
use keyward_storage::SqliteStorage;
use keyward_vault::KdfRegistry;

use crate::mocks::RecordingAuditSink;

/// 32 bytes exactly, the minimum accepted audit secret.
pub const TEST_AUDIT_SECRET: &str = "test-audit-secret-0123456789abcd";

/// KDF costs far below the production floors. Never use outside tests.
pub fn fast_kdf_config() -> KdfConfig {
    KdfConfig {
        pbkdf2_iterations: 1_000,
        scrypt_log_n: 8,
        argon2_memory_kib: 1024,
        argon2_iterations: 2,
        argon2_parallelism: 1,
        ..KdfConfig::default()
    }
}

/// A complete storage-and-crypto environment on a throwaway database.
pub struct TestHarness {
    pub config: KeywardConfig,
    pub storage: Arc<SqliteStorage>,
    pub registry: KdfRegistry,
    pub audit: Arc<RecordingAuditSink>,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Build with default configuration and fast KDF parameters.
    pub async fn new() -> Result<Self, KeywardError> {
        Self::with_config(KeywardConfig::default()).await
    }

    /// Build from `config`; storage and KDF sections are overridden.
    pub async fn with_config(mut config: KeywardConfig) -> Result<Self, KeywardError> {
        let temp_dir = tempfile::TempDir::new().map_err(KeywardError::storage)?;
        config.storage = StorageConfig {
            database_path: temp_dir.path().join("test.db").to_string_lossy().into_owned(),
            wal_mode: true,
        };
        config.kdf = fast_kdf_config();
        config.audit = AuditConfig {
            enabled: true,
            hmac_secret: Some(TEST_AUDIT_SECRET.to_string()),
        };

        let storage = Arc::new(SqliteStorage::open(&config.storage).await?);
        let registry = KdfRegistry::init(&config.kdf)?;
        Ok(Self {
            config,
            storage,
            registry,
            audit: Arc::new(RecordingAuditSink::default()),
            _temp_dir: temp_dir,
        })
    }

    pub fn database_path(&self) -> &str {
        &self.config.storage.database_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyward_core::SessionStore;

    #[tokio::test]
    async fn harness_opens_a_working_database() {
        let harness = TestHarness::new().await.unwrap();
        assert!(harness.storage.list_sessions("nobody").await.unwrap().is_empty());
        assert_eq!(harness.registry.current_version(), 2);
        assert!(harness.database_path().ends_with("test.db"));
    }
}
