// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wiring of storage, vault, sessions and audit into one application value.
//!
//! Every CLI command runs against an [`App`]. The vault key lives in the
//! [`Keyring`] only for the lifetime of the process.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use keyward_audit::{AuditLedger, AuditSigner, ReviewedEntry};
use keyward_auth::{AccessTokenSigner, SessionManager, TokenKeypair};
use keyward_config::KeywardConfig;
use keyward_core::{
    AuditEvent, AuditMeta, AuditSink, EnvelopeStore, KeywardError, NoopAuditSink, SecretRecord,
    SecretStore,
};
use keyward_security::RedactingWriter;
use keyward_storage::SqliteStorage;
use keyward_vault::{
    ItemView, KdfRegistry, Keyring, SecretPayload, UnlockOutcome, VaultSetup, encrypt_item,
    open_listing, read_record, upgrade_record,
};
use secrecy::SecretString;
use serde_json::{Map, Value, json};
use tracing::{info, warn};

fn meta<const N: usize>(pairs: [(&str, Value); N]) -> AuditMeta {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// Ownership failures look the same as a missing record.
fn not_found() -> KeywardError {
    KeywardError::Authorization("secret not found".to_string())
}

pub struct App {
    config: KeywardConfig,
    storage: Arc<SqliteStorage>,
    registry: KdfRegistry,
    keyring: Keyring,
    sessions: SessionManager,
    audit: Arc<dyn AuditSink>,
    ledger: Option<Arc<AuditLedger>>,
    known_values: Arc<RwLock<Vec<String>>>,
}

impl App {
    /// Open storage and build every component from `config`.
    ///
    /// `known_values` is the redaction list shared with the log writer;
    /// decrypted secret values are added to it as they are read.
    pub async fn open(
        config: KeywardConfig,
        known_values: Arc<RwLock<Vec<String>>>,
    ) -> Result<Self, KeywardError> {
        let storage = Arc::new(SqliteStorage::open(&config.storage).await?);
        let registry = KdfRegistry::init(&config.kdf)?;
        let (audit, ledger) = build_audit(&config, &storage)?;
        let signer = build_signer(&config)?;
        let sessions = SessionManager::new(
            storage.clone(),
            storage.clone(),
            Arc::clone(&audit),
            signer,
            config.session.clone(),
            config.rate_limit.clone(),
        );

        info!(
            database = %config.storage.database_path,
            kdf_version = registry.current_version(),
            audit = ledger.is_some(),
            "keyward initialized"
        );
        Ok(Self {
            keyring: Keyring::new(registry.clone()),
            config,
            storage,
            registry,
            sessions,
            audit,
            ledger,
            known_values,
        })
    }

    pub fn config(&self) -> &KeywardConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    #[cfg(test)]
    pub fn keyring(&self) -> &Keyring {
        &self.keyring
    }

    /// Create a user's vault: a fresh vault key wrapped under `password`.
    ///
    /// The key is left unlocked in the keyring.
    pub async fn signup(&self, user_id: &str, password: &SecretString) -> Result<(), KeywardError> {
        let (vault_key, envelope) = VaultSetup::create(password, &self.registry).await?;
        self.storage.put_envelope(user_id, &envelope).await?;
        self.keyring.install(user_id, vault_key);
        self.audit.append(
            AuditEvent::Signup,
            Some(user_id),
            meta([("kdf_version", json!(envelope.kdf_params.version))]),
        );
        info!(user_id, "vault created");
        Ok(())
    }

    /// Fetch the user's envelope and unlock it.
    ///
    /// An envelope under an older KDF version is re-wrapped at the current
    /// version with the same password once it opens.
    pub async fn unlock(
        &self,
        user_id: &str,
        password: &SecretString,
    ) -> Result<UnlockOutcome, KeywardError> {
        let envelope = self
            .storage
            .get_envelope(user_id)
            .await?
            .ok_or(KeywardError::InvalidCredentials)?;
        self.audit
            .append(AuditEvent::EnvelopeFetched, Some(user_id), AuditMeta::new());

        let outcome = self.keyring.unlock(user_id, password, &envelope).await?;
        if outcome == UnlockOutcome::Unlocked
            && envelope.kdf_params.version != self.registry.current_version()
        {
            let vault_key = self.keyring.require_key(user_id)?;
            let upgraded = VaultSetup::rewrap(&vault_key, password, &self.registry).await?;
            self.storage.replace_envelope(user_id, &upgraded).await?;
            info!(
                user_id,
                from = envelope.kdf_params.version,
                to = upgraded.kdf_params.version,
                "envelope upgraded to current KDF version"
            );
        }
        Ok(outcome)
    }

    /// Re-wrap the vault key under a new password. Secrets are untouched.
    pub async fn change_password(
        &self,
        user_id: &str,
        current: &SecretString,
        new_password: &SecretString,
    ) -> Result<(), KeywardError> {
        self.unlock(user_id, current).await?;
        let vault_key = self.keyring.require_key(user_id)?;
        let envelope = VaultSetup::rewrap(&vault_key, new_password, &self.registry).await?;
        if !self.storage.replace_envelope(user_id, &envelope).await? {
            return Err(KeywardError::InvalidCredentials);
        }
        self.audit.append(
            AuditEvent::PasswordChanged,
            Some(user_id),
            meta([("kdf_version", json!(envelope.kdf_params.version))]),
        );
        info!(user_id, "master password changed");
        Ok(())
    }

    /// Encrypt and store a new secret. Returns its id.
    pub async fn add_secret(
        &self,
        user_id: &str,
        payload: &SecretPayload,
        metadata: Map<String, Value>,
    ) -> Result<String, KeywardError> {
        let vault_key = self.keyring.require_key(user_id)?;
        let sealed = encrypt_item(payload, &vault_key)?;
        let record = SecretRecord::new(user_id, payload.secret_type(), sealed, metadata);

        self.guard_metadata(user_id, self.storage.create_secret(&record).await)?;
        self.audit.append(
            AuditEvent::SecretCreated,
            Some(user_id),
            meta([
                ("secret_id", json!(record.id)),
                ("secret_type", json!(record.secret_type.to_string())),
            ]),
        );
        Ok(record.id)
    }

    /// Replace a secret's payload and metadata.
    pub async fn update_secret(
        &self,
        user_id: &str,
        id: &str,
        payload: &SecretPayload,
        metadata: Map<String, Value>,
    ) -> Result<(), KeywardError> {
        let vault_key = self.keyring.require_key(user_id)?;
        let mut record = self.owned_record(user_id, id).await?;
        record.payload = encrypt_item(payload, &vault_key)?;
        record.payload_version = keyward_core::types::CURRENT_PAYLOAD_VERSION;
        record.secret_type = payload.secret_type();
        record.metadata = metadata;
        record.updated_at = keyward_core::types::now_millis();

        if !self.guard_metadata(user_id, self.storage.update_secret(&record).await)? {
            return Err(not_found());
        }
        self.audit.append(
            AuditEvent::SecretUpdated,
            Some(user_id),
            meta([("secret_id", json!(id))]),
        );
        Ok(())
    }

    /// Decrypt one secret. Legacy payloads are migrated and written back.
    ///
    /// The write-back is best effort: the decrypted payload is returned even
    /// when the record cannot be persisted at the current version.
    pub async fn get_secret(&self, user_id: &str, id: &str) -> Result<SecretPayload, KeywardError> {
        let vault_key = self.keyring.require_key(user_id)?;
        let record = self.owned_record(user_id, id).await?;
        let (payload, migration) = read_record(&record, &vault_key)?;
        self.remember_sensitive(&payload);

        if migration.needs_rewrite() {
            let written = match upgrade_record(&record, &payload, &vault_key) {
                Ok(upgraded) => {
                    self.guard_metadata(user_id, self.storage.update_secret(&upgraded).await)
                }
                Err(e) => Err(e),
            };
            match written {
                Ok(_) => info!(secret_id = %id, ?migration, "legacy payload migrated"),
                Err(e) => warn!(
                    security_alert = matches!(e, KeywardError::SecurityViolation { .. }),
                    secret_id = %id,
                    error = %e,
                    "legacy payload left at its stored version"
                ),
            }
        }
        Ok(payload)
    }

    /// Decrypt every secret of a user; unreadable ones are marked, not fatal.
    pub async fn list_secrets(&self, user_id: &str) -> Result<Vec<ItemView>, KeywardError> {
        let vault_key = self.keyring.require_key(user_id)?;
        let records = self.storage.list_secrets(user_id).await?;
        let views = open_listing(&records, &vault_key);
        for view in &views {
            if let ItemView::Readable { payload, .. } = view {
                self.remember_sensitive(payload);
            }
        }
        Ok(views)
    }

    pub async fn remove_secret(&self, user_id: &str, id: &str) -> Result<(), KeywardError> {
        if !self.storage.delete_secret(id, user_id).await? {
            return Err(not_found());
        }
        self.audit.append(
            AuditEvent::SecretDeleted,
            Some(user_id),
            meta([("secret_id", json!(id))]),
        );
        Ok(())
    }

    /// Verify stored audit entries.
    pub async fn review_audit(
        &self,
        user_id: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<ReviewedEntry>, KeywardError> {
        let ledger = self.ledger.as_ref().ok_or_else(|| {
            KeywardError::Config("audit ledger is disabled; set audit.hmac_secret".to_string())
        })?;
        ledger.flush().await;
        ledger.review(user_id, limit).await
    }

    /// Flush pending audit writes, stop key derivation and checkpoint storage.
    pub async fn shutdown(&self) -> Result<(), KeywardError> {
        self.keyring.lock();
        if let Some(ledger) = &self.ledger {
            ledger.flush().await;
        }
        self.registry.shutdown();
        self.storage.close().await
    }

    async fn owned_record(&self, user_id: &str, id: &str) -> Result<SecretRecord, KeywardError> {
        match self.storage.get_secret(id).await? {
            Some(record) if record.owner_id == user_id => Ok(record),
            _ => Err(not_found()),
        }
    }

    /// Record a metadata boundary breach in the ledger before surfacing it.
    fn guard_metadata<T>(
        &self,
        user_id: &str,
        result: Result<T, KeywardError>,
    ) -> Result<T, KeywardError> {
        if let Err(KeywardError::SecurityViolation { path, reason }) = &result {
            self.audit.append(
                AuditEvent::MetadataViolation,
                Some(user_id),
                meta([("path", json!(path)), ("reason", json!(reason))]),
            );
        }
        result
    }

    fn remember_sensitive(&self, payload: &SecretPayload) {
        for value in payload.sensitive_values() {
            if !value.is_empty() {
                RedactingWriter::<std::io::Stderr>::add_known_value(&self.known_values, value);
            }
        }
    }
}

/// The signed ledger when enabled and keyed, otherwise a no-op sink.
fn build_audit(
    config: &KeywardConfig,
    storage: &Arc<SqliteStorage>,
) -> Result<(Arc<dyn AuditSink>, Option<Arc<AuditLedger>>), KeywardError> {
    let noop: Arc<dyn AuditSink> = Arc::new(NoopAuditSink);
    if !config.audit.enabled {
        return Ok((noop, None));
    }
    let Some(secret) = &config.audit.hmac_secret else {
        warn!("audit is enabled but audit.hmac_secret is not set; audit events are dropped");
        return Ok((noop, None));
    };
    let ledger = Arc::new(AuditLedger::new(
        storage.clone(),
        AuditSigner::new(secret.as_bytes())?,
    ));
    let sink: Arc<dyn AuditSink> = ledger.clone();
    Ok((sink, Some(ledger)))
}

fn build_signer(config: &KeywardConfig) -> Result<AccessTokenSigner, KeywardError> {
    let keypair = match &config.session.signing_key {
        Some(seed) => TokenKeypair::from_hex(seed)?,
        None => {
            let keypair = TokenKeypair::generate();
            warn!(
                public_key = %keypair.public_hex(),
                "session.signing_key not set; access tokens use an ephemeral key"
            );
            keypair
        }
    };
    Ok(AccessTokenSigner::new(
        keypair,
        Duration::from_secs(config.session.access_token_ttl_secs),
    ))
}
