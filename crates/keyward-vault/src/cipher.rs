// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Item encryption under the vault key.
//!
//! Each call to [`encrypt_item`] draws a fresh random nonce; the serialized
//! plaintext lives in a zeroizing buffer for the duration of the call.
//! Listings decrypt item by item and degrade to [`ItemView::Unreadable`]
//! instead of failing as a whole.

use keyward_core::types::{CURRENT_PAYLOAD_VERSION, EncryptedPayload, LEGACY_PAYLOAD_VERSION};
use keyward_core::{KeywardError, SecretRecord, SecretType};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;
use zeroize::Zeroizing;

use crate::crypto::{self, VaultKey};
use crate::migration::{MigrationOutcome, migrate_legacy_payload};
use crate::payload::SecretPayload;

/// Serialize and encrypt any payload.
pub fn encrypt_item<T: Serialize + ?Sized>(
    payload: &T,
    key: &VaultKey,
) -> Result<EncryptedPayload, KeywardError> {
    let plaintext = Zeroizing::new(
        serde_json::to_vec(payload)
            .map_err(|e| KeywardError::Validation(format!("payload is not serializable: {e}")))?,
    );
    let (ciphertext, nonce) = crypto::seal(key.bytes(), &plaintext)?;
    Ok(EncryptedPayload { ciphertext, nonce })
}

/// Decrypt and deserialize a payload.
///
/// Authentication failure and an authenticated-but-unparseable plaintext
/// both surface as [`KeywardError::DecryptionFailed`].
pub fn decrypt_item<T: DeserializeOwned>(
    payload: &EncryptedPayload,
    key: &VaultKey,
) -> Result<T, KeywardError> {
    let plaintext = crypto::open(key.bytes(), &payload.nonce, &payload.ciphertext)?;
    serde_json::from_slice(&plaintext).map_err(|_| KeywardError::DecryptionFailed)
}

/// Decrypt a record's payload, migrating legacy encodings on the way.
pub fn read_record(
    record: &SecretRecord,
    key: &VaultKey,
) -> Result<(SecretPayload, MigrationOutcome), KeywardError> {
    match record.payload_version {
        CURRENT_PAYLOAD_VERSION => Ok((decrypt_item(&record.payload, key)?, MigrationOutcome::Current)),
        LEGACY_PAYLOAD_VERSION => {
            migrate_legacy_payload(record.secret_type, decrypt_item(&record.payload, key)?)
        }
        other => Err(KeywardError::Validation(format!(
            "unknown payload version {other}"
        ))),
    }
}

/// Re-encrypt a migrated payload at the current version.
///
/// Returns the updated record; the caller persists it.
pub fn upgrade_record(
    record: &SecretRecord,
    payload: &SecretPayload,
    key: &VaultKey,
) -> Result<SecretRecord, KeywardError> {
    let mut upgraded = record.clone();
    upgraded.payload = encrypt_item(payload, key)?;
    upgraded.payload_version = CURRENT_PAYLOAD_VERSION;
    upgraded.secret_type = payload.secret_type();
    upgraded.updated_at = keyward_core::types::now_millis();
    Ok(upgraded)
}

/// One entry of a decrypted listing.
#[derive(Debug)]
pub enum ItemView {
    Readable {
        id: String,
        secret_type: SecretType,
        payload: SecretPayload,
        metadata: serde_json::Map<String, serde_json::Value>,
        migration: MigrationOutcome,
    },
    /// Could not be decrypted; shown as unavailable, the listing continues.
    Unreadable { id: String },
}

impl ItemView {
    pub fn id(&self) -> &str {
        match self {
            ItemView::Readable { id, .. } | ItemView::Unreadable { id } => id,
        }
    }

    pub fn is_readable(&self) -> bool {
        matches!(self, ItemView::Readable { .. })
    }
}

/// Decrypt every record, marking failures per item.
pub fn open_listing(records: &[SecretRecord], key: &VaultKey) -> Vec<ItemView> {
    records
        .iter()
        .map(|record| match read_record(record, key) {
            Ok((payload, migration)) => ItemView::Readable {
                id: record.id.clone(),
                secret_type: payload.secret_type(),
                payload,
                metadata: record.metadata.clone(),
                migration,
            },
            Err(e) => {
                warn!(secret_id = %record.id, error = %e, "secret unreadable");
                ItemView::Unreadable {
                    id: record.id.clone(),
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use proptest::prelude::*;
    use serde_json::{Value, json};

    fn record(payload: EncryptedPayload, version: u32, secret_type: SecretType) -> SecretRecord {
        let mut record = SecretRecord::new("owner", secret_type, payload, serde_json::Map::new());
        record.payload_version = version;
        record
    }

    #[test]
    fn roundtrip_empty_and_nested_payloads() {
        let key = VaultKey::generate().unwrap();
        for value in [
            json!({}),
            json!([]),
            json!(""),
            json!({"a": {"b": {"c": [1, 2, {"d": null}]}}}),
        ] {
            let sealed = encrypt_item(&value, &key).unwrap();
            let back: Value = decrypt_item(&sealed, &key).unwrap();
            assert_eq!(back, value);
        }
    }

    #[test]
    fn different_key_always_fails() {
        let key = VaultKey::generate().unwrap();
        let other = VaultKey::generate().unwrap();
        let sealed = encrypt_item(&json!({"k": "v"}), &key).unwrap();
        assert!(matches!(
            decrypt_item::<Value>(&sealed, &other),
            Err(KeywardError::DecryptionFailed)
        ));
    }

    #[test]
    fn ten_thousand_nonces_never_collide() {
        let key = VaultKey::generate().unwrap();
        let payload = json!({"same": "payload"});
        let mut seen = HashSet::with_capacity(10_000);
        for _ in 0..10_000 {
            let sealed = encrypt_item(&payload, &key).unwrap();
            assert!(seen.insert(sealed.nonce), "nonce reused");
        }
    }

    #[test]
    fn legacy_record_reads_through_migration_and_upgrades() {
        let key = VaultKey::generate().unwrap();
        let legacy = encrypt_item(&json!({"apiKey": "k-1", "service": "stripe"}), &key).unwrap();
        let rec = record(legacy, LEGACY_PAYLOAD_VERSION, SecretType::ApiKey);

        let (payload, outcome) = read_record(&rec, &key).unwrap();
        assert!(outcome.needs_rewrite());

        let upgraded = upgrade_record(&rec, &payload, &key).unwrap();
        assert_eq!(upgraded.payload_version, CURRENT_PAYLOAD_VERSION);
        let (again, outcome) = read_record(&upgraded, &key).unwrap();
        assert_eq!(outcome, MigrationOutcome::Current);
        assert_eq!(again, payload);
    }

    #[test]
    fn listing_degrades_per_item() {
        let key = VaultKey::generate().unwrap();
        let foreign = VaultKey::generate().unwrap();
        let good = SecretPayload::Password {
            username: None,
            password: "pw".into(),
            url: None,
            notes: None,
        };
        let records = vec![
            record(encrypt_item(&good, &key).unwrap(), 2, SecretType::Password),
            record(encrypt_item(&good, &foreign).unwrap(), 2, SecretType::Password),
            record(encrypt_item(&good, &key).unwrap(), 9, SecretType::Password),
        ];

        let views = open_listing(&records, &key);
        assert_eq!(views.len(), 3);
        assert!(views[0].is_readable());
        assert!(!views[1].is_readable());
        assert!(!views[2].is_readable());
        assert_eq!(views[1].id(), records[1].id);
    }

    proptest! {
        #[test]
        fn any_string_map_roundtrips(
            map in proptest::collection::btree_map("[a-zA-Z_]{1,12}", ".{0,40}", 0..8)
        ) {
            let key = VaultKey::generate().unwrap();
            let payload = SecretPayload::EnvVars { vars: map };
            let sealed = encrypt_item(&payload, &key).unwrap();
            let back: SecretPayload = decrypt_item(&sealed, &key).unwrap();
            prop_assert_eq!(back, payload);
        }
    }
}
