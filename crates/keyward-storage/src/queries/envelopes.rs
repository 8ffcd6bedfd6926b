// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user vault key envelopes.

use keyward_core::types::now_millis;
use keyward_core::{EncryptedVaultKeyEnvelope, KeywardError};
use rusqlite::params;

use super::{fixed_blob, parse_json, ts};
use crate::database::{Database, map_tr_err};

fn params_json(envelope: &EncryptedVaultKeyEnvelope) -> Result<String, KeywardError> {
    serde_json::to_string(&envelope.kdf_params).map_err(|e| KeywardError::Internal(e.to_string()))
}

/// Insert the first envelope for a user. Returns `false` if one exists.
pub async fn insert_envelope(
    db: &Database,
    user_id: &str,
    envelope: &EncryptedVaultKeyEnvelope,
) -> Result<bool, KeywardError> {
    let kdf_params = params_json(envelope)?;
    let user_id = user_id.to_string();
    let envelope = envelope.clone();
    let now = ts(&now_millis());
    db.connection()
        .call(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO vault_envelopes \
                 (user_id, salt, kdf_params, nonce, ciphertext, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    user_id,
                    envelope.salt.as_slice(),
                    kdf_params,
                    envelope.nonce.as_slice(),
                    envelope.ciphertext,
                    now,
                ],
            )?;
            Ok(inserted > 0)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_envelope(
    db: &Database,
    user_id: &str,
) -> Result<Option<EncryptedVaultKeyEnvelope>, KeywardError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT salt, kdf_params, nonce, ciphertext FROM vault_envelopes WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(EncryptedVaultKeyEnvelope {
                        salt: fixed_blob(0, row.get(0)?)?,
                        kdf_params: parse_json(1, &row.get::<_, String>(1)?)?,
                        nonce: fixed_blob(2, row.get(2)?)?,
                        ciphertext: row.get(3)?,
                    })
                },
            );
            match result {
                Ok(envelope) => Ok(Some(envelope)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Replace a user's envelope. Returns whether one existed.
pub async fn replace_envelope(
    db: &Database,
    user_id: &str,
    envelope: &EncryptedVaultKeyEnvelope,
) -> Result<bool, KeywardError> {
    let kdf_params = params_json(envelope)?;
    let user_id = user_id.to_string();
    let envelope = envelope.clone();
    let now = ts(&now_millis());
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE vault_envelopes SET salt = ?1, kdf_params = ?2, nonce = ?3, \
                 ciphertext = ?4, updated_at = ?5 WHERE user_id = ?6",
                params![
                    envelope.salt.as_slice(),
                    kdf_params,
                    envelope.nonce.as_slice(),
                    envelope.ciphertext,
                    now,
                    user_id,
                ],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}
