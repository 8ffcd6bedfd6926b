// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Secret record persistence. Payloads are opaque ciphertext here.
//!
//! These functions do not validate metadata; go through
//! [`SqliteStorage`](crate::SqliteStorage) for writes.

use keyward_core::{EncryptedPayload, KeywardError, SecretRecord, SecretType};
use rusqlite::params;
use rusqlite::types::Type;

use super::{fixed_blob, parse_json, parse_ts, ts};
use crate::database::{Database, map_tr_err};

const SECRET_COLUMNS: &str =
    "id, owner_id, secret_type, ciphertext, nonce, payload_version, metadata, created_at, updated_at";

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<SecretRecord> {
    let secret_type: String = row.get(2)?;
    let secret_type = secret_type
        .parse::<SecretType>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
    Ok(SecretRecord {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        secret_type,
        payload: EncryptedPayload {
            ciphertext: row.get(3)?,
            nonce: fixed_blob(4, row.get(4)?)?,
        },
        payload_version: row.get(5)?,
        metadata: parse_json(6, &row.get::<_, String>(6)?)?,
        created_at: parse_ts(7, &row.get::<_, String>(7)?)?,
        updated_at: parse_ts(8, &row.get::<_, String>(8)?)?,
    })
}

fn metadata_json(record: &SecretRecord) -> Result<String, KeywardError> {
    serde_json::to_string(&record.metadata)
        .map_err(|e| KeywardError::Validation(format!("metadata is not serializable: {e}")))
}

pub async fn insert_secret(db: &Database, record: &SecretRecord) -> Result<(), KeywardError> {
    let metadata = metadata_json(record)?;
    let record = record.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO secrets ({SECRET_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
                ),
                params![
                    record.id,
                    record.owner_id,
                    record.secret_type.to_string(),
                    record.payload.ciphertext,
                    record.payload.nonce.as_slice(),
                    record.payload_version,
                    metadata,
                    ts(&record.created_at),
                    ts(&record.updated_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_secret(db: &Database, id: &str) -> Result<Option<SecretRecord>, KeywardError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {SECRET_COLUMNS} FROM secrets WHERE id = ?1"))?;
            match stmt.query_row(params![id], row_to_record) {
                Ok(record) => Ok(Some(record)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Overwrite the payload and metadata of a record the owner still holds.
pub async fn update_secret(db: &Database, record: &SecretRecord) -> Result<bool, KeywardError> {
    let metadata = metadata_json(record)?;
    let record = record.clone();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE secrets SET secret_type = ?1, ciphertext = ?2, nonce = ?3, \
                 payload_version = ?4, metadata = ?5, updated_at = ?6 \
                 WHERE id = ?7 AND owner_id = ?8",
                params![
                    record.secret_type.to_string(),
                    record.payload.ciphertext,
                    record.payload.nonce.as_slice(),
                    record.payload_version,
                    metadata,
                    ts(&record.updated_at),
                    record.id,
                    record.owner_id,
                ],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn delete_secret(db: &Database, id: &str, owner_id: &str) -> Result<bool, KeywardError> {
    let id = id.to_string();
    let owner_id = owner_id.to_string();
    db.connection()
        .call(move |conn| {
            let removed = conn.execute(
                "DELETE FROM secrets WHERE id = ?1 AND owner_id = ?2",
                params![id, owner_id],
            )?;
            Ok(removed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// All records of one owner, oldest first.
pub async fn list_secrets(db: &Database, owner_id: &str) -> Result<Vec<SecretRecord>, KeywardError> {
    let owner_id = owner_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SECRET_COLUMNS} FROM secrets WHERE owner_id = ?1 \
                 ORDER BY created_at, rowid"
            ))?;
            let rows = stmt.query_map(params![owner_id], row_to_record)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
