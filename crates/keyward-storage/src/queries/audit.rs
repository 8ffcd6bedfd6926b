// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only audit entry persistence.

use keyward_core::{AuditEntry, KeywardError};
use rusqlite::params;

use super::{parse_json, parse_ts, ts};
use crate::database::{Database, map_tr_err};

const AUDIT_COLUMNS: &str = "id, event_type, user_id, meta, created_at, signature";

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditEntry> {
    Ok(AuditEntry {
        id: row.get(0)?,
        event_type: row.get(1)?,
        user_id: row.get(2)?,
        meta: parse_json(3, &row.get::<_, String>(3)?)?,
        created_at: parse_ts(4, &row.get::<_, String>(4)?)?,
        signature: row.get(5)?,
    })
}

pub async fn insert_audit_entry(db: &Database, entry: &AuditEntry) -> Result<(), KeywardError> {
    let meta = serde_json::to_string(&entry.meta).map_err(|e| KeywardError::Internal(e.to_string()))?;
    let entry = entry.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                &format!("INSERT INTO audit_entries ({AUDIT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
                params![
                    entry.id,
                    entry.event_type,
                    entry.user_id,
                    meta,
                    ts(&entry.created_at),
                    entry.signature,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_audit_entry(db: &Database, id: &str) -> Result<Option<AuditEntry>, KeywardError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {AUDIT_COLUMNS} FROM audit_entries WHERE id = ?1"
            ))?;
            match stmt.query_row(params![id], row_to_entry) {
                Ok(entry) => Ok(Some(entry)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Entries in insertion order, optionally for a single user.
pub async fn list_audit_entries(
    db: &Database,
    user_id: Option<&str>,
    limit: Option<u32>,
) -> Result<Vec<AuditEntry>, KeywardError> {
    let user_id = user_id.map(str::to_string);
    // SQLite treats a negative LIMIT as unbounded.
    let limit = limit.map(i64::from).unwrap_or(-1);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {AUDIT_COLUMNS} FROM audit_entries \
                 WHERE ?1 IS NULL OR user_id = ?1 ORDER BY seq LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![user_id, limit], row_to_entry)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::setup_db;
    use keyward_core::AuditMeta;
    use keyward_core::types::now_millis;

    fn entry(id: &str, user: Option<&str>) -> AuditEntry {
        let mut meta = AuditMeta::new();
        meta.insert("session_id".into(), serde_json::json!("s-1"));
        AuditEntry {
            id: id.to_string(),
            event_type: "session_issued".to_string(),
            user_id: user.map(str::to_string),
            meta,
            created_at: now_millis(),
            signature: Some("abcd".to_string()),
        }
    }

    #[tokio::test]
    async fn insert_and_get_roundtrips() {
        let (db, _dir) = setup_db().await;
        let e = entry("a1", Some("u1"));
        insert_audit_entry(&db, &e).await.unwrap();
        assert_eq!(get_audit_entry(&db, "a1").await.unwrap().unwrap(), e);
        assert!(get_audit_entry(&db, "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn listing_filters_and_limits_in_insertion_order() {
        let (db, _dir) = setup_db().await;
        for (id, user) in [("1", Some("u1")), ("2", None), ("3", Some("u1")), ("4", Some("u2"))] {
            insert_audit_entry(&db, &entry(id, user)).await.unwrap();
        }

        let all = list_audit_entries(&db, None, None).await.unwrap();
        let ids: Vec<_> = all.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3", "4"]);

        let u1 = list_audit_entries(&db, Some("u1"), None).await.unwrap();
        assert_eq!(u1.len(), 2);

        let limited = list_audit_entries(&db, None, Some(2)).await.unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].id, "1");
    }
}
