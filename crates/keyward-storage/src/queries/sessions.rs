// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Refresh session persistence, including atomic rotation.

use keyward_core::{KeywardError, Session, SessionFilter};
use rusqlite::params;

use super::{parse_ts, ts};
use crate::database::{Database, map_tr_err};

const SESSION_COLUMNS: &str = "id, user_id, refresh_token_hash, created_at, expires_at, \
                               absolute_expires_at, device_fingerprint, last_used_at";

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        user_id: row.get(1)?,
        refresh_token_hash: row.get(2)?,
        created_at: parse_ts(3, &row.get::<_, String>(3)?)?,
        expires_at: parse_ts(4, &row.get::<_, String>(4)?)?,
        absolute_expires_at: parse_ts(5, &row.get::<_, String>(5)?)?,
        device_fingerprint: row.get(6)?,
        last_used_at: parse_ts(7, &row.get::<_, String>(7)?)?,
    })
}

fn insert(conn: &rusqlite::Connection, session: &Session) -> rusqlite::Result<()> {
    conn.execute(
        &format!("INSERT INTO sessions ({SESSION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
        params![
            session.id,
            session.user_id,
            session.refresh_token_hash,
            ts(&session.created_at),
            ts(&session.expires_at),
            ts(&session.absolute_expires_at),
            session.device_fingerprint,
            ts(&session.last_used_at),
        ],
    )?;
    Ok(())
}

/// Create a new session.
pub async fn create_session(db: &Database, session: &Session) -> Result<(), KeywardError> {
    let session = session.clone();
    db.connection()
        .call(move |conn| insert(conn, &session))
        .await
        .map_err(map_tr_err)
}

/// Get a session by ID.
pub async fn get_session(db: &Database, id: &str) -> Result<Option<Session>, KeywardError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"))?;
            match stmt.query_row(params![id], row_to_session) {
                Ok(session) => Ok(Some(session)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Delete one session. Returns whether a row was removed.
pub async fn delete_session(db: &Database, id: &str) -> Result<bool, KeywardError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let removed = conn.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
            Ok(removed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Replace `old_id` with `replacement` in one transaction.
///
/// The delete is conditioned on the stored hash, so of two rotations racing
/// on the same token exactly one removes the row; the other sees zero
/// changes, rolls back, and inserts nothing.
pub async fn rotate_session(
    db: &Database,
    old_id: &str,
    expected_hash: &str,
    replacement: &Session,
) -> Result<bool, KeywardError> {
    let old_id = old_id.to_string();
    let expected_hash = expected_hash.to_string();
    let replacement = replacement.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let removed = tx.execute(
                "DELETE FROM sessions WHERE id = ?1 AND refresh_token_hash = ?2",
                params![old_id, expected_hash],
            )?;
            if removed == 0 {
                return Ok(false);
            }
            insert(&tx, &replacement)?;
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)
}

/// Predicate-based bulk delete.
pub async fn delete_sessions(db: &Database, filter: &SessionFilter) -> Result<usize, KeywardError> {
    let filter = filter.clone();
    db.connection()
        .call(move |conn| match filter {
            SessionFilter::User { user_id, except } => conn.execute(
                "DELETE FROM sessions WHERE user_id = ?1 AND (?2 IS NULL OR id != ?2)",
                params![user_id, except],
            ),
            SessionFilter::ExpiredAt(now) => conn.execute(
                "DELETE FROM sessions WHERE expires_at <= ?1 OR absolute_expires_at <= ?1",
                params![ts(&now)],
            ),
        })
        .await
        .map_err(map_tr_err)
}

/// All sessions for a user, newest first.
pub async fn list_sessions(db: &Database, user_id: &str) -> Result<Vec<Session>, KeywardError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE user_id = ?1 \
                 ORDER BY created_at DESC, rowid DESC"
            ))?;
            let rows = stmt.query_map(params![user_id], row_to_session)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
