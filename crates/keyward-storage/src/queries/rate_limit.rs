// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed-window attempt counters.

use std::time::Duration;

use keyward_core::{KeywardError, RateCount};
use rusqlite::params;

use crate::database::{Database, map_tr_err};

/// Increment `key` and return the new count with the window's remaining TTL.
///
/// One UPSERT statement: a missing or lapsed window restarts at 1 with a
/// fresh expiry, otherwise the count grows and the expiry is kept.
pub async fn increment(
    db: &Database,
    key: &str,
    window: Duration,
    now_ms: i64,
) -> Result<RateCount, KeywardError> {
    let key = key.to_string();
    let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "INSERT INTO rate_limits (key, count, expires_at) VALUES (?1, 1, ?2 + ?3) \
                 ON CONFLICT(key) DO UPDATE SET \
                   count = CASE WHEN expires_at <= ?2 THEN 1 ELSE count + 1 END, \
                   expires_at = CASE WHEN expires_at <= ?2 THEN ?2 + ?3 ELSE expires_at END \
                 RETURNING count, expires_at",
                params![key, now_ms, window_ms],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
            )
        })
        .await
        .map_err(map_tr_err)
        .map(|(count, expires_at)| RateCount {
            count: u64::try_from(count).unwrap_or(0),
            ttl_remaining: Duration::from_millis(
                u64::try_from(expires_at.saturating_sub(now_ms)).unwrap_or(0),
            ),
        })
}

/// Delete every window that lapsed at or before `now_ms`. Returns the count.
pub async fn purge_expired(db: &Database, now_ms: i64) -> Result<usize, KeywardError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM rate_limits WHERE expires_at <= ?1",
                params![now_ms],
            )
        })
        .await
        .map_err(map_tr_err)
}
