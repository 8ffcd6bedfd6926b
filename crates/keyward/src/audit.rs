// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `keyward audit verify`.

use keyward_core::KeywardError;
use serde_json::json;

use crate::app::App;
use crate::output::print_json;

/// Print every entry with its verification result. Fails with
/// [`KeywardError::Integrity`] naming the first tampered entry.
pub async fn run_verify(
    app: &App,
    user_id: Option<&str>,
    limit: Option<u32>,
) -> Result<(), KeywardError> {
    let reviewed = app.review_audit(user_id, limit).await?;
    let rows: Vec<_> = reviewed
        .iter()
        .map(|r| {
            json!({
                "id": r.entry.id,
                "eventType": r.entry.event_type,
                "userId": r.entry.user_id,
                "createdAt": r.entry.created_at,
                "tampered": r.tampered(),
            })
        })
        .collect();
    print_json(&rows)?;

    match reviewed.iter().find(|r| r.tampered()) {
        Some(first) => Err(KeywardError::Integrity {
            entry_id: first.entry.id.clone(),
        }),
        None => Ok(()),
    }
}
