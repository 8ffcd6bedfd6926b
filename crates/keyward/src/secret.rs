// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `keyward secret` subcommands.
//!
//! Every subcommand unlocks the vault first. Payloads are read as JSON from
//! stdin so secret values never appear in argv or shell history.

use std::io::Read;

use clap::Subcommand;
use keyward_core::KeywardError;
use keyward_vault::{ItemView, SecretPayload, read_master_password};
use serde_json::{Map, Value, json};

use crate::app::App;
use crate::output::print_json;

#[derive(Subcommand, Debug)]
pub enum SecretCommand {
    /// Store a new secret. The payload is read as JSON from stdin.
    Add {
        #[arg(long)]
        user: String,
        /// Non-sensitive metadata as a JSON object.
        #[arg(long)]
        meta: Option<String>,
    },
    /// Replace a secret's payload (stdin) and metadata.
    Update {
        id: String,
        #[arg(long)]
        user: String,
        #[arg(long)]
        meta: Option<String>,
    },
    /// Print a decrypted secret.
    Get {
        id: String,
        #[arg(long)]
        user: String,
    },
    /// List secrets with their metadata.
    List {
        #[arg(long)]
        user: String,
    },
    /// Delete a secret.
    Rm {
        id: String,
        #[arg(long)]
        user: String,
    },
}

pub async fn run_secret(app: &App, command: SecretCommand) -> Result<(), KeywardError> {
    match command {
        SecretCommand::Add { user, meta } => {
            let metadata = parse_metadata(meta.as_deref())?;
            let payload = read_payload(std::io::stdin())?;
            unlock(app, &user).await?;
            let id = app.add_secret(&user, &payload, metadata).await?;
            print_json(&json!({ "id": id, "secretType": payload.secret_type() }))
        }
        SecretCommand::Update { id, user, meta } => {
            let metadata = parse_metadata(meta.as_deref())?;
            let payload = read_payload(std::io::stdin())?;
            unlock(app, &user).await?;
            app.update_secret(&user, &id, &payload, metadata).await?;
            print_json(&json!({ "id": id, "updated": true }))
        }
        SecretCommand::Get { id, user } => {
            unlock(app, &user).await?;
            let payload = app.get_secret(&user, &id).await?;
            print_json(&payload)
        }
        SecretCommand::List { user } => {
            unlock(app, &user).await?;
            let views = app.list_secrets(&user).await?;
            print_json(&listing(&views))
        }
        SecretCommand::Rm { id, user } => {
            unlock(app, &user).await?;
            app.remove_secret(&user, &id).await?;
            print_json(&json!({ "id": id, "deleted": true }))
        }
    }
}

async fn unlock(app: &App, user_id: &str) -> Result<(), KeywardError> {
    let password = read_master_password()?;
    app.unlock(user_id, &password).await.map(|_| ())
}

fn parse_metadata(raw: Option<&str>) -> Result<Map<String, Value>, KeywardError> {
    let Some(raw) = raw else {
        return Ok(Map::new());
    };
    match serde_json::from_str(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(KeywardError::Validation(
            "--meta must be a JSON object".to_string(),
        )),
        Err(e) => Err(KeywardError::Validation(format!("--meta is not valid JSON: {e}"))),
    }
}

fn read_payload(mut input: impl Read) -> Result<SecretPayload, KeywardError> {
    let mut raw = zeroize::Zeroizing::new(String::new());
    input
        .read_to_string(&mut raw)
        .map_err(|e| KeywardError::Internal(format!("failed to read payload: {e}")))?;
    // The parse error is not echoed; it may quote the secret.
    serde_json::from_str(&raw).map_err(|_| {
        KeywardError::Validation(
            "payload must be JSON with secretType PASSWORD, API_KEY or ENV_VARS".to_string(),
        )
    })
}

/// Listing rows carry metadata only, never payload content.
fn listing(views: &[ItemView]) -> Vec<Value> {
    views
        .iter()
        .map(|view| match view {
            ItemView::Readable {
                id,
                secret_type,
                metadata,
                migration,
                ..
            } => json!({
                "id": id,
                "secretType": secret_type,
                "metadata": metadata,
                "migrated": migration.needs_rewrite(),
            }),
            ItemView::Unreadable { id } => json!({ "id": id, "unavailable": true }),
        })
        .collect()
}
