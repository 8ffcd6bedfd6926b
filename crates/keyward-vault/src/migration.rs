// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-time migration of legacy (payload version 1) secret payloads.
//!
//! Version 1 payloads are untyped JSON objects whose kind was only implied by
//! which fields were present. This module is the one place that inspects
//! field shape; everything else works with [`SecretPayload`]. Callers use the
//! returned [`MigrationOutcome`] to re-encrypt and persist the record at the
//! current version, after which the legacy branch is never taken again for it.

use std::collections::BTreeMap;

use keyward_core::types::{CURRENT_PAYLOAD_VERSION, LEGACY_PAYLOAD_VERSION};
use keyward_core::{KeywardError, SecretType};
use serde_json::{Map, Value};

use crate::payload::SecretPayload;

/// What happened when a payload was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Already at the current version.
    Current,
    /// Converted from a legacy encoding; persist again to finish migrating.
    Migrated {
        from_version: u32,
        to_version: u32,
        detected: SecretType,
    },
}

impl MigrationOutcome {
    pub fn needs_rewrite(&self) -> bool {
        matches!(self, MigrationOutcome::Migrated { .. })
    }
}

/// Convert a legacy untyped payload into a typed one.
///
/// The record's stored `declared` type picks the layout; field shape is only
/// consulted when the declared layout's required field is missing. Fields no
/// layout consumes are kept: appended to `notes`, or added as variables.
pub fn migrate_legacy_payload(
    declared: SecretType,
    value: Value,
) -> Result<(SecretPayload, MigrationOutcome), KeywardError> {
    let Value::Object(mut fields) = value else {
        return Err(unrecognized());
    };

    let typed = match declared {
        SecretType::Password => take_password(&mut fields),
        SecretType::ApiKey => take_api_key(&mut fields),
        SecretType::EnvVars => take_vars(&mut fields)?.map(|vars| SecretPayload::EnvVars { vars }),
    };
    let payload = match typed {
        Some(payload) => payload,
        None => detect_by_shape(&mut fields)?.ok_or_else(unrecognized)?,
    };
    let payload = keep_leftovers(payload, fields)?;

    let detected = payload.secret_type();
    Ok((
        payload,
        MigrationOutcome::Migrated {
            from_version: LEGACY_PAYLOAD_VERSION,
            to_version: CURRENT_PAYLOAD_VERSION,
            detected,
        },
    ))
}

fn detect_by_shape(fields: &mut Map<String, Value>) -> Result<Option<SecretPayload>, KeywardError> {
    if let Some(payload) = take_password(fields).or_else(|| take_api_key(fields)) {
        return Ok(Some(payload));
    }
    Ok(take_vars(fields)?.map(|vars| SecretPayload::EnvVars { vars }))
}

fn take_password(fields: &mut Map<String, Value>) -> Option<SecretPayload> {
    let password = take_string(fields, &["password"])?;
    Some(SecretPayload::Password {
        username: take_string(fields, &["username", "user", "login"]),
        password,
        url: take_string(fields, &["url", "website"]),
        notes: take_string(fields, &["notes", "note"]),
    })
}

fn take_api_key(fields: &mut Map<String, Value>) -> Option<SecretPayload> {
    let key = take_string(fields, &["apiKey", "api_key", "key"])?;
    Some(SecretPayload::ApiKey {
        key,
        service: take_string(fields, &["service", "provider"]),
        notes: take_string(fields, &["notes", "note"]),
    })
}

/// Fold fields the layout did not consume back into the payload.
fn keep_leftovers(
    mut payload: SecretPayload,
    leftovers: Map<String, Value>,
) -> Result<SecretPayload, KeywardError> {
    if leftovers.is_empty() {
        return Ok(payload);
    }
    Ok(match &mut payload {
        SecretPayload::Password {
            username,
            password,
            url,
            notes,
        } => SecretPayload::Password {
            username: std::mem::take(username),
            password: std::mem::take(password),
            url: std::mem::take(url),
            notes: Some(append_notes(std::mem::take(notes), leftovers)),
        },
        SecretPayload::ApiKey { key, service, notes } => SecretPayload::ApiKey {
            key: std::mem::take(key),
            service: std::mem::take(service),
            notes: Some(append_notes(std::mem::take(notes), leftovers)),
        },
        SecretPayload::EnvVars { vars } => {
            let mut vars = std::mem::take(vars);
            for (name, value) in leftovers {
                let Value::String(value) = value else {
                    return Err(unrecognized());
                };
                if vars.contains_key(&name) {
                    return Err(unrecognized());
                }
                vars.insert(name, value);
            }
            SecretPayload::EnvVars { vars }
        }
    })
}

/// One `name: value` line per leftover field, after any existing notes.
fn append_notes(notes: Option<String>, leftovers: Map<String, Value>) -> String {
    let extra = leftovers
        .into_iter()
        .map(|(name, value)| match value {
            Value::String(s) => format!("{name}: {s}"),
            other => format!("{name}: {other}"),
        })
        .collect::<Vec<_>>()
        .join("\n");
    match notes {
        Some(notes) if !notes.is_empty() => format!("{notes}\n{extra}"),
        _ => extra,
    }
}

fn unrecognized() -> KeywardError {
    KeywardError::Validation("unrecognized legacy payload shape".to_string())
}

/// Remove and return the first string field found under any of `names`.
fn take_string(fields: &mut Map<String, Value>, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| match fields.remove(*name) {
        Some(Value::String(s)) => Some(s),
        Some(other) => {
            fields.insert((*name).to_string(), other);
            None
        }
        None => None,
    })
}

/// Environment variables in any of the legacy layouts:
/// `{"variables": [{"key": .., "value": ..}]}`, `{"vars": {..}}`, or a flat
/// object of strings.
fn take_vars(
    fields: &mut Map<String, Value>,
) -> Result<Option<BTreeMap<String, String>>, KeywardError> {
    let nested = fields.remove("variables").or_else(|| fields.remove("vars"));
    let source = match nested {
        Some(value) => value,
        None if !fields.is_empty() => Value::Object(std::mem::take(fields)),
        None => return Ok(None),
    };

    let mut vars = BTreeMap::new();
    match source {
        Value::Object(map) => {
            for (name, value) in map {
                let Value::String(value) = value else {
                    return Err(unrecognized());
                };
                vars.insert(name, value);
            }
        }
        Value::Array(items) => {
            for item in items {
                let Value::Object(mut entry) = item else {
                    return Err(unrecognized());
                };
                let name = take_string(&mut entry, &["key", "name"]).ok_or_else(unrecognized)?;
                let value = take_string(&mut entry, &["value"]).ok_or_else(unrecognized)?;
                vars.insert(name, value);
            }
        }
        _ => return Err(unrecognized()),
    }
    Ok(Some(vars))
}
