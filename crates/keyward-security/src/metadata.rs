// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metadata boundary validation.
//!
//! Metadata is stored unencrypted beside each secret record, so it has to
//! stay harmless under a full database leak. Validation runs in two passes:
//!
//! 1. **Leak scan** (recursive): any key that names a secret must not carry
//!    literal content, and no string anywhere may look like a partial mask
//!    (`••••••3f9a`, `sk-a****wxyz`, `abc...xyz`), whole or inside a title.
//! 2. **Allow-list** (top level): only titles, usernames, labels, boolean
//!    flags, counts, and lengths are accepted.
//!
//! A failure is a [`KeywardError::SecurityViolation`]. Offending values are
//! never stripped; the write is rejected as a whole.

use std::sync::LazyLock;

use keyward_core::KeywardError;
use regex::Regex;
use serde_json::{Map, Value};

/// Substrings that mark a key as secret-bearing once normalized.
const SECRET_KEY_FRAGMENTS: &[&str] = &[
    "password",
    "passwd",
    "passphrase",
    "apikey",
    "secret",
    "token",
    "credential",
    "privatekey",
];

/// Normalized keys that are secret-bearing only as a whole word.
const SECRET_KEY_EXACT: &[&str] = &["value", "key", "pin"];

/// Partial-mask shapes. Each reveals real characters of the masked secret.
static PARTIAL_MASK_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // Filler run then a readable tail: "••••3f9a", "**** 1234"
        Regex::new(r"^[*•●·#]{3,}[\s\-_.]*[^*•●·#\s]{1,16}$").unwrap(),
        // Run of x then a tail that does not start with x: "xxxx-9f2c"
        Regex::new(r"^[xX]{4,}[\s\-_.]*[^*•●·#xX\s][^*•●·#\s]{0,15}$").unwrap(),
        // Readable head then a filler run: "sk-ant****"
        Regex::new(r"^[^*•●·#\s]{1,16}[*•●·#]{3,}$").unwrap(),
        // Head and tail around a filler run: "sk-a****wxyz"
        Regex::new(r"^[^*•●·#\s]{1,16}[*•●·#]{3,}[^*•●·#\s]{1,16}$").unwrap(),
        // Ellipsis mask: "abc...xyz", "abc…xyz"
        Regex::new(r"^[A-Za-z0-9_\-]{2,}(?:\.{3}|…)[A-Za-z0-9_\-]{2,}$").unwrap(),
    ]
});

/// Validate a metadata object before it is persisted.
pub fn validate_metadata(metadata: &Map<String, Value>) -> Result<(), KeywardError> {
    for (key, value) in metadata {
        scan(&format!("metadata.{key}"), Some(key.as_str()), value)?;
    }
    for (key, value) in metadata {
        check_allowed(key, value)?;
    }
    Ok(())
}

/// Whether a key name denotes secret material.
pub fn is_secret_key(key: &str) -> bool {
    let normalized: String = key
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    SECRET_KEY_EXACT.contains(&normalized.as_str())
        || SECRET_KEY_FRAGMENTS
            .iter()
            .any(|fragment| normalized.contains(fragment))
}

/// Whether a string has the shape of a partially masked secret, alone or
/// embedded in a longer title ("Visa ****1234", "Visa **** 1234").
pub fn is_partial_mask(value: &str) -> bool {
    let hit = |candidate: &str| PARTIAL_MASK_PATTERNS.iter().any(|p| p.is_match(candidate));
    if hit(value.trim()) {
        return true;
    }
    let tokens: Vec<&str> = value.split_whitespace().collect();
    tokens.iter().any(|token| hit(token))
        || tokens
            .windows(2)
            .any(|pair| hit(&format!("{} {}", pair[0], pair[1])))
}

fn violation(path: &str, reason: &str) -> KeywardError {
    KeywardError::SecurityViolation {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

/// Recursive leak scan. `key` is the name the value sits under, if any.
fn scan(path: &str, key: Option<&str>, value: &Value) -> Result<(), KeywardError> {
    // Derived facts (flags, lengths, absence) may sit under a secret name.
    let literal = matches!(value, Value::String(_) | Value::Array(_) | Value::Object(_));
    if key.is_some_and(is_secret_key) && literal {
        return Err(violation(path, "secret-bearing field carries literal content"));
    }

    match value {
        Value::String(s) if is_partial_mask(s) => {
            Err(violation(path, "value looks like a partially masked secret"))
        }
        Value::Array(items) => items
            .iter()
            .enumerate()
            .try_for_each(|(i, item)| scan(&format!("{path}[{i}]"), None, item)),
        Value::Object(map) => map
            .iter()
            .try_for_each(|(k, v)| scan(&format!("{path}.{k}"), Some(k.as_str()), v)),
        _ => Ok(()),
    }
}

/// Top-level allow-list with the value shape each allowed field must have.
fn check_allowed(key: &str, value: &Value) -> Result<(), KeywardError> {
    let path = format!("metadata.{key}");
    let shape_ok = match key {
        "title" | "username" | "label" => value.is_string(),
        "labels" | "tags" => value
            .as_array()
            .is_some_and(|items| items.iter().all(Value::is_string)),
        _ if is_flag_name(key) => value.is_boolean(),
        _ if key.ends_with("Count") || key.ends_with("Length") => value.is_u64(),
        _ => return Err(violation(&path, "field is not on the metadata allow-list")),
    };
    if shape_ok {
        Ok(())
    } else {
        Err(violation(&path, "value has the wrong shape for this field"))
    }
}

/// `hasPassword`, `isFavorite`: a lowercase prefix followed by an uppercase letter.
fn is_flag_name(key: &str) -> bool {
    ["has", "is"].iter().any(|prefix| {
        key.strip_prefix(prefix)
            .and_then(|rest| rest.chars().next())
            .is_some_and(|c| c.is_ascii_uppercase())
    })
}
