// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed secret payloads, the plaintext inside an encrypted record.

use std::collections::BTreeMap;

use keyward_core::SecretType;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Plaintext content of a secret record.
///
/// Sensitive strings are zeroed when the payload drops. `Debug` prints only
/// the variant.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "secretType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecretPayload {
    #[serde(rename_all = "camelCase")]
    Password {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
        password: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        notes: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    ApiKey {
        key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        service: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        notes: Option<String>,
    },
    EnvVars { vars: BTreeMap<String, String> },
}

impl SecretPayload {
    /// The record type this payload belongs to.
    pub fn secret_type(&self) -> SecretType {
        match self {
            SecretPayload::Password { .. } => SecretType::Password,
            SecretPayload::ApiKey { .. } => SecretType::ApiKey,
            SecretPayload::EnvVars { .. } => SecretType::EnvVars,
        }
    }

    /// The secret-bearing strings, for exact-match log redaction.
    pub fn sensitive_values(&self) -> Vec<String> {
        match self {
            SecretPayload::Password { password, .. } => vec![password.clone()],
            SecretPayload::ApiKey { key, .. } => vec![key.clone()],
            SecretPayload::EnvVars { vars } => vars.values().cloned().collect(),
        }
    }
}

impl Drop for SecretPayload {
    fn drop(&mut self) {
        match self {
            SecretPayload::Password {
                password, notes, ..
            } => {
                password.zeroize();
                notes.zeroize();
            }
            SecretPayload::ApiKey { key, notes, .. } => {
                key.zeroize();
                notes.zeroize();
            }
            SecretPayload::EnvVars { vars } => vars.values_mut().for_each(Zeroize::zeroize),
        }
    }
}

impl std::fmt::Debug for SecretPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretPayload::{}([REDACTED])", self.secret_type())
    }
}
