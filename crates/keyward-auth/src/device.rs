// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client device description used to bind refresh sessions.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// What the client reports about itself on login and refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub accept_language: Option<String>,
}

impl DeviceInfo {
    pub fn new(
        user_agent: impl Into<String>,
        platform: impl Into<String>,
        accept_language: impl Into<String>,
    ) -> Self {
        Self {
            user_agent: Some(user_agent.into()),
            platform: Some(platform.into()),
            accept_language: Some(accept_language.into()),
        }
    }

    /// SHA-256 hex over the normalized fields.
    ///
    /// Normalization trims, lowercases and collapses inner whitespace, so
    /// cosmetic header differences do not count as a different device.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for field in [&self.user_agent, &self.platform, &self.accept_language] {
            hasher.update(normalize(field.as_deref().unwrap_or("")).as_bytes());
            hasher.update([0x1f]);
        }
        hex::encode(hasher.finalize())
    }
}

fn normalize(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
