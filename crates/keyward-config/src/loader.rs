// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./keyward.toml` > `~/.config/keyward/keyward.toml` > `/etc/keyward/keyward.toml`
//! with environment variable overrides via `KEYWARD_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::KeywardConfig;

/// System-wide configuration file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/keyward/keyward.toml";

/// Local configuration file, resolved against the working directory.
pub const LOCAL_CONFIG_FILE: &str = "keyward.toml";

/// Top-level sections that environment variables may target.
///
/// Ordered longest first so `rate_limit_*` is never read as a `rate` section.
const ENV_SECTIONS: &[&str] = &["rate_limit", "storage", "session", "audit", "kdf", "log"];

/// Path of the per-user XDG config file, if a config dir exists.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("keyward").join(LOCAL_CONFIG_FILE))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/keyward/keyward.toml` (system-wide)
/// 3. `~/.config/keyward/keyward.toml` (user XDG config)
/// 4. `./keyward.toml` (local directory)
/// 5. `KEYWARD_*` environment variables
pub fn load_config() -> Result<KeywardConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string over the defaults (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<KeywardConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(KeywardConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<KeywardConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(KeywardConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    let mut figment = Figment::new()
        .merge(Serialized::defaults(KeywardConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH));
    if let Some(user) = user_config_path() {
        figment = figment.merge(Toml::file(user));
    }
    figment
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// Map a lowercased, prefix-stripped env key to a dotted config path.
///
/// `session_refresh_ttl_secs` becomes `session.refresh_ttl_secs`. Keys that
/// name no known section return `None` and are ignored, so unrelated
/// `KEYWARD_*` variables (the master password, for one) never reach the model.
fn section_path(key: &str) -> Option<String> {
    ENV_SECTIONS.iter().find_map(|section| {
        key.strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
            .filter(|rest| !rest.is_empty())
            .map(|rest| format!("{section}.{rest}"))
    })
}

/// Environment provider with explicit section-to-dot mapping.
///
/// `Env::split("_")` would turn `KEYWARD_KDF_SCRYPT_LOG_N` into
/// `kdf.scrypt.log.n`; field names contain underscores, so only the section
/// prefix is split off.
fn env_provider() -> Env {
    Env::prefixed("KEYWARD_")
        .filter(|key| section_path(key.as_str()).is_some())
        .map(|key| {
            section_path(key.as_str())
                .unwrap_or_else(|| key.as_str().to_string())
                .into()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_path_splits_only_the_section() {
        assert_eq!(
            section_path("kdf_scrypt_log_n").as_deref(),
            Some("kdf.scrypt_log_n")
        );
        assert_eq!(
            section_path("rate_limit_refresh_max_attempts").as_deref(),
            Some("rate_limit.refresh_max_attempts")
        );
        assert_eq!(section_path("log_level").as_deref(), Some("log.level"));
    }

    #[test]
    fn unrelated_keys_are_ignored() {
        assert_eq!(section_path("master_password"), None);
        assert_eq!(section_path("kdf"), None);
        assert_eq!(section_path("kdf_"), None);
    }
}
