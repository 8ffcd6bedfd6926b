// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks the security floors that serde cannot express: KDF cost minimums,
//! refresh token entropy, lifetime ordering, and audit key length. All
//! violations are collected; validation does not fail fast.

use crate::diagnostic::ConfigError;
use crate::model::KeywardConfig;

/// Lowest accepted PBKDF2 iteration count.
pub const MIN_PBKDF2_ITERATIONS: u32 = 100_000;

/// Lowest accepted scrypt memory use (16 MiB).
pub const MIN_SCRYPT_MEMORY_BYTES: u64 = 16 * 1024 * 1024;

/// Lowest accepted Argon2id memory cost (32 MiB).
pub const MIN_ARGON2_MEMORY_KIB: u32 = 32 * 1024;

/// Refresh tokens carry at least 384 bits.
pub const MIN_REFRESH_TOKEN_BYTES: usize = 48;

/// HMAC keys shorter than the digest weaken the audit signature.
pub const MIN_AUDIT_SECRET_BYTES: usize = 32;

const KNOWN_KDF_VERSIONS: &[u32] = &[1, 2, 3];

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &KeywardConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.log.level.to_ascii_lowercase().as_str()) {
        errors.push(ConfigError::invalid(
            "log.level",
            format!("`{}` is not one of {}", config.log.level, LOG_LEVELS.join(", ")),
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::invalid("storage.database_path", "must not be empty"));
    }

    validate_kdf(config, &mut errors);
    validate_session(config, &mut errors);

    if config.rate_limit.refresh_max_attempts == 0 {
        errors.push(ConfigError::invalid(
            "rate_limit.refresh_max_attempts",
            "must be at least 1",
        ));
    }
    if config.rate_limit.refresh_window_secs == 0 {
        errors.push(ConfigError::invalid(
            "rate_limit.refresh_window_secs",
            "must be at least 1",
        ));
    }

    if config.audit.enabled {
        if let Some(secret) = &config.audit.hmac_secret {
            if secret.len() < MIN_AUDIT_SECRET_BYTES {
                errors.push(ConfigError::invalid(
                    "audit.hmac_secret",
                    format!(
                        "must be at least {MIN_AUDIT_SECRET_BYTES} bytes, got {}",
                        secret.len()
                    ),
                ));
            }
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn validate_kdf(config: &KeywardConfig, errors: &mut Vec<ConfigError>) {
    let kdf = &config.kdf;

    if !KNOWN_KDF_VERSIONS.contains(&kdf.current_version) {
        errors.push(ConfigError::invalid(
            "kdf.current_version",
            format!("unknown version {}, expected 1, 2 or 3", kdf.current_version),
        ));
    }

    if kdf.pbkdf2_iterations < MIN_PBKDF2_ITERATIONS {
        errors.push(ConfigError::invalid(
            "kdf.pbkdf2_iterations",
            format!(
                "must be at least {MIN_PBKDF2_ITERATIONS}, got {}",
                kdf.pbkdf2_iterations
            ),
        ));
    }

    if kdf.scrypt_memory_bytes() < MIN_SCRYPT_MEMORY_BYTES {
        errors.push(ConfigError::invalid(
            "kdf.scrypt_log_n",
            format!(
                "scrypt needs at least 16 MiB (128 * r * 2^log_n), got {} bytes",
                kdf.scrypt_memory_bytes()
            ),
        ));
    }
    if kdf.scrypt_log_n >= 64 || kdf.scrypt_r == 0 || kdf.scrypt_p == 0 {
        errors.push(ConfigError::invalid(
            "kdf",
            "scrypt_log_n must be below 64 and scrypt_r, scrypt_p at least 1",
        ));
    }

    if kdf.argon2_memory_kib < MIN_ARGON2_MEMORY_KIB {
        errors.push(ConfigError::invalid(
            "kdf.argon2_memory_kib",
            format!(
                "must be at least {MIN_ARGON2_MEMORY_KIB} (32 MiB), got {}",
                kdf.argon2_memory_kib
            ),
        ));
    }
    if kdf.argon2_iterations < 2 {
        errors.push(ConfigError::invalid(
            "kdf.argon2_iterations",
            format!("must be at least 2, got {}", kdf.argon2_iterations),
        ));
    }
    if kdf.argon2_parallelism == 0 {
        errors.push(ConfigError::invalid("kdf.argon2_parallelism", "must be at least 1"));
    }

    if kdf.max_concurrent_derivations == 0 {
        errors.push(ConfigError::invalid(
            "kdf.max_concurrent_derivations",
            "must be at least 1",
        ));
    }
}

fn validate_session(config: &KeywardConfig, errors: &mut Vec<ConfigError>) {
    let session = &config.session;

    if session.refresh_token_bytes < MIN_REFRESH_TOKEN_BYTES {
        errors.push(ConfigError::invalid(
            "session.refresh_token_bytes",
            format!(
                "must be at least {MIN_REFRESH_TOKEN_BYTES}, got {}",
                session.refresh_token_bytes
            ),
        ));
    }

    if session.access_token_ttl_secs == 0 {
        errors.push(ConfigError::invalid(
            "session.access_token_ttl_secs",
            "must be at least 1",
        ));
    }
    if session.refresh_ttl_secs == 0 {
        errors.push(ConfigError::invalid("session.refresh_ttl_secs", "must be at least 1"));
    }

    if session.absolute_lifetime_secs < session.refresh_ttl_secs {
        errors.push(ConfigError::invalid(
            "session.absolute_lifetime_secs",
            format!(
                "must not be shorter than session.refresh_ttl_secs ({} < {})",
                session.absolute_lifetime_secs, session.refresh_ttl_secs
            ),
        ));
    }

    if let Some(key) = &session.signing_key {
        let is_hex_seed = key.len() == 64 && key.bytes().all(|b| b.is_ascii_hexdigit());
        if !is_hex_seed {
            errors.push(ConfigError::invalid(
                "session.signing_key",
                "must be 64 hex characters (a 32-byte Ed25519 seed)",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(errors: &[ConfigError]) -> Vec<String> {
        errors.iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&KeywardConfig::default()).is_ok());
    }

    #[test]
    fn weak_pbkdf2_rejected() {
        let mut config = KeywardConfig::default();
        config.kdf.pbkdf2_iterations = 10_000;
        let errors = validate_config(&config).unwrap_err();
        assert!(messages(&errors)[0].contains("kdf.pbkdf2_iterations"));
    }

    #[test]
    fn small_scrypt_rejected() {
        let mut config = KeywardConfig::default();
        config.kdf.scrypt_log_n = 10;
        let errors = validate_config(&config).unwrap_err();
        assert!(messages(&errors).iter().any(|m| m.contains("kdf.scrypt_log_n")));
    }

    #[test]
    fn unknown_kdf_version_rejected() {
        let mut config = KeywardConfig::default();
        config.kdf.current_version = 9;
        let errors = validate_config(&config).unwrap_err();
        assert!(messages(&errors)[0].contains("unknown version 9"));
    }

    #[test]
    fn short_refresh_token_rejected() {
        let mut config = KeywardConfig::default();
        config.session.refresh_token_bytes = 16;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn absolute_lifetime_below_refresh_ttl_rejected() {
        let mut config = KeywardConfig::default();
        config.session.absolute_lifetime_secs = 60;
        config.session.refresh_ttl_secs = 120;
        let errors = validate_config(&config).unwrap_err();
        assert!(messages(&errors)[0].contains("session.absolute_lifetime_secs"));
    }

    #[test]
    fn short_audit_secret_rejected_only_when_enabled() {
        let mut config = KeywardConfig::default();
        config.audit.hmac_secret = Some("too-short".into());
        assert!(validate_config(&config).is_err());

        config.audit.enabled = false;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn malformed_signing_key_rejected() {
        let mut config = KeywardConfig::default();
        config.session.signing_key = Some("abc".into());
        assert!(validate_config(&config).is_err());
        config.session.signing_key = Some("0f".repeat(32));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn collects_every_violation() {
        let mut config = KeywardConfig::default();
        config.kdf.pbkdf2_iterations = 1;
        config.session.refresh_token_bytes = 1;
        config.rate_limit.refresh_max_attempts = 0;
        config.log.level = "loud".into();
        assert_eq!(validate_config(&config).unwrap_err().len(), 4);
    }
}
