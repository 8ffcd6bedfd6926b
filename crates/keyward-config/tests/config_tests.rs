// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Keyward configuration system.

use figment::Jail;
use keyward_config::diagnostic::ConfigError;
use keyward_config::model::KeywardConfig;
use keyward_config::{load_and_validate_str, load_config, load_config_from_str};

/// Valid TOML with every section deserializes.
#[test]
fn full_toml_deserializes() {
    let toml = r#"
[log]
level = "debug"

[storage]
database_path = "/tmp/keyward-test.db"
wal_mode = false

[kdf]
current_version = 3
pbkdf2_iterations = 200000
scrypt_log_n = 15
argon2_memory_kib = 65536
max_concurrent_derivations = 4

[session]
access_token_ttl_secs = 300
refresh_ttl_secs = 3600
absolute_lifetime_secs = 86400
bind_device_fingerprint = false

[rate_limit]
refresh_max_attempts = 5
refresh_window_secs = 30

[audit]
enabled = true
hmac_secret = "0123456789abcdef0123456789abcdef"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.log.level, "debug");
    assert_eq!(config.storage.database_path, "/tmp/keyward-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.kdf.current_version, 3);
    assert_eq!(config.kdf.pbkdf2_iterations, 200_000);
    assert_eq!(config.kdf.scrypt_log_n, 15);
    assert_eq!(config.kdf.scrypt_r, 8, "unset keys keep defaults");
    assert_eq!(config.kdf.max_concurrent_derivations, 4);
    assert_eq!(config.session.access_token_ttl_secs, 300);
    assert!(!config.session.bind_device_fingerprint);
    assert!(config.session.cookie_secure);
    assert_eq!(config.rate_limit.refresh_max_attempts, 5);
    assert_eq!(
        config.audit.hmac_secret.as_deref(),
        Some("0123456789abcdef0123456789abcdef")
    );
}

#[test]
fn empty_toml_yields_defaults() {
    let config = load_config_from_str("").unwrap();
    let defaults = KeywardConfig::default();
    assert_eq!(config.kdf.current_version, 2);
    assert_eq!(config.kdf.scrypt_log_n, 16);
    assert_eq!(config.session.refresh_token_bytes, 48);
    assert_eq!(config.session.refresh_ttl_secs, defaults.session.refresh_ttl_secs);
    assert_eq!(config.storage.database_path, defaults.storage.database_path);
}

#[test]
fn unknown_section_key_gets_a_suggestion() {
    let toml = "[session]\nrefresh_tl_secs = 10\n";
    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key,
            suggestion,
            valid_keys,
            ..
        } => {
            assert_eq!(key, "refresh_tl_secs");
            assert_eq!(suggestion.as_deref(), Some("refresh_ttl_secs"));
            assert!(valid_keys.contains("absolute_lifetime_secs"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_top_level_section_rejected() {
    let errors = load_and_validate_str("[vault]\nkey = 1\n").unwrap_err();
    assert!(matches!(&errors[0], ConfigError::UnknownKey { key, .. } if key == "vault"));
}

#[test]
fn wrong_type_reports_key_path() {
    let errors = load_and_validate_str("[kdf]\nscrypt_log_n = \"big\"\n").unwrap_err();
    match &errors[0] {
        ConfigError::InvalidType { key, .. } => assert_eq!(key, "kdf.scrypt_log_n"),
        other => panic!("expected InvalidType, got {other:?}"),
    }
}

#[test]
fn weak_kdf_fails_validation_after_parse() {
    let errors = load_and_validate_str("[kdf]\npbkdf2_iterations = 1000\n").unwrap_err();
    assert!(matches!(&errors[0], ConfigError::Validation { key, .. } if key == "kdf.pbkdf2_iterations"));
}

#[test]
fn unknown_key_diagnostic_renders_with_help() {
    use miette::{Diagnostic, GraphicalReportHandler};

    let errors = load_and_validate_str("[audit]\nhmac_secrt = \"x\"\n").unwrap_err();
    let diagnostic: &dyn Diagnostic = &errors[0];
    let help = diagnostic.help().map(|h| h.to_string()).unwrap_or_default();
    assert!(help.contains("did you mean `hmac_secret`?"), "{help}");

    let mut rendered = String::new();
    GraphicalReportHandler::new()
        .render_report(&mut rendered, diagnostic)
        .unwrap();
    assert!(rendered.contains("hmac_secrt"));
}

#[test]
fn env_overrides_file_and_ignores_unrelated_vars() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "keyward.toml",
            "[kdf]\nscrypt_log_n = 17\n\n[rate_limit]\nrefresh_max_attempts = 3\n",
        )?;
        jail.set_env("KEYWARD_KDF_SCRYPT_LOG_N", "15");
        jail.set_env("KEYWARD_RATE_LIMIT_REFRESH_WINDOW_SECS", "90");
        jail.set_env("KEYWARD_SESSION_COOKIE_SECURE", "false");
        jail.set_env("KEYWARD_MASTER_PASSWORD", "hunter2");

        let config = load_config()?;
        assert_eq!(config.kdf.scrypt_log_n, 15);
        assert_eq!(config.rate_limit.refresh_max_attempts, 3);
        assert_eq!(config.rate_limit.refresh_window_secs, 90);
        assert!(!config.session.cookie_secure);
        Ok(())
    });
}
