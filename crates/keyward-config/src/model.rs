// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Keyward.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Keyward configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct KeywardConfig {
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Key derivation settings.
    #[serde(default)]
    pub kdf: KdfConfig,

    /// Access and refresh token settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Refresh throttling settings.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Audit ledger settings.
    #[serde(default)]
    pub audit: AuditConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("keyward").join("keyward.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("keyward.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Key derivation configuration.
///
/// Only `current_version` decides what new envelopes get. Existing envelopes
/// carry their own version and cost parameters and keep using them.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct KdfConfig {
    /// KDF version assigned to new envelopes (1 = PBKDF2, 2 = scrypt, 3 = Argon2id).
    #[serde(default = "default_current_version")]
    pub current_version: u32,

    /// PBKDF2-HMAC-SHA256 iteration count for version 1.
    #[serde(default = "default_pbkdf2_iterations")]
    pub pbkdf2_iterations: u32,

    /// scrypt log2(N) for version 2 (default 16, with r = 8 that is 64 MiB).
    #[serde(default = "default_scrypt_log_n")]
    pub scrypt_log_n: u8,

    /// scrypt block size r.
    #[serde(default = "default_scrypt_r")]
    pub scrypt_r: u32,

    /// scrypt parallelism p.
    #[serde(default = "default_scrypt_p")]
    pub scrypt_p: u32,

    /// Argon2id memory cost in KiB for version 3.
    #[serde(default = "default_argon2_memory_kib")]
    pub argon2_memory_kib: u32,

    /// Argon2id iteration count for version 3.
    #[serde(default = "default_argon2_iterations")]
    pub argon2_iterations: u32,

    /// Argon2id parallelism lanes for version 3.
    #[serde(default = "default_argon2_parallelism")]
    pub argon2_parallelism: u32,

    /// How many memory-hard derivations may run at once.
    #[serde(default = "default_max_concurrent_derivations")]
    pub max_concurrent_derivations: usize,
}

impl Default for KdfConfig {
    fn default() -> Self {
        Self {
            current_version: default_current_version(),
            pbkdf2_iterations: default_pbkdf2_iterations(),
            scrypt_log_n: default_scrypt_log_n(),
            scrypt_r: default_scrypt_r(),
            scrypt_p: default_scrypt_p(),
            argon2_memory_kib: default_argon2_memory_kib(),
            argon2_iterations: default_argon2_iterations(),
            argon2_parallelism: default_argon2_parallelism(),
            max_concurrent_derivations: default_max_concurrent_derivations(),
        }
    }
}

impl KdfConfig {
    /// Bytes of memory one scrypt derivation needs with these parameters.
    pub fn scrypt_memory_bytes(&self) -> u64 {
        128u64
            .saturating_mul(u64::from(self.scrypt_r))
            .saturating_mul(1u64.checked_shl(u32::from(self.scrypt_log_n)).unwrap_or(u64::MAX))
    }
}

fn default_current_version() -> u32 {
    2
}

fn default_pbkdf2_iterations() -> u32 {
    100_000
}

fn default_scrypt_log_n() -> u8 {
    16
}

fn default_scrypt_r() -> u32 {
    8
}

fn default_scrypt_p() -> u32 {
    1
}

fn default_argon2_memory_kib() -> u32 {
    65536 // 64 MiB per OWASP recommendation
}

fn default_argon2_iterations() -> u32 {
    3
}

fn default_argon2_parallelism() -> u32 {
    4
}

fn default_max_concurrent_derivations() -> usize {
    2
}

/// Session credential configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Access token lifetime in seconds.
    #[serde(default = "default_access_token_ttl_secs")]
    pub access_token_ttl_secs: u64,

    /// Sliding refresh-session lifetime in seconds.
    #[serde(default = "default_refresh_ttl_secs")]
    pub refresh_ttl_secs: u64,

    /// Hard ceiling from the first login, in seconds. Rotation never extends past it.
    #[serde(default = "default_absolute_lifetime_secs")]
    pub absolute_lifetime_secs: u64,

    /// Random bytes per refresh token.
    #[serde(default = "default_refresh_token_bytes")]
    pub refresh_token_bytes: usize,

    /// Revoke a session when the refreshing device does not match.
    #[serde(default = "default_true")]
    pub bind_device_fingerprint: bool,

    /// Emit the `Secure` attribute on refresh cookies.
    #[serde(default = "default_true")]
    pub cookie_secure: bool,

    /// Hex-encoded 32-byte Ed25519 seed used to sign access tokens.
    /// `None` makes the binary generate an ephemeral key.
    #[serde(default)]
    pub signing_key: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            access_token_ttl_secs: default_access_token_ttl_secs(),
            refresh_ttl_secs: default_refresh_ttl_secs(),
            absolute_lifetime_secs: default_absolute_lifetime_secs(),
            refresh_token_bytes: default_refresh_token_bytes(),
            bind_device_fingerprint: true,
            cookie_secure: true,
            signing_key: None,
        }
    }
}

fn default_access_token_ttl_secs() -> u64 {
    15 * 60
}

fn default_refresh_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_absolute_lifetime_secs() -> u64 {
    30 * 24 * 60 * 60
}

fn default_refresh_token_bytes() -> usize {
    48
}

fn default_true() -> bool {
    true
}

/// Refresh throttling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Refresh attempts allowed per session per window.
    #[serde(default = "default_refresh_max_attempts")]
    pub refresh_max_attempts: u64,

    /// Window length in seconds.
    #[serde(default = "default_refresh_window_secs")]
    pub refresh_window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            refresh_max_attempts: default_refresh_max_attempts(),
            refresh_window_secs: default_refresh_window_secs(),
        }
    }
}

fn default_refresh_max_attempts() -> u64 {
    10
}

fn default_refresh_window_secs() -> u64 {
    60
}

/// Audit ledger configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Record security events.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// HMAC key for entry signatures; at least 32 bytes.
    #[serde(default)]
    pub hmac_secret: Option<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hmac_secret: None,
        }
    }
}
