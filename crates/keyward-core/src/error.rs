// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Keyward secret vault.
//!
//! Every crate in the workspace returns [`KeywardError`]. Variants that sit on
//! an authentication path carry fixed messages so that callers cannot tell a
//! wrong password from corrupted ciphertext, or a stolen token from an
//! unknown one.

use std::time::Duration;

use strum::Display;
use thiserror::Error;

/// The primary error type used across all Keyward crates.
#[derive(Debug, Error)]
pub enum KeywardError {
    /// Configuration errors (invalid TOML, out-of-range parameters).
    #[error("configuration error: {0}")]
    Config(String),

    /// Bad shape or length in caller-supplied input.
    #[error("validation error: {0}")]
    Validation(String),

    /// A KDF salt was not exactly the required length.
    #[error("invalid salt length: expected {expected} bytes, got {actual}")]
    InvalidSaltLength { expected: usize, actual: usize },

    /// The persisted KDF version tag has no registered algorithm.
    #[error("unsupported KDF version {0}")]
    UnsupportedKdfVersion(u32),

    /// Key derivation could not run (bad cost parameters, registry shut down).
    #[error("key derivation error: {0}")]
    Kdf(String),

    /// AEAD authentication failed. Wrong key, wrong password, truncated or
    /// tampered data all produce this exact variant.
    #[error("decryption failed")]
    DecryptionFailed,

    /// Encryption-side failures (RNG unavailable, key construction).
    #[error("cryptographic error: {0}")]
    Crypto(String),

    /// Generic credential rejection.
    #[error("authentication failed")]
    InvalidCredentials,

    /// The presented refresh token (or its session) is not valid.
    #[error("invalid refresh token")]
    InvalidRefreshToken,

    /// The session has passed its effective expiry.
    #[error("session expired")]
    SessionExpired,

    /// Access token signature, format, or expiry check failed.
    #[error("invalid access token")]
    InvalidAccessToken,

    /// The caller is authenticated but not allowed to act on the resource.
    #[error("not authorized: {0}")]
    Authorization(String),

    /// Metadata boundary breach. Fatal to the write; never persisted.
    #[error("security violation at `{path}`: {reason}")]
    SecurityViolation { path: String, reason: String },

    /// Too many attempts inside the current window.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// An audit entry's signature is missing or does not match.
    #[error("audit integrity failure for entry {entry_id}")]
    Integrity { entry_id: String },

    /// Persistence collaborator errors.
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse error classes exposed to callers and wire layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ErrorKind {
    /// User-correctable bad input.
    Validation,
    /// Deliberately generic authentication failure.
    Authentication,
    /// Session or ownership mismatch.
    Authorization,
    /// Metadata boundary breach.
    SecurityViolation,
    /// Retry after backoff.
    RateLimited,
    /// Audit signature mismatch.
    Integrity,
    /// Everything else.
    Internal,
}

impl KeywardError {
    /// Classify this error into the caller-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            KeywardError::Validation(_)
            | KeywardError::InvalidSaltLength { .. }
            | KeywardError::Config(_) => ErrorKind::Validation,
            KeywardError::DecryptionFailed
            | KeywardError::InvalidCredentials
            | KeywardError::InvalidRefreshToken
            | KeywardError::SessionExpired
            | KeywardError::InvalidAccessToken => ErrorKind::Authentication,
            KeywardError::Authorization(_) => ErrorKind::Authorization,
            KeywardError::SecurityViolation { .. } => ErrorKind::SecurityViolation,
            KeywardError::RateLimited { .. } => ErrorKind::RateLimited,
            KeywardError::Integrity { .. } => ErrorKind::Integrity,
            KeywardError::UnsupportedKdfVersion(_)
            | KeywardError::Kdf(_)
            | KeywardError::Crypto(_)
            | KeywardError::Storage { .. }
            | KeywardError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether the same call may succeed if retried after a delay.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            KeywardError::RateLimited { .. } | KeywardError::Storage { .. }
        )
    }

    /// Wrap any error as a storage failure.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        KeywardError::Storage {
            source: Box::new(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authentication_failures_share_a_kind() {
        for err in [
            KeywardError::DecryptionFailed,
            KeywardError::InvalidCredentials,
            KeywardError::InvalidRefreshToken,
            KeywardError::SessionExpired,
            KeywardError::InvalidAccessToken,
        ] {
            assert_eq!(err.kind(), ErrorKind::Authentication, "{err}");
        }
    }

    #[test]
    fn decryption_failed_message_is_fixed() {
        assert_eq!(KeywardError::DecryptionFailed.to_string(), "decryption failed");
    }

    #[test]
    fn security_violation_is_not_retryable() {
        let err = KeywardError::SecurityViolation {
            path: "metadata.password".into(),
            reason: "secret-bearing field".into(),
        };
        assert_eq!(err.kind(), ErrorKind::SecurityViolation);
        assert!(!err.is_retryable());
    }

    #[test]
    fn rate_limited_is_retryable() {
        let err = KeywardError::RateLimited {
            retry_after: Duration::from_secs(30),
        };
        assert!(err.is_retryable());
        assert_eq!(err.kind(), ErrorKind::RateLimited);
    }

    #[test]
    fn storage_helper_boxes_source() {
        let err = KeywardError::storage(std::io::Error::other("disk gone"));
        assert!(err.to_string().contains("disk gone"));
    }
}
