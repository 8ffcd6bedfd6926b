// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Secret redaction for log output and error messages.
//!
//! Patterns cover the credential shapes Keyward itself produces (bearer and
//! signed access tokens, refresh cookies, key material) plus an exact-match
//! list for values only known at runtime, such as a decrypted secret the CLI
//! is about to print.

use std::io::Write;
use std::sync::{Arc, LazyLock, RwLock};

use regex::Regex;

/// The redaction placeholder.
const REDACTED: &str = "[REDACTED]";

/// Patterns replaced wholesale.
static TOKEN_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // Bearer tokens in headers
        Regex::new(r"Bearer\s+[A-Za-z0-9._\-]{10,}").unwrap(),
        // Signed access tokens: base64url(claims).base64url(64-byte signature)
        Regex::new(r"[A-Za-z0-9_\-]{20,}\.[A-Za-z0-9_\-]{80,}").unwrap(),
        // Long standard base64 runs (wrapped keys, ciphertexts)
        Regex::new(r"[A-Za-z0-9+/]{40,}={0,2}").unwrap(),
    ]
});

/// `name=value` pairs whose value is replaced but whose name is kept.
static ASSIGNMENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(refresh_?token|refreshToken|master_?password|password|hmac_secret|signing_key)(\s*[=:]\s*)[^\s;,&]+",
    )
    .unwrap()
});

/// Redact secrets from a string using patterns and exact-match values.
pub fn redact(input: &str, known_values: &[String]) -> String {
    let mut result = ASSIGNMENT_PATTERN
        .replace_all(input, format!("${{1}}${{2}}{REDACTED}"))
        .into_owned();

    for pattern in TOKEN_PATTERNS.iter() {
        result = pattern.replace_all(&result, REDACTED).into_owned();
    }

    // Longest first so a value containing another is replaced whole.
    let mut sorted: Vec<&String> = known_values.iter().filter(|v| !v.is_empty()).collect();
    sorted.sort_by_key(|v| std::cmp::Reverse(v.len()));
    for value in sorted {
        result = result.replace(value.as_str(), REDACTED);
    }

    result
}

/// A writer wrapper that redacts secrets from everything written through it.
///
/// The tracing subscriber writes each formatted event in one call, so a
/// token is never split across two writes.
pub struct RedactingWriter<W> {
    inner: W,
    known_values: Arc<RwLock<Vec<String>>>,
}

impl<W: Write> RedactingWriter<W> {
    pub fn new(inner: W, known_values: Arc<RwLock<Vec<String>>>) -> Self {
        Self {
            inner,
            known_values,
        }
    }

    /// Register a runtime value for exact-match redaction.
    pub fn add_known_value(known_values: &Arc<RwLock<Vec<String>>>, value: String) {
        if let Ok(mut values) = known_values.write() {
            if !values.contains(&value) {
                values.push(value);
            }
        }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let input = String::from_utf8_lossy(buf);
        let values = self
            .known_values
            .read()
            .map(|v| v.clone())
            .unwrap_or_default();
        self.inner.write_all(redact(&input, &values).as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
