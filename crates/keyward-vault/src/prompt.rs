// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Master password acquisition via TTY prompt or the KEYWARD_MASTER_PASSWORD
//! environment variable.

use keyward_core::KeywardError;
use secrecy::SecretString;
use zeroize::Zeroizing;

/// The environment variable name for providing the master password.
pub const MASTER_PASSWORD_ENV_VAR: &str = "KEYWARD_MASTER_PASSWORD";

/// The replacement password during a password change.
pub const NEW_MASTER_PASSWORD_ENV_VAR: &str = "KEYWARD_NEW_MASTER_PASSWORD";

/// Read the master password.
///
/// Priority:
/// 1. `KEYWARD_MASTER_PASSWORD` (headless use, scripts, CI)
/// 2. Interactive TTY prompt via `rpassword`
pub fn read_master_password() -> Result<SecretString, KeywardError> {
    if let Some(password) = from_env(MASTER_PASSWORD_ENV_VAR) {
        return Ok(password);
    }

    if std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        let password = prompt("Master password: ")?;
        return non_empty(password);
    }

    Err(no_source(MASTER_PASSWORD_ENV_VAR))
}

/// Read a new master password, prompting twice on a TTY.
///
/// The environment variable needs no confirmation.
pub fn read_new_master_password() -> Result<SecretString, KeywardError> {
    read_confirmed(MASTER_PASSWORD_ENV_VAR)
}

/// Read the replacement password for a password change from
/// `KEYWARD_NEW_MASTER_PASSWORD`, or prompt twice.
pub fn read_changed_master_password() -> Result<SecretString, KeywardError> {
    read_confirmed(NEW_MASTER_PASSWORD_ENV_VAR)
}

fn read_confirmed(var: &str) -> Result<SecretString, KeywardError> {
    if let Some(password) = from_env(var) {
        return Ok(password);
    }

    if std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        let first = prompt("New master password: ")?;
        let second = prompt("Confirm master password: ")?;
        return confirm(first, second);
    }

    Err(no_source(var))
}

fn from_env(var: &str) -> Option<SecretString> {
    match std::env::var(var) {
        Ok(value) if !value.is_empty() => Some(SecretString::from(value)),
        _ => None,
    }
}

fn prompt(label: &str) -> Result<Zeroizing<String>, KeywardError> {
    eprint!("{label}");
    rpassword::read_password()
        .map(Zeroizing::new)
        .map_err(|e| KeywardError::Internal(format!("failed to read password: {e}")))
}

fn non_empty(password: Zeroizing<String>) -> Result<SecretString, KeywardError> {
    if password.is_empty() {
        return Err(KeywardError::Validation(
            "empty master password not allowed".to_string(),
        ));
    }
    Ok(SecretString::from(password.as_str().to_owned()))
}

fn confirm(
    first: Zeroizing<String>,
    second: Zeroizing<String>,
) -> Result<SecretString, KeywardError> {
    if *first != *second {
        return Err(KeywardError::Validation(
            "passwords do not match".to_string(),
        ));
    }
    non_empty(first)
}

fn no_source(var: &str) -> KeywardError {
    KeywardError::Validation(format!(
        "no master password provided; set {var} or run interactively"
    ))
}
