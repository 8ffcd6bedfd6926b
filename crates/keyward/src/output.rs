// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON output on stdout. Diagnostics go to stderr through tracing.

use keyward_core::KeywardError;
use serde::Serialize;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), KeywardError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| KeywardError::Internal(format!("failed to render output: {e}")))?;
    println!("{rendered}");
    Ok(())
}
