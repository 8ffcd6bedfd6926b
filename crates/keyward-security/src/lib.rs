// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Security boundaries for Keyward.
//!
//! [`metadata`] keeps secret material out of the plaintext metadata stored
//! next to every encrypted record; [`redact`] keeps it out of log output.

pub mod metadata;
pub mod redact;

pub use metadata::validate_metadata;
pub use redact::{RedactingWriter, redact};
