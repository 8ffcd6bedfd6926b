// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tamper-evident audit ledger for Keyward.
//!
//! Entries are signed with HMAC-SHA256 over a canonical encoding and written
//! without blocking the caller. Verification reports any entry whose stored
//! content no longer matches its signature.

pub mod ledger;
pub mod signer;

pub use ledger::{AUDIT_TARGET, AuditLedger, ReviewedEntry};
pub use signer::{AuditSigner, MIN_SECRET_LEN, Verification, canonical_bytes};
