// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence collaborator for the Keyward secret vault.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and implementations of every
//! persistence trait in `keyward-core`: sessions (with atomic rotation),
//! secret records, vault key envelopes, audit entries, and the atomic
//! rate-limit counter.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::Database;
