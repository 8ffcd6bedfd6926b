// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client-side cryptography for Keyward.
//!
//! A random vault key encrypts every secret item. The master password never
//! touches item data: it only derives the key-encryption key (KEK) that wraps
//! the vault key into an envelope the server stores but cannot open.
//! Derivation runs through a versioned [`KdfRegistry`] so envelopes written
//! under older cost settings keep unlocking.

pub mod cipher;
pub mod crypto;
pub mod envelope;
pub mod kdf;
pub mod keyring;
pub mod migration;
pub mod payload;
pub mod prompt;

pub use cipher::{ItemView, decrypt_item, encrypt_item, open_listing, read_record, upgrade_record};
pub use crypto::{Kek, VaultKey};
pub use envelope::{VaultSetup, generate_vault_key};
pub use kdf::{KdfAlgorithm, KdfRegistry};
pub use keyring::{Keyring, UnlockOutcome};
pub use migration::{MigrationOutcome, migrate_legacy_payload};
pub use payload::SecretPayload;
pub use prompt::{
    MASTER_PASSWORD_ENV_VAR, NEW_MASTER_PASSWORD_ENV_VAR, read_changed_master_password,
    read_master_password, read_new_master_password,
};
