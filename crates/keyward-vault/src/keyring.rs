// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client-side holder of the unlocked vault key.
//!
//! Readers clone an `Arc<VaultKey>` and never wait on key derivation. Every
//! unlock (and every lock) bumps a generation counter; a derivation that
//! finishes after a newer generation started is dropped instead of
//! installed, so the last request always wins. The key is bound to the user
//! whose envelope it came from and is only handed out for that user.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use keyward_core::KeywardError;
use keyward_core::types::EncryptedVaultKeyEnvelope;
use secrecy::SecretString;
use tracing::{debug, info};

use crate::crypto::VaultKey;
use crate::envelope::VaultSetup;
use crate::kdf::KdfRegistry;

/// Result of an unlock attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome {
    /// The key is installed and readable.
    Unlocked,
    /// A newer unlock or a lock started while deriving; the result was discarded.
    Superseded,
}

struct Unlocked {
    owner: String,
    key: Arc<VaultKey>,
}

/// Holds at most one unlocked vault key.
pub struct Keyring {
    registry: KdfRegistry,
    generation: AtomicU64,
    key: RwLock<Option<Unlocked>>,
}

impl std::fmt::Debug for Keyring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keyring")
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .field("unlocked", &self.is_unlocked())
            .finish()
    }
}

impl Keyring {
    pub fn new(registry: KdfRegistry) -> Self {
        Self {
            registry,
            generation: AtomicU64::new(0),
            key: RwLock::new(None),
        }
    }

    /// Derive the KEK, unwrap the vault key, and install it unless a newer
    /// generation has started in the meantime.
    ///
    /// A wrong password returns [`KeywardError::DecryptionFailed`] and leaves
    /// any previously installed key untouched.
    pub async fn unlock(
        &self,
        owner: &str,
        password: &SecretString,
        envelope: &EncryptedVaultKeyEnvelope,
    ) -> Result<UnlockOutcome, KeywardError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(generation, "unlock started");

        let vault_key = VaultSetup::unlock(password, envelope, &self.registry).await?;

        // Checked under the write lock so a concurrent lock() cannot slip in
        // between the check and the install.
        let mut slot = self.key.write().unwrap_or_else(|e| e.into_inner());
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(generation, "unlock superseded, discarding derived key");
            return Ok(UnlockOutcome::Superseded);
        }
        *slot = Some(Unlocked {
            owner: owner.to_string(),
            key: Arc::new(vault_key),
        });
        info!(generation, user_id = owner, "vault unlocked");
        Ok(UnlockOutcome::Unlocked)
    }

    /// Install an already-reconstructed key (signup hands one over directly).
    pub fn install(&self, owner: &str, vault_key: VaultKey) {
        let mut slot = self.key.write().unwrap_or_else(|e| e.into_inner());
        self.generation.fetch_add(1, Ordering::SeqCst);
        *slot = Some(Unlocked {
            owner: owner.to_string(),
            key: Arc::new(vault_key),
        });
    }

    /// Drop the key and invalidate any unlock still deriving.
    ///
    /// Readers holding a clone keep it until they drop it; the bytes are
    /// zeroed when the last clone goes.
    pub fn lock(&self) {
        let mut slot = self.key.write().unwrap_or_else(|e| e.into_inner());
        self.generation.fetch_add(1, Ordering::SeqCst);
        if slot.take().is_some() {
            info!("vault locked");
        }
    }

    /// The current key, if unlocked for `owner`.
    pub fn vault_key(&self, owner: &str) -> Option<Arc<VaultKey>> {
        self.key
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .filter(|unlocked| unlocked.owner == owner)
            .map(|unlocked| Arc::clone(&unlocked.key))
    }

    /// The current key, or an authorization error when locked or unlocked
    /// for someone else. Both cases read the same.
    pub fn require_key(&self, owner: &str) -> Result<Arc<VaultKey>, KeywardError> {
        self.vault_key(owner)
            .ok_or_else(|| KeywardError::Authorization("vault is locked".to_string()))
    }

    pub fn is_unlocked(&self) -> bool {
        self.key
            .read()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyward_config::KdfConfig;

    fn fast_registry() -> KdfRegistry {
        KdfRegistry::init(&KdfConfig {
            scrypt_log_n: 8,
            ..KdfConfig::default()
        })
        .unwrap()
    }

    /// A registry whose derivations take noticeably long.
    fn slow_registry() -> KdfRegistry {
        KdfRegistry::init(&KdfConfig {
            scrypt_log_n: 14,
            ..KdfConfig::default()
        })
        .unwrap()
    }

    fn pw(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    #[tokio::test]
    async fn unlock_then_lock() {
        let registry = fast_registry();
        let (key, envelope) = VaultSetup::create(&pw("pw"), &registry).await.unwrap();
        let keyring = Keyring::new(registry);
        assert!(!keyring.is_unlocked());
        assert!(keyring.require_key("alice").is_err());

        assert_eq!(
            keyring.unlock("alice", &pw("pw"), &envelope).await.unwrap(),
            UnlockOutcome::Unlocked
        );
        assert_eq!(keyring.require_key("alice").unwrap().bytes(), key.bytes());

        keyring.lock();
        assert!(keyring.vault_key("alice").is_none());
    }

    #[tokio::test]
    async fn key_is_only_handed_to_its_owner() {
        let registry = fast_registry();
        let (key, _) = VaultSetup::create(&pw("pw"), &registry).await.unwrap();
        let keyring = Keyring::new(registry);
        keyring.install("alice", key);

        assert!(keyring.is_unlocked());
        assert!(keyring.vault_key("alice").is_some());
        assert!(matches!(
            keyring.require_key("bob"),
            Err(KeywardError::Authorization(_))
        ));
    }

    #[tokio::test]
    async fn wrong_password_keeps_previous_key() {
        let registry = fast_registry();
        let (_, envelope) = VaultSetup::create(&pw("pw"), &registry).await.unwrap();
        let keyring = Keyring::new(registry);
        keyring.unlock("alice", &pw("pw"), &envelope).await.unwrap();

        let err = keyring.unlock("alice", &pw("nope"), &envelope).await.unwrap_err();
        assert!(matches!(err, KeywardError::DecryptionFailed));
        assert!(keyring.is_unlocked());
    }

    #[tokio::test]
    async fn reader_clone_survives_lock() {
        let registry = fast_registry();
        let (key, envelope) = VaultSetup::create(&pw("pw"), &registry).await.unwrap();
        let keyring = Keyring::new(registry);
        keyring.unlock("alice", &pw("pw"), &envelope).await.unwrap();

        let held = keyring.require_key("alice").unwrap();
        keyring.lock();
        assert_eq!(held.bytes(), key.bytes());
    }

    #[tokio::test]
    async fn lock_during_derivation_discards_result() {
        let registry = slow_registry();
        let password = pw("pw");
        let (_, envelope) = VaultSetup::create(&password, &registry).await.unwrap();
        let keyring = Keyring::new(registry);

        // join! polls the unlock first: it takes its generation and parks on
        // the blocking derivation, then the lock runs.
        let (outcome, ()) = tokio::join!(keyring.unlock("alice", &password, &envelope), async {
            keyring.lock();
        });
        assert_eq!(outcome.unwrap(), UnlockOutcome::Superseded);
        assert!(!keyring.is_unlocked());
    }

    #[tokio::test]
    async fn newer_unlock_wins() {
        let registry = slow_registry();
        let (one, two) = (pw("one"), pw("two"));
        let (_, first) = VaultSetup::create(&one, &registry).await.unwrap();
        let (second_key, second) = VaultSetup::create(&two, &registry).await.unwrap();
        let keyring = Keyring::new(registry);

        let (a, b) = tokio::join!(
            keyring.unlock("alice", &one, &first),
            keyring.unlock("alice", &two, &second)
        );
        assert_eq!(a.unwrap(), UnlockOutcome::Superseded);
        assert_eq!(b.unwrap(), UnlockOutcome::Unlocked);
        assert_eq!(keyring.require_key("alice").unwrap().bytes(), second_key.bytes());
    }
}
