// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vault key wrapping.
//!
//! The vault key is random and never derived from the password; the
//! password only derives the KEK that wraps it. Changing the password
//! re-wraps the same vault key, so secret items are never re-encrypted.
//!
//! Wrapped form: `nonce (12 bytes) || AES-256-GCM(vault key) || tag`.

use keyward_core::KeywardError;
use keyward_core::types::{EncryptedVaultKeyEnvelope, KEY_LEN, KdfParams, NONCE_LEN, SALT_LEN};
use secrecy::SecretString;
use tracing::debug;
use zeroize::Zeroizing;

use crate::crypto::{self, Kek, TAG_LEN, VaultKey};
use crate::kdf::KdfRegistry;

/// Length of a well-formed wrapped vault key.
pub const WRAPPED_LEN: usize = NONCE_LEN + KEY_LEN + TAG_LEN;

/// A random 256-bit vault key.
pub fn generate_vault_key() -> Result<VaultKey, KeywardError> {
    VaultKey::generate()
}

/// Wrap a vault key under a KEK: `nonce || ciphertext`.
pub fn wrap(vault_key: &VaultKey, kek: &Kek) -> Result<Vec<u8>, KeywardError> {
    let (ciphertext, nonce) = crypto::seal(kek.bytes(), vault_key.bytes())?;
    let mut packed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    packed.extend_from_slice(&nonce);
    packed.extend_from_slice(&ciphertext);
    Ok(packed)
}

/// Unwrap `nonce || ciphertext` under a KEK.
///
/// Wrong KEK, tampering, truncation and a wrong plaintext length all return
/// [`KeywardError::DecryptionFailed`]. Truncated input still runs one AEAD
/// open of full size, so it takes as long as an authentication failure.
pub fn unwrap(packed: &[u8], kek: &Kek) -> Result<VaultKey, KeywardError> {
    if packed.len() != WRAPPED_LEN {
        let _ = crypto::open(kek.bytes(), &[0u8; NONCE_LEN], &[0u8; KEY_LEN + TAG_LEN]);
        return Err(KeywardError::DecryptionFailed);
    }

    let (nonce, ciphertext) = packed.split_at(NONCE_LEN);
    let nonce: &[u8; NONCE_LEN] = nonce
        .try_into()
        .map_err(|_| KeywardError::DecryptionFailed)?;
    let plaintext = crypto::open(kek.bytes(), nonce, ciphertext)?;
    if plaintext.len() != KEY_LEN {
        return Err(KeywardError::DecryptionFailed);
    }

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    key.copy_from_slice(&plaintext);
    Ok(VaultKey::from_bytes(key))
}

/// Wrap a vault key into a full envelope record.
pub fn seal_envelope(
    vault_key: &VaultKey,
    kek: &Kek,
    salt: [u8; SALT_LEN],
    kdf_params: KdfParams,
) -> Result<EncryptedVaultKeyEnvelope, KeywardError> {
    let (ciphertext, nonce) = crypto::seal(kek.bytes(), vault_key.bytes())?;
    Ok(EncryptedVaultKeyEnvelope {
        salt,
        kdf_params,
        nonce,
        ciphertext,
    })
}

/// Open a stored envelope with an already-derived KEK.
pub fn open_envelope(
    envelope: &EncryptedVaultKeyEnvelope,
    kek: &Kek,
) -> Result<VaultKey, KeywardError> {
    unwrap(&envelope.wrapped_bytes(), kek)
}

/// Signup, unlock, and password change over the KDF registry.
pub struct VaultSetup;

impl VaultSetup {
    /// Create a vault key and its first envelope under the current KDF version.
    pub async fn create(
        password: &SecretString,
        registry: &KdfRegistry,
    ) -> Result<(VaultKey, EncryptedVaultKeyEnvelope), KeywardError> {
        let vault_key = generate_vault_key()?;
        let envelope = Self::rewrap(&vault_key, password, registry).await?;
        debug!(version = envelope.kdf_params.version, "vault key created");
        Ok((vault_key, envelope))
    }

    /// Reconstruct the vault key from an envelope, using the envelope's own
    /// KDF version and cost.
    pub async fn unlock(
        password: &SecretString,
        envelope: &EncryptedVaultKeyEnvelope,
        registry: &KdfRegistry,
    ) -> Result<VaultKey, KeywardError> {
        let kek = registry
            .derive_kek(password, &envelope.salt, &envelope.kdf_params)
            .await?;
        open_envelope(envelope, &kek)
    }

    /// Wrap an unlocked vault key under a new password: fresh salt, fresh
    /// nonce, current KDF version. Legacy envelopes are upgraded this way.
    pub async fn rewrap(
        vault_key: &VaultKey,
        new_password: &SecretString,
        registry: &KdfRegistry,
    ) -> Result<EncryptedVaultKeyEnvelope, KeywardError> {
        let salt = KdfRegistry::generate_salt()?;
        let params = registry.current_params()?;
        let kek = registry.derive_kek(new_password, &salt, &params).await?;
        seal_envelope(vault_key, &kek, salt, params)
    }
}
