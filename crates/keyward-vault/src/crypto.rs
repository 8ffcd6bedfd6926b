// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Low-level AES-256-GCM seal/open operations and key types.
//!
//! Every call to [`seal`] generates a fresh random 96-bit nonce via the system
//! CSPRNG. Nonce reuse would be catastrophic for GCM security.

use keyward_core::KeywardError;
use keyward_core::types::{KEY_LEN, NONCE_LEN};
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

/// GCM authentication tag length.
pub const TAG_LEN: usize = 16;

/// The per-user symmetric key that encrypts secret items.
///
/// Lives only in memory on the unlocking party; the bytes are zeroed on drop.
pub struct VaultKey(Zeroizing<[u8; KEY_LEN]>);

impl VaultKey {
    /// A fresh random 256-bit key.
    pub fn generate() -> Result<Self, KeywardError> {
        Ok(Self(Zeroizing::new(random_bytes()?)))
    }

    pub(crate) fn from_bytes(bytes: Zeroizing<[u8; KEY_LEN]>) -> Self {
        Self(bytes)
    }

    pub(crate) fn bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("VaultKey([REDACTED])")
    }
}

/// Key-encryption key derived from the master password.
pub struct Kek(Zeroizing<[u8; KEY_LEN]>);

impl Kek {
    pub(crate) fn new(bytes: Zeroizing<[u8; KEY_LEN]>) -> Self {
        Self(bytes)
    }

    pub(crate) fn bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Byte equality, for determinism tests.
    #[cfg(test)]
    pub(crate) fn same_bytes(&self, other: &Kek) -> bool {
        *self.0 == *other.0
    }
}

impl std::fmt::Debug for Kek {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Kek([REDACTED])")
    }
}

/// Fill an array from the system CSPRNG.
pub fn random_bytes<const N: usize>() -> Result<[u8; N], KeywardError> {
    let mut out = [0u8; N];
    SystemRandom::new()
        .fill(&mut out)
        .map_err(|_| KeywardError::Crypto("system random source unavailable".to_string()))?;
    Ok(out)
}

fn aead_key(key: &[u8; KEY_LEN]) -> Result<LessSafeKey, KeywardError> {
    let unbound = UnboundKey::new(&AES_256_GCM, key)
        .map_err(|_| KeywardError::Crypto("failed to create AES-256-GCM key".to_string()))?;
    Ok(LessSafeKey::new(unbound))
}

/// Encrypt with AES-256-GCM under a random 96-bit nonce.
///
/// Returns `(ciphertext_with_tag, nonce)`.
pub fn seal(
    key: &[u8; KEY_LEN],
    plaintext: &[u8],
) -> Result<(Vec<u8>, [u8; NONCE_LEN]), KeywardError> {
    let sealing_key = aead_key(key)?;
    let nonce_bytes: [u8; NONCE_LEN] = random_bytes()?;

    // The buffer is overwritten with ciphertext, so no plaintext copy survives.
    let mut in_out = Vec::with_capacity(plaintext.len() + TAG_LEN);
    in_out.extend_from_slice(plaintext);
    sealing_key
        .seal_in_place_append_tag(
            Nonce::assume_unique_for_key(nonce_bytes),
            Aad::empty(),
            &mut in_out,
        )
        .map_err(|_| KeywardError::Crypto("AES-256-GCM encryption failed".to_string()))?;

    Ok((in_out, nonce_bytes))
}

/// Decrypt AES-256-GCM ciphertext (tag appended).
///
/// Any failure, including a malformed key, is [`KeywardError::DecryptionFailed`].
/// The plaintext buffer is zeroed when the returned value drops.
pub fn open(
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, KeywardError> {
    let opening_key = aead_key(key).map_err(|_| KeywardError::DecryptionFailed)?;

    let mut in_out = Zeroizing::new(ciphertext.to_vec());
    let len = opening_key
        .open_in_place(Nonce::assume_unique_for_key(*nonce), Aad::empty(), &mut in_out)
        .map_err(|_| KeywardError::DecryptionFailed)?
        .len();
    in_out.truncate(len);
    Ok(in_out)
}
