// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ed25519 keypair used to sign access tokens.

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use keyward_core::KeywardError;
use rand::rngs::OsRng;
use zeroize::Zeroizing;

/// The access-token signing keypair.
///
/// Only the public half is needed to verify tokens; verification never
/// consults session storage.
pub struct TokenKeypair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl std::fmt::Debug for TokenKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenKeypair")
            .field("public", &self.public_hex())
            .finish_non_exhaustive()
    }
}

impl TokenKeypair {
    /// Generate a new random Ed25519 keypair.
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut OsRng))
    }

    /// Reconstruct a keypair from its 32-byte seed.
    pub fn from_bytes(seed: &[u8; 32]) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(seed))
    }

    /// Reconstruct a keypair from a 64-character hex seed, as found in
    /// `session.signing_key`.
    pub fn from_hex(seed_hex: &str) -> Result<Self, KeywardError> {
        let bytes = Zeroizing::new(
            hex::decode(seed_hex.trim())
                .map_err(|_| KeywardError::Config("signing key is not valid hex".to_string()))?,
        );
        let seed: &[u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            KeywardError::Config("signing key must be exactly 32 bytes".to_string())
        })?;
        Ok(Self::from_bytes(seed))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let verifying_key = VerifyingKey::from(&signing_key);
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Get the public key bytes.
    pub fn public_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// Hex-encoded public key, safe to log and publish.
    pub fn public_hex(&self) -> String {
        hex::encode(self.public_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }

    /// Verify with strict mode, which rejects weak public keys and
    /// non-canonical signatures.
    ///
    /// Every failure is the same [`KeywardError::InvalidAccessToken`].
    pub fn verify_strict(&self, message: &[u8], signature: &Signature) -> Result<(), KeywardError> {
        self.verifying_key
            .verify_strict(message, signature)
            .map_err(|_| KeywardError::InvalidAccessToken)
    }
}
