// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the vault, storage, session, and audit crates.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::KeywardError;

/// Salt length for every KDF version.
pub const SALT_LEN: usize = 16;

/// AEAD nonce length (96 bits).
pub const NONCE_LEN: usize = 12;

/// Symmetric key length for KEKs and vault keys.
pub const KEY_LEN: usize = 32;

/// Payload encoding written before typed payloads existed.
pub const LEGACY_PAYLOAD_VERSION: u32 = 1;

/// Payload encoding written by this release.
pub const CURRENT_PAYLOAD_VERSION: u32 = 2;

/// Current time truncated to millisecond precision.
///
/// Storage keeps timestamps as Unix milliseconds; anything that is signed or
/// compared after a round trip must be created through this function.
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

// --- Secrets ---

/// Kind of secret held in a record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SecretType {
    Password,
    ApiKey,
    EnvVars,
}

/// Opaque AEAD output for one secret item.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    /// Ciphertext with the 16-byte tag appended.
    pub ciphertext: Vec<u8>,
    /// Nonce used for this ciphertext only.
    pub nonce: [u8; NONCE_LEN],
}

impl std::fmt::Debug for EncryptedPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedPayload")
            .field("ciphertext_len", &self.ciphertext.len())
            .finish()
    }
}

/// A stored secret. `payload` is the only carrier of sensitive fields.
#[derive(Debug, Clone)]
pub struct SecretRecord {
    pub id: String,
    pub owner_id: String,
    pub secret_type: SecretType,
    pub payload: EncryptedPayload,
    /// Which payload encoding the plaintext uses (see [`CURRENT_PAYLOAD_VERSION`]).
    pub payload_version: u32,
    /// Secret-free metadata, checked by the metadata boundary validator.
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SecretRecord {
    /// Build a new record with a fresh id and current timestamps.
    pub fn new(
        owner_id: impl Into<String>,
        secret_type: SecretType,
        payload: EncryptedPayload,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        let now = now_millis();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            secret_type,
            payload,
            payload_version: CURRENT_PAYLOAD_VERSION,
            metadata,
            created_at: now,
            updated_at: now,
        }
    }

    /// Convert to the client-facing wire shape.
    pub fn to_wire(&self) -> SecretRecordWire {
        SecretRecordWire {
            id: Some(self.id.clone()),
            encrypted_data: self.payload.ciphertext.clone(),
            iv: self.payload.nonce,
            metadata: self.metadata.clone(),
            secret_type: self.secret_type,
        }
    }
}

/// Wire shape of a secret record: `{encryptedData, iv, metadata, secretType}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretRecordWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(with = "b64")]
    pub encrypted_data: Vec<u8>,
    #[serde(with = "b64")]
    pub iv: [u8; NONCE_LEN],
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub secret_type: SecretType,
}

impl SecretRecordWire {
    /// The encrypted payload carried by this wire record.
    pub fn payload(&self) -> EncryptedPayload {
        EncryptedPayload {
            ciphertext: self.encrypted_data.clone(),
            nonce: self.iv,
        }
    }
}

// --- Key derivation and envelopes ---

/// Algorithm identifier with its cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "kebab-case")]
pub enum KdfCost {
    /// Legacy iterative hash KDF.
    Pbkdf2Sha256 { iterations: u32 },
    /// Memory-hard KDF; memory use is `128 * r * 2^log_n` bytes.
    Scrypt { log_n: u8, r: u32, p: u32 },
    /// Memory-hard KDF with memory cost in KiB.
    Argon2id {
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
    },
}

/// Versioned KDF parameters stored alongside every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub version: u32,
    #[serde(flatten)]
    pub cost: KdfCost,
}

/// The sole at-rest representation of a vault key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedVaultKeyEnvelope {
    #[serde(with = "b64")]
    pub salt: [u8; SALT_LEN],
    pub kdf_params: KdfParams,
    #[serde(with = "b64")]
    pub nonce: [u8; NONCE_LEN],
    #[serde(with = "b64")]
    pub ciphertext: Vec<u8>,
}

impl std::fmt::Debug for EncryptedVaultKeyEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedVaultKeyEnvelope")
            .field("kdf_params", &self.kdf_params)
            .field("ciphertext_len", &self.ciphertext.len())
            .finish()
    }
}

impl EncryptedVaultKeyEnvelope {
    /// `nonce || ciphertext`, the packed wrapped-key form.
    pub fn wrapped_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NONCE_LEN + self.ciphertext.len());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }
}

/// Unlock wire contract: `{encryptedVaultKeyEnvelope, salt, kdfParams}`.
///
/// The server hands this to the client; all KEK and vault key work happens
/// client-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockMaterial {
    #[serde(with = "b64")]
    pub encrypted_vault_key_envelope: Vec<u8>,
    #[serde(with = "b64")]
    pub salt: [u8; SALT_LEN],
    pub kdf_params: KdfParams,
}

impl From<&EncryptedVaultKeyEnvelope> for UnlockMaterial {
    fn from(envelope: &EncryptedVaultKeyEnvelope) -> Self {
        Self {
            encrypted_vault_key_envelope: envelope.wrapped_bytes(),
            salt: envelope.salt,
            kdf_params: envelope.kdf_params,
        }
    }
}

impl TryFrom<UnlockMaterial> for EncryptedVaultKeyEnvelope {
    type Error = KeywardError;

    fn try_from(material: UnlockMaterial) -> Result<Self, Self::Error> {
        let packed = material.encrypted_vault_key_envelope;
        if packed.len() <= NONCE_LEN {
            return Err(KeywardError::DecryptionFailed);
        }
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&packed[..NONCE_LEN]);
        Ok(Self {
            salt: material.salt,
            kdf_params: material.kdf_params,
            nonce,
            ciphertext: packed[NONCE_LEN..].to_vec(),
        })
    }
}

// --- Sessions ---

/// A refresh session. Replaced wholesale on every rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    /// Hex SHA-256 of the refresh token; the token itself is never stored.
    pub refresh_token_hash: String,
    pub created_at: DateTime<Utc>,
    /// Relative (sliding) expiry.
    pub expires_at: DateTime<Utc>,
    /// Ceiling inherited from the first session in the rotation chain.
    pub absolute_expires_at: DateTime<Utc>,
    pub device_fingerprint: Option<String>,
    pub last_used_at: DateTime<Utc>,
}

impl Session {
    /// `min(relative expiry, absolute expiry)`.
    pub fn effective_expiry(&self) -> DateTime<Utc> {
        self.expires_at.min(self.absolute_expires_at)
    }

    /// Whether the session is unusable at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.effective_expiry()
    }
}

/// Predicate for bulk session deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionFilter {
    /// Every session of a user, optionally sparing one.
    User {
        user_id: String,
        except: Option<String>,
    },
    /// Every session whose effective expiry is at or before the instant.
    ExpiredAt(DateTime<Utc>),
}

// --- Rate limiting ---

/// Result of an atomic counter increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateCount {
    pub count: u64,
    pub ttl_remaining: Duration,
}

// --- Audit ---

/// Free-form audit metadata. Ordered so the canonical encoding is stable.
pub type AuditMeta = BTreeMap<String, serde_json::Value>;

/// Security-relevant events recorded in the audit ledger.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuditEvent {
    Signup,
    EnvelopeFetched,
    PasswordChanged,
    SessionIssued,
    SessionRefreshed,
    SessionRevoked,
    SessionExpired,
    RefreshTokenMismatch,
    DeviceMismatch,
    RefreshRateLimited,
    SecretCreated,
    SecretUpdated,
    SecretDeleted,
    MetadataViolation,
}

/// A signed audit ledger row.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub id: String,
    /// Stored as text so unknown or tampered values can still be verified.
    pub event_type: String,
    pub user_id: Option<String>,
    pub meta: AuditMeta,
    pub created_at: DateTime<Utc>,
    /// Hex HMAC-SHA256 over the canonical tuple. `None` is a tamper signal.
    pub signature: Option<String>,
}

/// Base64 (standard alphabet) serde adapter for byte fields.
pub mod b64 {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S, T>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: AsRef<[u8]>,
    {
        serializer.serialize_str(&STANDARD.encode(bytes.as_ref()))
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: TryFrom<Vec<u8>>,
    {
        let encoded = String::deserialize(deserializer)?;
        let bytes = STANDARD.decode(encoded).map_err(D::Error::custom)?;
        T::try_from(bytes).map_err(|_| D::Error::custom("unexpected byte length"))
    }
}
