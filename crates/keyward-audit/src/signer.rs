// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HMAC-SHA256 signatures over the canonical audit tuple.
//!
//! The canonical form is the compact JSON array
//! `[event_type, user_id | null, meta, created_at]` with `meta` keys in
//! sorted order and `created_at` as RFC 3339 UTC with milliseconds. The
//! same entry therefore always yields the same bytes, whatever order its
//! metadata was built in.

use chrono::{DateTime, SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use keyward_core::{AuditEntry, AuditMeta, KeywardError};
use sha2::Sha256;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// Shortest accepted signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Outcome of checking one entry's signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Valid,
    /// The entry carries no signature at all.
    Missing,
    /// The signature does not match the entry's content.
    Mismatch,
}

impl Verification {
    pub fn is_valid(self) -> bool {
        self == Verification::Valid
    }
}

pub struct AuditSigner {
    key: Zeroizing<Vec<u8>>,
}

impl std::fmt::Debug for AuditSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuditSigner([REDACTED])")
    }
}

impl AuditSigner {
    pub fn new(secret: &[u8]) -> Result<Self, KeywardError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(KeywardError::Config(format!(
                "audit secret must be at least {MIN_SECRET_LEN} bytes, got {}",
                secret.len()
            )));
        }
        Ok(Self {
            key: Zeroizing::new(secret.to_vec()),
        })
    }

    fn mac(&self) -> Result<HmacSha256, KeywardError> {
        HmacSha256::new_from_slice(&self.key).map_err(|e| KeywardError::Crypto(e.to_string()))
    }

    /// Hex HMAC over the canonical tuple.
    pub fn sign(
        &self,
        event_type: &str,
        user_id: Option<&str>,
        meta: &AuditMeta,
        created_at: &DateTime<Utc>,
    ) -> Result<String, KeywardError> {
        let mut mac = self.mac()?;
        mac.update(&canonical_bytes(event_type, user_id, meta, created_at)?);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    pub fn sign_entry(&self, entry: &AuditEntry) -> Result<String, KeywardError> {
        self.sign(
            &entry.event_type,
            entry.user_id.as_deref(),
            &entry.meta,
            &entry.created_at,
        )
    }

    /// Recompute and compare in constant time.
    pub fn verify(&self, entry: &AuditEntry) -> Result<Verification, KeywardError> {
        let Some(signature) = entry.signature.as_deref() else {
            return Ok(Verification::Missing);
        };
        let Ok(expected) = hex::decode(signature) else {
            return Ok(Verification::Mismatch);
        };
        let mut mac = self.mac()?;
        mac.update(&canonical_bytes(
            &entry.event_type,
            entry.user_id.as_deref(),
            &entry.meta,
            &entry.created_at,
        )?);
        Ok(match mac.verify_slice(&expected) {
            Ok(()) => Verification::Valid,
            Err(_) => Verification::Mismatch,
        })
    }
}

/// The exact bytes the signature covers.
pub fn canonical_bytes(
    event_type: &str,
    user_id: Option<&str>,
    meta: &AuditMeta,
    created_at: &DateTime<Utc>,
) -> Result<Vec<u8>, KeywardError> {
    let tuple = (
        event_type,
        user_id,
        meta,
        created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
    );
    serde_json::to_vec(&tuple).map_err(|e| KeywardError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyward_core::types::now_millis;
    use proptest::prelude::*;
    use serde_json::json;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn entry(meta: AuditMeta) -> AuditEntry {
        let signer = AuditSigner::new(SECRET).unwrap();
        let created_at = now_millis();
        let signature = signer
            .sign("session_issued", Some("u1"), &meta, &created_at)
            .unwrap();
        AuditEntry {
            id: "e1".into(),
            event_type: "session_issued".into(),
            user_id: Some("u1".into()),
            meta,
            created_at,
            signature: Some(signature),
        }
    }

    #[test]
    fn short_secret_is_rejected() {
        assert!(matches!(
            AuditSigner::new(b"too short"),
            Err(KeywardError::Config(_))
        ));
    }

    #[test]
    fn signed_entry_verifies() {
        let signer = AuditSigner::new(SECRET).unwrap();
        let e = entry(AuditMeta::from([("session_id".to_string(), json!("s1"))]));
        assert_eq!(signer.verify(&e).unwrap(), Verification::Valid);
    }

    #[test]
    fn every_field_is_covered() {
        let signer = AuditSigner::new(SECRET).unwrap();
        let base = entry(AuditMeta::from([("n".to_string(), json!(1))]));

        let mut tampered = Vec::new();
        let mut e = base.clone();
        e.event_type = "session_revoked".into();
        tampered.push(e);
        let mut e = base.clone();
        e.user_id = None;
        tampered.push(e);
        let mut e = base.clone();
        e.meta.insert("n".into(), json!(2));
        tampered.push(e);
        let mut e = base.clone();
        e.created_at += chrono::Duration::milliseconds(1);
        tampered.push(e);

        for e in &tampered {
            assert_eq!(signer.verify(e).unwrap(), Verification::Mismatch);
        }
    }

    #[test]
    fn missing_and_garbage_signatures_are_reported() {
        let signer = AuditSigner::new(SECRET).unwrap();
        let mut e = entry(AuditMeta::new());
        e.signature = None;
        assert_eq!(signer.verify(&e).unwrap(), Verification::Missing);
        e.signature = Some("not hex".into());
        assert_eq!(signer.verify(&e).unwrap(), Verification::Mismatch);
    }

    #[test]
    fn other_key_does_not_verify() {
        let other = AuditSigner::new(b"another-secret-another-secret-xx").unwrap();
        assert_eq!(
            other.verify(&entry(AuditMeta::new())).unwrap(),
            Verification::Mismatch
        );
    }

    proptest! {
        #[test]
        fn any_metadata_signs_and_verifies(
            pairs in proptest::collection::vec(("[a-z]{1,8}", any::<i64>()), 0..10)
        ) {
            let signer = AuditSigner::new(SECRET).unwrap();
            let created_at = now_millis();
            let forward: AuditMeta = pairs.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
            let signature = signer.sign("secret_created", None, &forward, &created_at).unwrap();
            let entry = AuditEntry {
                id: "e".into(),
                event_type: "secret_created".into(),
                user_id: None,
                meta: forward.clone(),
                created_at,
                signature: Some(signature),
            };
            prop_assert!(signer.verify(&entry).unwrap().is_valid());

            // Rebuilding the same map in reverse order changes nothing.
            let mut rebuilt = AuditMeta::new();
            for (k, v) in forward.iter().rev() {
                rebuilt.insert(k.clone(), v.clone());
            }
            prop_assert_eq!(
                canonical_bytes("e", None, &forward, &created_at).unwrap(),
                canonical_bytes("e", None, &rebuilt, &created_at).unwrap()
            );
        }
    }
}
