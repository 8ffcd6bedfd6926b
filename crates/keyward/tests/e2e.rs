// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end flows across vault, storage, sessions and the audit ledger.
//!
//! Each test builds an isolated TestHarness with a temp SQLite database.
//! The client side (key derivation, wrapping, item encryption) and the
//! server side (storage, sessions) only meet through serialized values.

use std::sync::Arc;
use std::time::Duration;

use keyward_audit::{AuditLedger, AuditSigner};
use keyward_auth::{AccessTokenSigner, DeviceInfo, RefreshCookies, SessionManager, TokenKeypair};
use keyward_config::model::{RateLimitConfig, SessionConfig};
use keyward_core::{
    AuditSink, EncryptedVaultKeyEnvelope, EnvelopeStore, KeywardError, SecretRecord,
    SecretRecordWire, SecretStore,
};
use keyward_test_utils::{MemoryRateLimiter, TEST_AUDIT_SECRET, TestHarness};
use keyward_vault::{SecretPayload, VaultSetup, decrypt_item, encrypt_item};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, json};

fn pw(s: &str) -> SecretString {
    SecretString::from(s.to_string())
}

fn ledger(harness: &TestHarness) -> Arc<AuditLedger> {
    Arc::new(AuditLedger::new(
        harness.storage.clone(),
        AuditSigner::new(TEST_AUDIT_SECRET.as_bytes()).unwrap(),
    ))
}

// ---- Signup, unlock and decrypt ----

#[tokio::test]
async fn signup_then_unlock_on_a_new_device_decrypts_items() {
    let harness = TestHarness::new().await.unwrap();

    // Device one: create the vault and one item.
    let (vault_key, envelope) = VaultSetup::create(&pw("correct horse"), &harness.registry)
        .await
        .unwrap();
    let wire = serde_json::to_string(&envelope).unwrap();
    let uploaded: EncryptedVaultKeyEnvelope = serde_json::from_str(&wire).unwrap();
    harness.storage.put_envelope("alice", &uploaded).await.unwrap();

    let payload = SecretPayload::Password {
        username: Some("alice".into()),
        password: "s3cret!".into(),
        url: Some("https://example.com".into()),
        notes: None,
    };
    let mut metadata = Map::new();
    metadata.insert("label".into(), json!("example"));
    let record = SecretRecord::new(
        "alice",
        payload.secret_type(),
        encrypt_item(&payload, &vault_key).unwrap(),
        metadata,
    );
    harness.storage.create_secret(&record).await.unwrap();

    // Device two: fetch the envelope, derive, unwrap, decrypt.
    let fetched = harness.storage.get_envelope("alice").await.unwrap().unwrap();
    let reconstructed = VaultSetup::unlock(&pw("correct horse"), &fetched, &harness.registry)
        .await
        .unwrap();
    let stored = harness.storage.get_secret(&record.id).await.unwrap().unwrap();
    let back: SecretPayload = decrypt_item(&stored.payload, &reconstructed).unwrap();
    assert_eq!(back, payload);

    // The wire shape carries ciphertext only.
    let wire: SecretRecordWire = stored.to_wire();
    let rendered = serde_json::to_string(&wire).unwrap();
    assert!(!rendered.contains("s3cret!"));
    assert!(rendered.contains("example"));
}

#[tokio::test]
async fn wrong_password_never_reveals_the_key() {
    let harness = TestHarness::new().await.unwrap();
    let (_, envelope) = VaultSetup::create(&pw("right"), &harness.registry)
        .await
        .unwrap();
    harness.storage.put_envelope("alice", &envelope).await.unwrap();

    let fetched = harness.storage.get_envelope("alice").await.unwrap().unwrap();
    let err = VaultSetup::unlock(&pw("wrong"), &fetched, &harness.registry)
        .await
        .unwrap_err();
    assert!(matches!(err, KeywardError::DecryptionFailed));
}

#[tokio::test]
async fn password_change_rewraps_without_touching_items() {
    let harness = TestHarness::new().await.unwrap();
    let (vault_key, envelope) = VaultSetup::create(&pw("old"), &harness.registry)
        .await
        .unwrap();
    harness.storage.put_envelope("alice", &envelope).await.unwrap();
    let sealed = encrypt_item(&json!({"k": "v"}), &vault_key).unwrap();

    let rewrapped = VaultSetup::rewrap(&vault_key, &pw("new"), &harness.registry)
        .await
        .unwrap();
    assert!(harness.storage.replace_envelope("alice", &rewrapped).await.unwrap());

    let fetched = harness.storage.get_envelope("alice").await.unwrap().unwrap();
    let key = VaultSetup::unlock(&pw("new"), &fetched, &harness.registry)
        .await
        .unwrap();
    let value: serde_json::Value = decrypt_item(&sealed, &key).unwrap();
    assert_eq!(value, json!({"k": "v"}));
}

// ---- Sessions over the wire contract, audited ----

#[tokio::test]
async fn refresh_cycle_through_cookies_is_audited_and_verifiable() {
    let harness = TestHarness::new().await.unwrap();
    let ledger = ledger(&harness);
    let sink: Arc<dyn AuditSink> = ledger.clone();
    let sessions = SessionManager::new(
        harness.storage.clone(),
        Arc::new(MemoryRateLimiter::default()),
        sink,
        AccessTokenSigner::new(TokenKeypair::generate(), Duration::from_secs(900)),
        SessionConfig::default(),
        RateLimitConfig::default(),
    );
    let device = DeviceInfo::new("Firefox/130", "Linux", "en-US");

    let issued = sessions.issue("alice", &device).await.unwrap();
    let headers = issued.cookies(true).set_cookie_headers();
    assert!(headers.iter().all(|h| h.contains("HttpOnly") && h.contains("Path=/auth")));

    // The browser sends both cookies back on the refresh request.
    let cookie_header = format!(
        "sessionId={}; refreshToken={}",
        issued.session_id,
        issued.refresh_token.expose_secret()
    );
    let (sid, token) = RefreshCookies::from_cookie_header(&cookie_header).unwrap();
    let rotated = sessions.refresh(&sid, &token, &device).await.unwrap();
    assert_ne!(rotated.session_id, issued.session_id);
    assert_eq!(sessions.verify(&rotated.access_token).unwrap().sub, "alice");

    // Replaying the first cookie pair fails.
    assert!(matches!(
        sessions.refresh(&sid, &token, &device).await,
        Err(KeywardError::InvalidRefreshToken)
    ));

    ledger.flush().await;
    let reviewed = ledger.review(Some("alice"), None).await.unwrap();
    let events: Vec<&str> = reviewed.iter().map(|r| r.entry.event_type.as_str()).collect();
    assert!(events.contains(&"session_issued"));
    assert!(events.contains(&"session_refreshed"));
    assert!(reviewed.iter().all(|r| !r.tampered()));
}

#[tokio::test]
async fn revoking_all_sessions_spares_the_current_one() {
    let harness = TestHarness::new().await.unwrap();
    let sessions = SessionManager::new(
        harness.storage.clone(),
        Arc::new(MemoryRateLimiter::default()),
        harness.audit.clone(),
        AccessTokenSigner::new(TokenKeypair::generate(), Duration::from_secs(900)),
        SessionConfig::default(),
        RateLimitConfig::default(),
    );
    let device = DeviceInfo::new("Firefox/130", "Linux", "en-US");

    let keep = sessions.issue("alice", &device).await.unwrap();
    sessions.issue("alice", &device).await.unwrap();
    sessions.issue("alice", &device).await.unwrap();

    let removed = sessions
        .revoke_all_for_user("alice", Some(&keep.session_id))
        .await
        .unwrap();
    assert_eq!(removed, 2);

    let refreshed = sessions
        .refresh(&keep.session_id, &keep.refresh_token, &device)
        .await;
    assert!(refreshed.is_ok());
}
