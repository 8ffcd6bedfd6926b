// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fire-and-forget audit ledger.
//!
//! [`AuditLedger::append`] signs the entry synchronously and hands the
//! insert to a tracked background task, so the caller's request path never
//! waits on storage and never sees an audit failure. Failed writes are
//! logged under the `keyward::audit` target. [`AuditLedger::flush`] waits
//! for every write started so far.

use std::sync::Arc;

use keyward_core::types::now_millis;
use keyward_core::{AuditEntry, AuditEvent, AuditMeta, AuditSink, AuditStore, KeywardError};
use tokio::runtime::Handle;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, error, warn};

use crate::signer::{AuditSigner, Verification};

/// Tracing target for audit write failures.
pub const AUDIT_TARGET: &str = "keyward::audit";

/// An entry together with its signature check.
#[derive(Debug, Clone)]
pub struct ReviewedEntry {
    pub entry: AuditEntry,
    pub verification: Verification,
}

impl ReviewedEntry {
    pub fn tampered(&self) -> bool {
        !self.verification.is_valid()
    }
}

pub struct AuditLedger {
    store: Arc<dyn AuditStore>,
    signer: Arc<AuditSigner>,
    tracker: TaskTracker,
}

impl std::fmt::Debug for AuditLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLedger")
            .field("pending", &self.tracker.len())
            .finish()
    }
}

impl AuditLedger {
    pub fn new(store: Arc<dyn AuditStore>, signer: AuditSigner) -> Self {
        Self {
            store,
            signer: Arc::new(signer),
            tracker: TaskTracker::new(),
        }
    }

    /// Build a signed entry stamped now.
    pub fn build_entry(
        &self,
        event: AuditEvent,
        user_id: Option<&str>,
        meta: AuditMeta,
    ) -> Result<AuditEntry, KeywardError> {
        let event_type = event.to_string();
        let created_at = now_millis();
        let signature = self.signer.sign(&event_type, user_id, &meta, &created_at)?;
        Ok(AuditEntry {
            id: uuid::Uuid::new_v4().to_string(),
            event_type,
            user_id: user_id.map(str::to_string),
            meta,
            created_at,
            signature: Some(signature),
        })
    }

    /// Wait until every append issued before this call has finished.
    pub async fn flush(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Check one entry's signature.
    ///
    /// A missing or mismatching signature is reported as
    /// [`KeywardError::Integrity`] and raised as a security alert.
    pub fn verify(&self, entry: &AuditEntry) -> Result<(), KeywardError> {
        match self.signer.verify(entry)? {
            Verification::Valid => Ok(()),
            outcome => {
                tamper_alert(entry, outcome);
                Err(KeywardError::Integrity {
                    entry_id: entry.id.clone(),
                })
            }
        }
    }

    /// Fetch and verify a stored entry by id.
    pub async fn verify_stored(&self, id: &str) -> Result<AuditEntry, KeywardError> {
        let entry = self
            .store
            .get_audit_entry(id)
            .await?
            .ok_or_else(|| KeywardError::Validation(format!("no audit entry {id}")))?;
        self.verify(&entry)?;
        Ok(entry)
    }

    /// List entries oldest first, each with its verification result.
    pub async fn review(
        &self,
        user_id: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<ReviewedEntry>, KeywardError> {
        let entries = self.store.list_audit_entries(user_id, limit).await?;
        let mut reviewed = Vec::with_capacity(entries.len());
        for entry in entries {
            let verification = self.signer.verify(&entry)?;
            if !verification.is_valid() {
                tamper_alert(&entry, verification);
            }
            reviewed.push(ReviewedEntry {
                entry,
                verification,
            });
        }
        Ok(reviewed)
    }
}

fn tamper_alert(entry: &AuditEntry, outcome: Verification) {
    metrics::counter!("keyward_audit_tamper_detected_total").increment(1);
    warn!(
        security_alert = true,
        entry_id = %entry.id,
        event_type = %entry.event_type,
        ?outcome,
        "audit entry failed signature verification"
    );
}

fn write_failed(event_type: &str, err: &KeywardError) {
    metrics::counter!("keyward_audit_append_failures_total").increment(1);
    error!(target: AUDIT_TARGET, event_type, error = %err, "audit write failed");
}

impl AuditSink for AuditLedger {
    fn append(&self, event: AuditEvent, user_id: Option<&str>, meta: AuditMeta) {
        let entry = match self.build_entry(event, user_id, meta) {
            Ok(entry) => entry,
            Err(e) => {
                write_failed(&event.to_string(), &e);
                return;
            }
        };

        let Ok(handle) = Handle::try_current() else {
            write_failed(
                &entry.event_type,
                &KeywardError::Internal("no async runtime for audit write".to_string()),
            );
            return;
        };

        let store = Arc::clone(&self.store);
        self.tracker.spawn_on(
            async move {
                match store.insert_audit_entry(&entry).await {
                    Ok(()) => debug!(entry_id = %entry.id, "audit entry written"),
                    Err(e) => write_failed(&entry.event_type, &e),
                }
            }
            .in_current_span(),
            &handle,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use keyward_test_utils::{TEST_AUDIT_SECRET, TestHarness};
    use serde_json::json;
    use tracing_test::traced_test;

    struct BrokenStore;

    #[async_trait]
    impl AuditStore for BrokenStore {
        async fn insert_audit_entry(&self, _entry: &AuditEntry) -> Result<(), KeywardError> {
            Err(KeywardError::Internal("disk on fire".to_string()))
        }

        async fn get_audit_entry(&self, _id: &str) -> Result<Option<AuditEntry>, KeywardError> {
            Ok(None)
        }

        async fn list_audit_entries(
            &self,
            _user_id: Option<&str>,
            _limit: Option<u32>,
        ) -> Result<Vec<AuditEntry>, KeywardError> {
            Ok(Vec::new())
        }
    }

    fn signer() -> AuditSigner {
        AuditSigner::new(TEST_AUDIT_SECRET.as_bytes()).unwrap()
    }

    async fn ledger() -> (TestHarness, AuditLedger) {
        let harness = TestHarness::new().await.unwrap();
        let ledger = AuditLedger::new(harness.storage.clone(), signer());
        (harness, ledger)
    }

    #[tokio::test]
    async fn appended_entries_are_stored_signed() {
        let (_harness, ledger) = ledger().await;
        ledger.append(
            AuditEvent::SessionIssued,
            Some("u1"),
            AuditMeta::from([("session_id".to_string(), json!("s1"))]),
        );
        ledger.append(AuditEvent::SessionRevoked, None, AuditMeta::new());
        ledger.flush().await;

        let reviewed = ledger.review(None, None).await.unwrap();
        assert_eq!(reviewed.len(), 2);
        assert!(reviewed.iter().all(|r| !r.tampered()));
        assert_eq!(reviewed[0].entry.event_type, "session_issued");
        assert_eq!(reviewed[1].entry.user_id, None);

        let only_u1 = ledger.review(Some("u1"), None).await.unwrap();
        assert_eq!(only_u1.len(), 1);
    }

    #[tokio::test]
    async fn tampered_row_is_detected() {
        let (harness, ledger) = ledger().await;
        let mut entry = ledger
            .build_entry(AuditEvent::SecretDeleted, Some("u1"), AuditMeta::new())
            .unwrap();
        entry.user_id = Some("u2".to_string());
        harness.storage.insert_audit_entry(&entry).await.unwrap();

        let err = ledger.verify_stored(&entry.id).await.unwrap_err();
        assert!(matches!(err, KeywardError::Integrity { ref entry_id } if *entry_id == entry.id));

        let reviewed = ledger.review(None, None).await.unwrap();
        assert_eq!(reviewed[0].verification, Verification::Mismatch);
    }

    #[tokio::test]
    async fn unsigned_row_is_detected() {
        let (harness, ledger) = ledger().await;
        let mut entry = ledger
            .build_entry(AuditEvent::Signup, Some("u1"), AuditMeta::new())
            .unwrap();
        entry.signature = None;
        harness.storage.insert_audit_entry(&entry).await.unwrap();

        let reviewed = ledger.review(Some("u1"), Some(10)).await.unwrap();
        assert_eq!(reviewed[0].verification, Verification::Missing);
        assert!(ledger.verify(&reviewed[0].entry).is_err());
    }

    #[tokio::test]
    #[traced_test]
    async fn failed_write_is_logged_not_raised() {
        let ledger = AuditLedger::new(Arc::new(BrokenStore), signer());
        ledger.append(AuditEvent::SecretCreated, Some("u1"), AuditMeta::new());
        ledger.flush().await;

        assert!(logs_contain("audit write failed"));
        assert!(logs_contain("disk on fire"));
    }

    #[test]
    #[traced_test]
    fn append_outside_a_runtime_is_logged() {
        let ledger = AuditLedger::new(Arc::new(BrokenStore), signer());
        ledger.append(AuditEvent::Signup, None, AuditMeta::new());
        assert!(logs_contain("no async runtime for audit write"));
    }

    #[tokio::test]
    async fn flush_can_be_called_repeatedly() {
        let (_harness, ledger) = ledger().await;
        ledger.append(AuditEvent::Signup, Some("u1"), AuditMeta::new());
        ledger.flush().await;
        ledger.append(AuditEvent::PasswordChanged, Some("u1"), AuditMeta::new());
        ledger.flush().await;
        assert_eq!(ledger.review(Some("u1"), None).await.unwrap().len(), 2);
    }
}
