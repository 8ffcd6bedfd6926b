// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session credential manager.
//!
//! Access tokens are short-lived and verified statelessly. Refresh tokens are
//! long-lived, single-use, and bound to a stored session that keeps only the
//! token's SHA-256 hash. Every successful refresh replaces the session
//! wholesale (new id, new hash) in one atomic store operation; the absolute
//! expiry is carried over unchanged so rotation never extends a session past
//! its original ceiling.
//!
//! Theft indicators (hash mismatch, device mismatch) revoke the session as
//! part of failing the call.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use keyward_config::model::{RateLimitConfig, SessionConfig};
use keyward_core::types::now_millis;
use keyward_core::{
    AuditEvent, AuditMeta, AuditSink, KeywardError, RateLimiter, Session, SessionFilter,
    SessionStore,
};
use rand::RngCore;
use rand::rngs::OsRng;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::cookies::{RefreshCookies, RefreshResponse};
use crate::device::DeviceInfo;
use crate::token::{AccessClaims, AccessTokenSigner};

/// Credentials handed to the client after login or refresh.
pub struct IssuedCredentials {
    pub session_id: String,
    pub user_id: String,
    pub access_token: String,
    pub access_claims: AccessClaims,
    /// Plaintext refresh token. Exists only in this value and in transit.
    pub refresh_token: SecretString,
    pub session_expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for IssuedCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedCredentials")
            .field("session_id", &self.session_id)
            .field("user_id", &self.user_id)
            .field("session_expires_at", &self.session_expires_at)
            .finish_non_exhaustive()
    }
}

impl IssuedCredentials {
    /// Cookies carrying the refresh session, expiring with it.
    pub fn cookies(&self, secure: bool) -> RefreshCookies {
        let remaining = self.session_expires_at.timestamp() - self.access_claims.iat;
        RefreshCookies {
            session_id: self.session_id.clone(),
            refresh_token: SecretString::from(self.refresh_token.expose_secret().to_owned()),
            max_age: Duration::from_secs(u64::try_from(remaining).unwrap_or(0)),
            secure,
        }
    }

    /// JSON body carrying the bearer access token.
    pub fn response(&self) -> RefreshResponse {
        RefreshResponse {
            access_token: self.access_token.clone(),
            expires_in: u64::try_from(self.access_claims.exp - self.access_claims.iat)
                .unwrap_or(0),
        }
    }
}

/// Result of a revoke call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Revocation {
    /// A stored session was deleted.
    pub removed: bool,
    /// The caller revoked its own session and must drop its stored credentials.
    pub clear_credentials: bool,
}

/// SHA-256 hex of a refresh token, the only form that is persisted.
pub fn hash_refresh_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn ct_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

fn generate_refresh_token(len: usize) -> Result<SecretString, KeywardError> {
    let mut bytes = Zeroizing::new(vec![0u8; len]);
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| KeywardError::Crypto(format!("random source unavailable: {e}")))?;
    Ok(SecretString::from(URL_SAFE_NO_PAD.encode(bytes.as_slice())))
}

fn secs(value: u64) -> chrono::Duration {
    chrono::Duration::seconds(i64::try_from(value).unwrap_or(i64::MAX))
}

fn meta<const N: usize>(pairs: [(&str, Value); N]) -> AuditMeta {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// Issues, rotates, verifies, and revokes sessions.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    limiter: Arc<dyn RateLimiter>,
    audit: Arc<dyn AuditSink>,
    signer: AccessTokenSigner,
    config: SessionConfig,
    rate_limit: RateLimitConfig,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        limiter: Arc<dyn RateLimiter>,
        audit: Arc<dyn AuditSink>,
        signer: AccessTokenSigner,
        config: SessionConfig,
        rate_limit: RateLimitConfig,
    ) -> Self {
        Self {
            store,
            limiter,
            audit,
            signer,
            config,
            rate_limit,
        }
    }

    pub fn signer(&self) -> &AccessTokenSigner {
        &self.signer
    }

    /// Start a session for an already-authenticated user.
    pub async fn issue(
        &self,
        user_id: &str,
        device: &DeviceInfo,
    ) -> Result<IssuedCredentials, KeywardError> {
        self.issue_at(user_id, device, now_millis()).await
    }

    pub async fn issue_at(
        &self,
        user_id: &str,
        device: &DeviceInfo,
        now: DateTime<Utc>,
    ) -> Result<IssuedCredentials, KeywardError> {
        let absolute_expires_at = now + secs(self.config.absolute_lifetime_secs);
        let (session, refresh_token) = self.new_session(user_id, device, now, absolute_expires_at)?;
        self.store.create_session(&session).await?;

        let credentials = self.credentials(&session, refresh_token, now)?;
        metrics::counter!("keyward_sessions_issued_total").increment(1);
        self.audit.append(
            AuditEvent::SessionIssued,
            Some(user_id),
            meta([("session_id", json!(session.id))]),
        );
        info!(session_id = %session.id, user_id, "session issued");
        Ok(credentials)
    }

    /// Exchange a refresh token for a new session and access token.
    pub async fn refresh(
        &self,
        session_id: &str,
        presented: &SecretString,
        device: &DeviceInfo,
    ) -> Result<IssuedCredentials, KeywardError> {
        self.refresh_at(session_id, presented, device, now_millis())
            .await
    }

    pub async fn refresh_at(
        &self,
        session_id: &str,
        presented: &SecretString,
        device: &DeviceInfo,
        now: DateTime<Utc>,
    ) -> Result<IssuedCredentials, KeywardError> {
        self.check_rate_limit(session_id).await?;

        let Some(session) = self.store.get_session(session_id).await? else {
            debug!(session_id, "refresh for unknown session");
            return Err(KeywardError::InvalidRefreshToken);
        };

        if session.is_expired_at(now) {
            self.store.delete_session(&session.id).await?;
            self.audit.append(
                AuditEvent::SessionExpired,
                Some(&session.user_id),
                meta([("session_id", json!(session.id))]),
            );
            info!(session_id, "expired session removed on refresh");
            return Err(KeywardError::SessionExpired);
        }

        let presented_hash = hash_refresh_token(presented.expose_secret());
        if !ct_eq(&presented_hash, &session.refresh_token_hash) {
            self.revoke_for_theft(&session, AuditEvent::RefreshTokenMismatch)
                .await?;
            return Err(KeywardError::InvalidRefreshToken);
        }

        if self.config.bind_device_fingerprint
            && let Some(bound) = &session.device_fingerprint
            && !ct_eq(bound, &device.fingerprint())
        {
            self.revoke_for_theft(&session, AuditEvent::DeviceMismatch)
                .await?;
            return Err(KeywardError::InvalidRefreshToken);
        }

        let (replacement, refresh_token) =
            self.new_session(&session.user_id, device, now, session.absolute_expires_at)?;
        if !self
            .store
            .rotate_session(&session.id, &session.refresh_token_hash, &replacement)
            .await?
        {
            // Another refresh with the same token rotated first.
            self.audit.append(
                AuditEvent::RefreshTokenMismatch,
                Some(&session.user_id),
                meta([
                    ("session_id", json!(session.id)),
                    ("reason", json!("already_rotated")),
                ]),
            );
            warn!(session_id, "refresh lost a concurrent rotation");
            return Err(KeywardError::InvalidRefreshToken);
        }

        let credentials = self.credentials(&replacement, refresh_token, now)?;
        metrics::counter!("keyward_refresh_rotations_total").increment(1);
        self.audit.append(
            AuditEvent::SessionRefreshed,
            Some(&session.user_id),
            meta([
                ("previous_session_id", json!(session.id)),
                ("session_id", json!(replacement.id)),
            ]),
        );
        debug!(
            previous = %session.id,
            session_id = %replacement.id,
            "session rotated"
        );
        Ok(credentials)
    }

    /// Stateless access token check: signature and expiry only.
    pub fn verify(&self, access_token: &str) -> Result<AccessClaims, KeywardError> {
        self.signer.verify(access_token, Utc::now())
    }

    /// Delete a session. `caller_session_id` is the session making the call;
    /// revoking it tells the caller to clear its own credentials.
    pub async fn revoke(
        &self,
        session_id: &str,
        caller_session_id: Option<&str>,
    ) -> Result<Revocation, KeywardError> {
        let owner = self
            .store
            .get_session(session_id)
            .await?
            .map(|s| s.user_id);
        let removed = self.store.delete_session(session_id).await?;
        if removed {
            self.audit.append(
                AuditEvent::SessionRevoked,
                owner.as_deref(),
                meta([("session_id", json!(session_id))]),
            );
            info!(session_id, "session revoked");
        }
        Ok(Revocation {
            removed,
            clear_credentials: caller_session_id == Some(session_id),
        })
    }

    /// Revoke every session of a user, optionally sparing one.
    pub async fn revoke_all_for_user(
        &self,
        user_id: &str,
        except: Option<&str>,
    ) -> Result<usize, KeywardError> {
        let removed = self
            .store
            .delete_sessions(&SessionFilter::User {
                user_id: user_id.to_string(),
                except: except.map(str::to_string),
            })
            .await?;
        if removed > 0 {
            self.audit.append(
                AuditEvent::SessionRevoked,
                Some(user_id),
                meta([("count", json!(removed)), ("scope", json!("user"))]),
            );
        }
        info!(user_id, removed, "user sessions revoked");
        Ok(removed)
    }

    /// Housekeeping: delete every session past its effective expiry, then
    /// every lapsed refresh counter. Returns the number of sessions removed.
    ///
    /// Counter cleanup is best effort, like the rate check itself.
    pub async fn prune_expired(&self, now: DateTime<Utc>) -> Result<usize, KeywardError> {
        let removed = self
            .store
            .delete_sessions(&SessionFilter::ExpiredAt(now))
            .await?;
        if removed > 0 {
            info!(removed, "expired sessions pruned");
        }
        match self.limiter.purge_expired().await {
            Ok(0) => {}
            Ok(windows) => debug!(windows, "lapsed rate-limit windows purged"),
            Err(e) => warn!(error = %e, "rate-limit purge failed"),
        }
        Ok(removed)
    }

    /// Fails open when the counter collaborator is unavailable.
    async fn check_rate_limit(&self, session_id: &str) -> Result<(), KeywardError> {
        let window = Duration::from_secs(self.rate_limit.refresh_window_secs);
        match self
            .limiter
            .increment(&format!("refresh:{session_id}"), window)
            .await
        {
            Ok(count) if count.count > self.rate_limit.refresh_max_attempts => {
                metrics::counter!("keyward_refresh_rate_limited_total").increment(1);
                self.audit.append(
                    AuditEvent::RefreshRateLimited,
                    None,
                    meta([
                        ("session_id", json!(session_id)),
                        ("attempts", json!(count.count)),
                    ]),
                );
                warn!(session_id, attempts = count.count, "refresh rate limited");
                Err(KeywardError::RateLimited {
                    retry_after: count.ttl_remaining,
                })
            }
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(session_id, error = %e, "rate limiter unavailable, allowing refresh");
                Ok(())
            }
        }
    }

    async fn revoke_for_theft(
        &self,
        session: &Session,
        event: AuditEvent,
    ) -> Result<(), KeywardError> {
        self.store.delete_session(&session.id).await?;
        metrics::counter!("keyward_refresh_theft_revocations_total").increment(1);
        self.audit.append(
            event,
            Some(&session.user_id),
            meta([("session_id", json!(session.id))]),
        );
        warn!(
            security_alert = true,
            session_id = %session.id,
            user_id = %session.user_id,
            reason = %event,
            "possible refresh token theft, session revoked"
        );
        Ok(())
    }

    fn new_session(
        &self,
        user_id: &str,
        device: &DeviceInfo,
        now: DateTime<Utc>,
        absolute_expires_at: DateTime<Utc>,
    ) -> Result<(Session, SecretString), KeywardError> {
        let refresh_token = generate_refresh_token(self.config.refresh_token_bytes)?;
        let session = Session {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            refresh_token_hash: hash_refresh_token(refresh_token.expose_secret()),
            created_at: now,
            expires_at: (now + secs(self.config.refresh_ttl_secs)).min(absolute_expires_at),
            absolute_expires_at,
            device_fingerprint: self
                .config
                .bind_device_fingerprint
                .then(|| device.fingerprint()),
            last_used_at: now,
        };
        Ok((session, refresh_token))
    }

    fn credentials(
        &self,
        session: &Session,
        refresh_token: SecretString,
        now: DateTime<Utc>,
    ) -> Result<IssuedCredentials, KeywardError> {
        let (access_token, access_claims) = self.signer.issue(&session.user_id, &session.id, now)?;
        Ok(IssuedCredentials {
            session_id: session.id.clone(),
            user_id: session.user_id.clone(),
            access_token,
            access_claims,
            refresh_token,
            session_expires_at: session.effective_expiry(),
        })
    }
}
