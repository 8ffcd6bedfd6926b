// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Compact signed access tokens.
//!
//! Format: `base64url(claims JSON) "." base64url(Ed25519 signature)`, where
//! the signature covers the first segment's ASCII bytes. Verification is
//! stateless: signature and expiry only.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use ed25519_dalek::Signature;
use keyward_core::KeywardError;
use serde::{Deserialize, Serialize};

use crate::keypair::TokenKeypair;

/// Claims carried by an access token. Times are unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User id.
    pub sub: String,
    /// Session the token was issued under.
    pub sid: String,
    pub iat: i64,
    pub exp: i64,
    /// Unique token id.
    pub jti: String,
}

/// Issues and verifies access tokens with a fixed TTL.
#[derive(Debug)]
pub struct AccessTokenSigner {
    keypair: TokenKeypair,
    ttl: Duration,
}

impl AccessTokenSigner {
    pub fn new(keypair: TokenKeypair, ttl: Duration) -> Self {
        Self { keypair, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn keypair(&self) -> &TokenKeypair {
        &self.keypair
    }

    /// Sign a token for `user_id` under `session_id`, valid from `now`.
    pub fn issue(
        &self,
        user_id: &str,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(String, AccessClaims), KeywardError> {
        let ttl = i64::try_from(self.ttl.as_secs())
            .map_err(|_| KeywardError::Config("access token ttl out of range".to_string()))?;
        let claims = AccessClaims {
            sub: user_id.to_string(),
            sid: session_id.to_string(),
            iat: now.timestamp(),
            exp: now.timestamp().saturating_add(ttl),
            jti: uuid::Uuid::new_v4().to_string(),
        };
        let json = serde_json::to_vec(&claims).map_err(|e| KeywardError::Internal(e.to_string()))?;
        let body = URL_SAFE_NO_PAD.encode(json);
        let signature = self.keypair.sign(body.as_bytes());
        let token = format!("{body}.{}", URL_SAFE_NO_PAD.encode(signature.to_bytes()));
        Ok((token, claims))
    }

    /// Check signature and expiry. Every failure is
    /// [`KeywardError::InvalidAccessToken`].
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<AccessClaims, KeywardError> {
        let (body, sig) = token
            .split_once('.')
            .ok_or(KeywardError::InvalidAccessToken)?;
        let sig_bytes = URL_SAFE_NO_PAD
            .decode(sig)
            .map_err(|_| KeywardError::InvalidAccessToken)?;
        let signature =
            Signature::from_slice(&sig_bytes).map_err(|_| KeywardError::InvalidAccessToken)?;
        self.keypair.verify_strict(body.as_bytes(), &signature)?;

        let json = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|_| KeywardError::InvalidAccessToken)?;
        let claims: AccessClaims =
            serde_json::from_slice(&json).map_err(|_| KeywardError::InvalidAccessToken)?;
        if now.timestamp() >= claims.exp {
            return Err(KeywardError::InvalidAccessToken);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyward_core::types::now_millis;

    fn signer() -> AccessTokenSigner {
        AccessTokenSigner::new(TokenKeypair::generate(), Duration::from_secs(900))
    }

    #[test]
    fn issued_token_verifies() {
        let signer = signer();
        let now = now_millis();
        let (token, claims) = signer.issue("user-1", "sess-1", now).unwrap();
        assert_eq!(claims.exp - claims.iat, 900);
        assert_eq!(signer.verify(&token, now).unwrap(), claims);
    }

    #[test]
    fn expired_token_is_rejected() {
        let signer = signer();
        let now = now_millis();
        let (token, _) = signer.issue("u", "s", now).unwrap();
        let later = now + chrono::Duration::seconds(900);
        assert!(matches!(
            signer.verify(&token, later),
            Err(KeywardError::InvalidAccessToken)
        ));
    }

    #[test]
    fn token_from_another_key_is_rejected() {
        let now = now_millis();
        let (token, _) = signer().issue("u", "s", now).unwrap();
        assert!(signer().verify(&token, now).is_err());
    }

    #[test]
    fn altered_claims_are_rejected() {
        let signer = signer();
        let now = now_millis();
        let (token, _) = signer.issue("u", "s", now).unwrap();
        let (_, sig) = token.split_once('.').unwrap();

        let forged_claims = AccessClaims {
            sub: "admin".into(),
            sid: "s".into(),
            iat: now.timestamp(),
            exp: now.timestamp() + 86_400,
            jti: "x".into(),
        };
        let forged_body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged_claims).unwrap());
        assert!(signer.verify(&format!("{forged_body}.{sig}"), now).is_err());
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        let signer = signer();
        let now = now_millis();
        for token in ["", "no-dot", "a.b", ".", "!!!.???"] {
            assert!(matches!(
                signer.verify(token, now),
                Err(KeywardError::InvalidAccessToken)
            ));
        }
    }
}
