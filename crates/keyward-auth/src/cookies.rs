// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Refresh wire contract: two HTTP-only cookies plus a JSON body carrying
//! the bearer access token.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

pub const SESSION_COOKIE: &str = "sessionId";
pub const REFRESH_COOKIE: &str = "refreshToken";
pub const COOKIE_PATH: &str = "/auth";

/// The cookie pair that carries a refresh session.
pub struct RefreshCookies {
    pub session_id: String,
    pub refresh_token: SecretString,
    pub max_age: Duration,
    pub secure: bool,
}

impl std::fmt::Debug for RefreshCookies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCookies")
            .field("session_id", &self.session_id)
            .field("max_age", &self.max_age)
            .field("secure", &self.secure)
            .finish_non_exhaustive()
    }
}

impl RefreshCookies {
    /// `Set-Cookie` header values for both cookies.
    pub fn set_cookie_headers(&self) -> [String; 2] {
        let max_age = self.max_age.as_secs();
        [
            render(SESSION_COOKIE, &self.session_id, max_age, self.secure),
            render(
                REFRESH_COOKIE,
                self.refresh_token.expose_secret(),
                max_age,
                self.secure,
            ),
        ]
    }

    /// `Set-Cookie` values that make the client drop both cookies.
    pub fn clearing_headers(secure: bool) -> [String; 2] {
        [
            render(SESSION_COOKIE, "", 0, secure),
            render(REFRESH_COOKIE, "", 0, secure),
        ]
    }

    /// Pull `(session_id, refresh_token)` out of a `Cookie` request header.
    pub fn from_cookie_header(header: &str) -> Option<(String, SecretString)> {
        let mut session_id = None;
        let mut refresh_token = None;
        for pair in header.split(';') {
            let Some((name, value)) = pair.trim().split_once('=') else {
                continue;
            };
            match name.trim() {
                SESSION_COOKIE if !value.is_empty() => session_id = Some(value.to_string()),
                REFRESH_COOKIE if !value.is_empty() => {
                    refresh_token = Some(SecretString::from(value.to_string()))
                }
                _ => {}
            }
        }
        Some((session_id?, refresh_token?))
    }
}

fn render(name: &str, value: &str, max_age: u64, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!("{name}={value}; Max-Age={max_age}; Path={COOKIE_PATH}; HttpOnly{secure}; SameSite=Strict")
}

/// JSON body returned by login and refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    /// Seconds until the access token expires.
    pub expires_in: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookies() -> RefreshCookies {
        RefreshCookies {
            session_id: "sess-1".into(),
            refresh_token: SecretString::from("tok".to_string()),
            max_age: Duration::from_secs(3600),
            secure: true,
        }
    }

    #[test]
    fn set_cookie_carries_all_attributes() {
        let [session, refresh] = cookies().set_cookie_headers();
        assert_eq!(
            session,
            "sessionId=sess-1; Max-Age=3600; Path=/auth; HttpOnly; Secure; SameSite=Strict"
        );
        assert!(refresh.starts_with("refreshToken=tok;"));
        assert!(refresh.contains("HttpOnly"));
        assert!(refresh.contains("SameSite=Strict"));
    }

    #[test]
    fn insecure_mode_drops_secure_flag_only() {
        let mut c = cookies();
        c.secure = false;
        let [session, _] = c.set_cookie_headers();
        assert!(!session.contains("Secure"));
        assert!(session.contains("HttpOnly"));
    }

    #[test]
    fn clearing_headers_expire_immediately() {
        for header in RefreshCookies::clearing_headers(true) {
            assert!(header.contains("Max-Age=0"));
            assert!(header.contains("=;"));
        }
    }

    #[test]
    fn debug_hides_refresh_token() {
        assert!(!format!("{:?}", cookies()).contains("tok"));
    }

    #[test]
    fn parses_request_cookie_header() {
        let (sid, token) =
            RefreshCookies::from_cookie_header("theme=dark; sessionId=s-9; refreshToken=abc")
                .unwrap();
        assert_eq!(sid, "s-9");
        assert_eq!(token.expose_secret(), "abc");
        assert!(RefreshCookies::from_cookie_header("sessionId=s-9").is_none());
    }

    #[test]
    fn response_uses_camel_case() {
        let body = RefreshResponse {
            access_token: "a.b".into(),
            expires_in: 900,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["accessToken"], "a.b");
        assert_eq!(json["expiresIn"], 900);
    }
}
