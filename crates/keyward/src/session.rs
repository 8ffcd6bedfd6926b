// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `keyward session` subcommands.
//!
//! Output mirrors the HTTP refresh contract: the JSON body plus the
//! `Set-Cookie` values a server would send.

use clap::{Args, Subcommand};
use keyward_auth::{DeviceInfo, IssuedCredentials, RefreshCookies};
use keyward_core::KeywardError;
use keyward_core::types::now_millis;
use serde_json::{Value, json};

use crate::app::App;
use crate::output::print_json;

/// Client description used for device binding.
#[derive(Args, Debug, Clone, Default)]
pub struct DeviceArgs {
    #[arg(long)]
    pub user_agent: Option<String>,
    #[arg(long)]
    pub platform: Option<String>,
    #[arg(long)]
    pub accept_language: Option<String>,
}

impl From<DeviceArgs> for DeviceInfo {
    fn from(args: DeviceArgs) -> Self {
        DeviceInfo {
            user_agent: args.user_agent,
            platform: args.platform,
            accept_language: args.accept_language,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum SessionCommand {
    /// Start a session for an authenticated user.
    Issue {
        #[arg(long)]
        user: String,
        #[command(flatten)]
        device: DeviceArgs,
    },
    /// Rotate a session using the value of a `Cookie` header.
    Refresh {
        #[arg(long)]
        cookie: String,
        #[command(flatten)]
        device: DeviceArgs,
    },
    /// Check an access token and print its claims.
    Verify { token: String },
    /// Revoke one session.
    Revoke {
        #[arg(long)]
        session: String,
        /// The session making the request, if any.
        #[arg(long)]
        caller: Option<String>,
    },
    /// Revoke every session of a user.
    RevokeAll {
        #[arg(long)]
        user: String,
        /// A session to keep.
        #[arg(long)]
        except: Option<String>,
    },
    /// Delete expired sessions.
    Prune,
}

pub async fn run_session(app: &App, command: SessionCommand) -> Result<(), KeywardError> {
    let sessions = app.sessions();
    let secure = app.config().session.cookie_secure;
    match command {
        SessionCommand::Issue { user, device } => {
            let issued = sessions.issue(&user, &device.into()).await?;
            print_json(&credentials_output(&issued, secure))
        }
        SessionCommand::Refresh { cookie, device } => {
            let (session_id, refresh_token) = RefreshCookies::from_cookie_header(&cookie)
                .ok_or(KeywardError::InvalidRefreshToken)?;
            let issued = sessions
                .refresh(&session_id, &refresh_token, &device.into())
                .await?;
            print_json(&credentials_output(&issued, secure))
        }
        SessionCommand::Verify { token } => {
            let claims = sessions.verify(&token)?;
            print_json(&claims)
        }
        SessionCommand::Revoke { session, caller } => {
            let revocation = sessions.revoke(&session, caller.as_deref()).await?;
            let mut output = json!({
                "removed": revocation.removed,
                "clearCredentials": revocation.clear_credentials,
            });
            if revocation.clear_credentials {
                output["setCookie"] = json!(RefreshCookies::clearing_headers(secure));
            }
            print_json(&output)
        }
        SessionCommand::RevokeAll { user, except } => {
            let removed = sessions.revoke_all_for_user(&user, except.as_deref()).await?;
            print_json(&json!({ "removed": removed }))
        }
        SessionCommand::Prune => {
            let removed = sessions.prune_expired(now_millis()).await?;
            print_json(&json!({ "removed": removed }))
        }
    }
}

fn credentials_output(issued: &IssuedCredentials, secure: bool) -> Value {
    let response = issued.response();
    json!({
        "sessionId": issued.session_id,
        "accessToken": response.access_token,
        "expiresIn": response.expires_in,
        "setCookie": issued.cookies(secure).set_cookie_headers(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_device_fields_stay_empty() {
        let info: DeviceInfo = DeviceArgs {
            user_agent: Some("curl/8".into()),
            ..DeviceArgs::default()
        }
        .into();
        assert_eq!(info.user_agent.as_deref(), Some("curl/8"));
        assert!(info.platform.is_none());
        let shouted: DeviceInfo = DeviceArgs {
            user_agent: Some("CURL/8 ".into()),
            ..DeviceArgs::default()
        }
        .into();
        assert_eq!(info.fingerprint(), shouted.fingerprint());
    }
}
