// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session credential management for Keyward.
//!
//! Short-lived Ed25519-signed access tokens, rotating single-use refresh
//! tokens bound to stored sessions, and the cookie wire contract that
//! carries them.

pub mod cookies;
pub mod device;
pub mod keypair;
pub mod session;
pub mod token;

pub use cookies::{RefreshCookies, RefreshResponse};
pub use device::DeviceInfo;
pub use keypair::TokenKeypair;
pub use session::{IssuedCredentials, Revocation, SessionManager, hash_refresh_token};
pub use token::{AccessClaims, AccessTokenSigner};
