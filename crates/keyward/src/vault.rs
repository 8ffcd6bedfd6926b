// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `keyward init`, `keyward unlock` and `keyward passwd`.

use keyward_core::KeywardError;
use keyward_vault::{
    UnlockOutcome, read_changed_master_password, read_master_password, read_new_master_password,
};
use serde_json::json;

use crate::app::App;
use crate::output::print_json;

pub async fn run_init(app: &App, user_id: &str) -> Result<(), KeywardError> {
    let password = read_new_master_password()?;
    app.signup(user_id, &password).await?;
    print_json(&json!({ "userId": user_id, "initialized": true }))
}

pub async fn run_unlock(app: &App, user_id: &str) -> Result<(), KeywardError> {
    let password = read_master_password()?;
    let outcome = app.unlock(user_id, &password).await?;
    print_json(&json!({
        "userId": user_id,
        "unlocked": outcome == UnlockOutcome::Unlocked,
    }))
}

pub async fn run_passwd(app: &App, user_id: &str) -> Result<(), KeywardError> {
    let current = read_master_password()?;
    let new_password = read_changed_master_password()?;
    app.change_password(user_id, &current, &new_password).await?;
    print_json(&json!({ "userId": user_id, "passwordChanged": true }))
}
