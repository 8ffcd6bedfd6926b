// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyward - a zero-knowledge secret vault.
//!
//! This is the binary entry point. Logs go to stderr through a redacting
//! writer; command output goes to stdout as JSON.

mod app;
mod audit;
mod output;
mod secret;
mod session;
mod vault;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, RwLock};

use clap::{Parser, Subcommand};
use keyward_config::KeywardConfig;
use keyward_core::{ErrorKind, KeywardError};
use keyward_security::RedactingWriter;

use crate::app::App;
use crate::secret::SecretCommand;
use crate::session::SessionCommand;

/// Keyward - a zero-knowledge secret vault.
#[derive(Parser, Debug)]
#[command(name = "keyward", version, about, long_about = None)]
struct Cli {
    /// Load configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a vault for a user.
    Init {
        #[arg(long)]
        user: String,
    },
    /// Check the master password against a user's vault.
    Unlock {
        #[arg(long)]
        user: String,
    },
    /// Change a user's master password.
    Passwd {
        #[arg(long)]
        user: String,
    },
    /// Manage secrets.
    #[command(subcommand)]
    Secret(SecretCommand),
    /// Manage sessions.
    #[command(subcommand)]
    Session(SessionCommand),
    /// Inspect the audit ledger.
    #[command(subcommand)]
    Audit(AuditCommand),
}

#[derive(Subcommand, Debug)]
enum AuditCommand {
    /// Verify entry signatures.
    Verify {
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => keyward_config::load_and_validate_path(path),
        None => keyward_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            keyward_config::render_errors(&errors);
            return ExitCode::from(2);
        }
    };

    let known_values = Arc::new(RwLock::new(Vec::new()));
    init_tracing(&config, Arc::clone(&known_values));

    match run(cli.command, config, known_values).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("keyward: {e}");
            ExitCode::from(exit_code(&e))
        }
    }
}

async fn run(
    command: Commands,
    config: KeywardConfig,
    known_values: Arc<RwLock<Vec<String>>>,
) -> Result<(), KeywardError> {
    let app = App::open(config, known_values).await?;
    let result = dispatch(&app, command).await;
    // Shutdown flushes pending audit writes even when the command failed.
    let closed = app.shutdown().await;
    result.and(closed)
}

async fn dispatch(app: &App, command: Commands) -> Result<(), KeywardError> {
    match command {
        Commands::Init { user } => vault::run_init(app, &user).await,
        Commands::Unlock { user } => vault::run_unlock(app, &user).await,
        Commands::Passwd { user } => vault::run_passwd(app, &user).await,
        Commands::Secret(command) => secret::run_secret(app, command).await,
        Commands::Session(command) => session::run_session(app, command).await,
        Commands::Audit(AuditCommand::Verify { user, limit }) => {
            audit::run_verify(app, user.as_deref(), limit).await
        }
    }
}

fn exit_code(err: &KeywardError) -> u8 {
    match err.kind() {
        ErrorKind::Internal => 1,
        ErrorKind::Validation => 2,
        ErrorKind::Authentication => 3,
        ErrorKind::Authorization => 4,
        ErrorKind::SecurityViolation => 5,
        ErrorKind::RateLimited => 6,
        ErrorKind::Integrity => 7,
    }
}

/// Initializes the tracing subscriber with the configured log level.
///
/// Every formatted line passes through [`RedactingWriter`] before it
/// reaches stderr.
fn init_tracing(config: &KeywardConfig, known_values: Arc<RwLock<Vec<String>>>) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("keyward={},warn", config.log.level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(move || RedactingWriter::new(std::io::stderr(), Arc::clone(&known_values)))
        .init();
}
