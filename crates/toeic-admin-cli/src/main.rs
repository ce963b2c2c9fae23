//! toeic-admin - command-line front end for the TOEIC admin backend.
//!
//! Keeps a persisted admin session between runs and issues authenticated
//! requests through the same refresh-on-401 path the web console uses.

mod commands;
mod navigator;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use toeic_admin_core::auth::{MemorySessionStore, SessionStore};
use toeic_admin_core::{ApiClient, AuthApi, AuthService, Config, SessionManager};

use commands::Context as CommandContext;
use navigator::CliNavigator;

/// Administer a TOEIC practice backend from the terminal
#[derive(Parser, Debug)]
#[command(name = "toeic-admin", author, version, about)]
struct Cli {
    /// Backend base URL (overrides the config file and TOEIC_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Keep the session in memory only; nothing is read from or written to disk
    #[arg(long, global = true)]
    ephemeral: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and store the session
    Login {
        /// Username (defaults to TOEIC_USERNAME or the last one used)
        #[arg(short, long)]
        username: Option<String>,
    },

    /// End the session here and on the backend
    Logout,

    /// Show the stored session
    Whoami,

    /// Ask the backend whether the session is still accepted
    Status,

    /// Exchange the current token for a fresh one
    Refresh,

    /// GET an API path with the session's credentials and print the JSON
    Get {
        /// Path below the API base, e.g. /exams
        path: String,
    },

    /// Create a new account
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        full_name: String,
    },

    /// Request a password-reset email
    ForgotPassword {
        email: String,
    },

    /// Set a new password with a reset token
    ResetPassword {
        token: String,
    },
}

impl Command {
    /// Route name reported to the session manager while the command runs.
    fn route(&self) -> &'static str {
        match self {
            Command::Login { .. } => "/login",
            Command::Logout => "/logout",
            Command::Whoami => "/whoami",
            Command::Status => "/status",
            Command::Refresh => "/refresh",
            Command::Get { .. } => "/admin",
            Command::Register { .. } => "/register",
            Command::ForgotPassword { .. } => "/forgot-password",
            Command::ResetPassword { .. } => "/reset-password",
        }
    }
}

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr; with `--log-file` they are also appended to that file.
/// The returned guard must live until exit so buffered lines get flushed.
fn init_tracing(log_file: Option<&PathBuf>) -> Result<Option<WorkerGuard>> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let name = path
                .file_name()
                .with_context(|| format!("Invalid log file path {}", path.display()))?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_file.as_ref())?;
    info!("toeic-admin starting");

    let mut config = Config::load()?;
    config.apply_env_overrides();
    if let Some(url) = cli.api_url.clone() {
        config.api_url = Some(url);
    }

    let store: Arc<dyn SessionStore> = if cli.ephemeral {
        Arc::new(MemorySessionStore::new())
    } else {
        config.session_store()?
    };

    let api_url = config.api_url();
    debug!(api_url = %api_url, backend = ?config.session_backend, "Configuration loaded");

    let http = ApiClient::http_client(config.request_timeout())?;
    let auth_api = AuthApi::new(http.clone(), api_url.clone());
    let navigator = Arc::new(CliNavigator::new(cli.command.route()));
    let sessions = Arc::new(
        SessionManager::new(store, Arc::new(auth_api.clone())).with_navigator(navigator),
    );
    sessions.initialize().await;

    let ctx = CommandContext {
        auth: AuthService::new(auth_api, sessions.clone()),
        api: ApiClient::new(http, api_url, sessions),
        config,
    };

    let result = match cli.command {
        Command::Login { username } => commands::login(ctx, username).await,
        Command::Logout => commands::logout(&ctx).await,
        Command::Whoami => commands::whoami(&ctx).await,
        Command::Status => commands::status(&ctx).await,
        Command::Refresh => commands::refresh(&ctx).await,
        Command::Get { path } => commands::get(&ctx, &path).await,
        Command::Register {
            username,
            email,
            full_name,
        } => commands::register(&ctx, username, email, full_name).await,
        Command::ForgotPassword { email } => commands::forgot_password(&ctx, &email).await,
        Command::ResetPassword { token } => commands::reset_password(&ctx, &token).await,
    };

    info!("toeic-admin shutting down");
    result
}
