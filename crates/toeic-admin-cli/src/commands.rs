//! Subcommand handlers.

use std::io::{self, BufRead, Write};

use anyhow::{anyhow, bail, Result};
use serde_json::Value;
use tracing::warn;

use toeic_admin_core::config::{ENV_PASSWORD, ENV_USERNAME};
use toeic_admin_core::models::RegisterRequest;
use toeic_admin_core::{ApiClient, ApiError, AuthService, Config, Session};

/// Everything a command needs, wired up in `main`.
pub struct Context {
    pub auth: AuthService,
    pub api: ApiClient,
    pub config: Config,
}

pub async fn login(mut ctx: Context, username: Option<String>) -> Result<()> {
    let username = match username
        .or_else(|| std::env::var(ENV_USERNAME).ok())
        .or_else(|| ctx.config.last_username.clone())
    {
        Some(name) => name,
        None => prompt_line("Username: ")?,
    };
    let password = read_password("Password: ")?;

    let session = ctx.auth.login(&username, &password).await.map_err(|e| match e {
        ApiError::Unauthorized => anyhow!("Invalid username or password"),
        other => anyhow!(other),
    })?;

    ctx.config.last_username = Some(session.username.clone());
    if let Err(e) = ctx.config.save() {
        warn!(error = %e, "Failed to save config");
    }

    println!("Logged in as {}", session.display_name());
    if !session.has_admin_capability() {
        println!("Note: this account has no admin role; admin pages will be refused.");
    }
    Ok(())
}

pub async fn logout(ctx: &Context) -> Result<()> {
    if !ctx.auth.sessions().is_authenticated().await {
        println!("Not logged in");
        return Ok(());
    }
    ctx.auth.logout().await?;
    println!("Logged out");
    Ok(())
}

pub async fn whoami(ctx: &Context) -> Result<()> {
    match ctx.auth.sessions().active_session().await {
        Some(session) => {
            print_session(&session);
            Ok(())
        }
        None => bail!("Not logged in"),
    }
}

fn print_session(session: &Session) {
    println!("User:     {} (id {})", session.display_name(), session.user_id);
    if !session.username.is_empty() {
        println!("Username: {}", session.username);
    }
    if !session.email.is_empty() {
        println!("Email:    {}", session.email);
    }
    let roles = session
        .roles
        .clone()
        .or_else(|| session.role.clone().map(|r| vec![r]))
        .unwrap_or_default();
    println!("Roles:    {}", roles.join(", "));
    println!("Admin:    {}", if session.has_admin_capability() { "yes" } else { "no" });
    if let Some(checked) = session.last_refreshed_at {
        println!("Checked:  {}", checked.to_rfc3339());
    }
}

pub async fn status(ctx: &Context) -> Result<()> {
    if ctx.auth.check_auth_status().await {
        let name = ctx
            .auth
            .sessions()
            .active_session()
            .await
            .map(|s| s.display_name().to_string())
            .unwrap_or_default();
        println!("Authenticated as {}", name);
        Ok(())
    } else if ctx.auth.sessions().is_authenticated().await {
        bail!("Could not confirm the session with the backend")
    } else {
        bail!("Not authenticated")
    }
}

pub async fn refresh(ctx: &Context) -> Result<()> {
    let sessions = ctx.auth.sessions();
    if !sessions.is_authenticated().await {
        bail!("Not logged in");
    }
    if sessions.refresh_token().await {
        println!("Token refreshed");
        Ok(())
    } else {
        bail!("Token refresh was rejected; log in again")
    }
}

pub async fn get(ctx: &Context, path: &str) -> Result<()> {
    let value: Value = ctx.api.get(path).await?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

pub async fn register(ctx: &Context, username: String, email: String, full_name: String) -> Result<()> {
    let password = read_password("Password: ")?;
    let confirm = read_password("Confirm password: ")?;
    if password != confirm {
        bail!("Passwords do not match");
    }

    let request = RegisterRequest {
        username,
        email,
        full_name,
        password,
    };
    let response = ctx.auth.register(&request).await?;
    println!("{}", non_empty(&response.message, "Account created"));
    println!("Run `toeic-admin login` to sign in.");
    Ok(())
}

pub async fn forgot_password(ctx: &Context, email: &str) -> Result<()> {
    let response = ctx.auth.forgot_password(email).await?;
    println!("{}", non_empty(&response.message, "Reset instructions sent"));
    Ok(())
}

pub async fn reset_password(ctx: &Context, token: &str) -> Result<()> {
    if !ctx.auth.validate_reset_token(token).await? {
        bail!("Reset token is invalid or has expired");
    }
    let password = read_password("New password: ")?;
    let confirm = read_password("Confirm new password: ")?;
    if password != confirm {
        bail!("Passwords do not match");
    }

    let response = ctx.auth.reset_password(token, &password).await?;
    println!("{}", non_empty(&response.message, "Password updated"));
    Ok(())
}

fn non_empty<'a>(message: &'a str, fallback: &'a str) -> &'a str {
    if message.trim().is_empty() {
        fallback
    } else {
        message
    }
}

/// Password from `TOEIC_PASSWORD`, otherwise an echo-less prompt.
fn read_password(prompt: &str) -> Result<String> {
    if let Ok(password) = std::env::var(ENV_PASSWORD) {
        return Ok(password);
    }
    Ok(rpassword::prompt_password(prompt)?)
}

fn prompt_line(prompt: &str) -> Result<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{}", prompt)?;
    stdout.flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let line = line.trim().to_string();
    if line.is_empty() {
        bail!("No username given");
    }
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty_falls_back() {
        assert_eq!(non_empty("  ", "Password updated"), "Password updated");
        assert_eq!(non_empty("Mat khau da doi", "Password updated"), "Mat khau da doi");
    }
}
