//! CLI command implementations

pub mod balance;
pub mod doctor;
pub mod history;
pub mod logs;
pub mod register;
pub mod reset_password;
pub mod status;
pub mod transfer;
pub mod whoami;

use std::path::PathBuf;

use anyhow::{Context, Result};
use dialoguer::Password;
use hwbank_core::services::{EntryPoint, LogEvent};
use hwbank_core::{BankContext, Principal, SessionId};

/// Get the bank directory from environment or default
pub fn get_bank_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("HWBANK_DIR") {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().context("Could not find home directory")?;
    Ok(home.join(".hwbank"))
}

/// Open the bank context for a CLI command
pub fn get_context(command: &str) -> Result<BankContext> {
    let bank_dir = get_bank_dir()?;
    let ctx = BankContext::new(&bank_dir, EntryPoint::Cli)
        .with_context(|| format!("Failed to open bank at {}", bank_dir.display()))?;
    ctx.logger
        .record(LogEvent::new("command_executed").with_operation(command));
    Ok(ctx)
}

/// Read a password from `HWBANK_PASSWORD` or prompt for it
pub fn read_password(prompt: &str) -> Result<String> {
    if let Ok(password) = std::env::var("HWBANK_PASSWORD") {
        return Ok(password);
    }
    Ok(Password::new().with_prompt(prompt).interact()?)
}

/// Log in for the duration of one command
pub struct CliSession<'a> {
    ctx: &'a BankContext,
    pub id: SessionId,
    pub principal: Principal,
}

impl<'a> CliSession<'a> {
    pub fn login(ctx: &'a BankContext, username: &str) -> Result<Self> {
        let password = read_password("Password")?;
        Self::login_with_password(ctx, username, &password)
    }

    pub fn login_with_password(ctx: &'a BankContext, username: &str, password: &str) -> Result<Self> {
        let id = ctx.auth_service.open_session().map_err(user_error)?;
        let principal = ctx
            .auth_service
            .login(&id, username, password)
            .map_err(user_error)?;
        Ok(Self { ctx, id, principal })
    }
}

impl Drop for CliSession<'_> {
    fn drop(&mut self) {
        let _ = self.ctx.auth_service.logout(&self.id);
    }
}

/// Turn a core error into a CLI error carrying only the safe message
pub fn user_error(e: hwbank_core::Error) -> anyhow::Error {
    anyhow::anyhow!(e.public_message())
}
