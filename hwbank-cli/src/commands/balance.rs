//! Balance command - show the current balance

use anyhow::Result;
use colored::Colorize;

use super::{get_context, user_error, CliSession};
use crate::output;

pub fn run(username: &str, json: bool) -> Result<()> {
    let ctx = get_context("balance")?;
    let session = CliSession::login(&ctx, username)?;
    let view = ctx
        .account_service
        .balance(&session.principal)
        .map_err(user_error)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!("{}", view.username.bold());
    println!("Balance: {}", output::format_amount(view.balance).green());
    Ok(())
}
