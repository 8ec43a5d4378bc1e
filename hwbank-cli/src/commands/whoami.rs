//! Whoami command - show the logged-in user's identity

use anyhow::Result;

use super::{get_context, user_error, CliSession};

pub fn run(username: &str, json: bool) -> Result<()> {
    let ctx = get_context("whoami")?;
    let session = CliSession::login(&ctx, username)?;
    let user = ctx
        .account_service
        .current_user(&session.principal)
        .map_err(user_error)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&user)?);
    } else {
        println!("{} ({})", user.username, user.account_number);
    }
    Ok(())
}
