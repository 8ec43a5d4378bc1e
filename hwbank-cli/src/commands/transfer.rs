//! Transfer command - send money to another account

use anyhow::Result;
use dialoguer::Confirm;

use hwbank_core::{OperationResult, TransferRequest};

use super::{get_context, read_password, user_error, CliSession};
use crate::output;

pub fn run(username: &str, to: &str, amount: i64, yes: bool, json: bool) -> Result<()> {
    let ctx = get_context("transfer")?;
    let password = read_password("Password")?;
    let session = CliSession::login_with_password(&ctx, username, &password)?;

    if !yes && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Send {} to account {}?",
                output::format_amount(amount),
                to
            ))
            .default(false)
            .interact()?;
        if !confirmed {
            output::warning("Transfer cancelled.");
            return Ok(());
        }
    }

    let result = ctx.transfer_service.transfer(
        &session.principal,
        &TransferRequest {
            destination: to.to_string(),
            amount,
            password,
        },
    );

    if json {
        let envelope = OperationResult::from(result);
        println!("{}", serde_json::to_string_pretty(&envelope)?);
        return Ok(());
    }

    let receipt = result.map_err(user_error)?;
    output::success("Transfer successful");
    println!("  Reference:   {}", receipt.record.id);
    println!("  New balance: {}", output::format_amount(receipt.new_balance));
    Ok(())
}
