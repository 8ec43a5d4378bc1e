//! Status command - show bank-wide summary

use anyhow::Result;
use colored::Colorize;
use comfy_table::{ContentArrangement, Table};

use super::get_context;
use crate::output;

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context("status")?;
    let status = ctx.status_service.get_status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", "Bank Status".bold());
    println!();

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.add_row(vec!["Accounts".to_string(), status.total_accounts.to_string()]);
    table.add_row(vec!["Transfers".to_string(), status.total_transfers.to_string()]);
    table.add_row(vec!["Total money held".to_string(), output::format_amount(status.total_money)]);

    println!("{}", table);
    Ok(())
}
