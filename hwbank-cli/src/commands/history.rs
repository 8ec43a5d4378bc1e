//! History command - list transfers for the logged-in account

use anyhow::Result;
use colored::Colorize;
use comfy_table::{Cell, Color};
use serde::Serialize;

use hwbank_core::{Direction, HistoryEntry};

use super::{get_context, user_error, CliSession};
use crate::output;

/// Flat row for CSV export
#[derive(Serialize)]
struct CsvRow<'a> {
    timestamp: String,
    direction: &'a str,
    counterparty: &'a str,
    counterparty_account: &'a str,
    amount: i64,
    transaction_id: String,
}

fn write_csv(entries: &[HistoryEntry]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(std::io::stdout());
    for entry in entries {
        writer.serialize(CsvRow {
            timestamp: entry.timestamp.to_rfc3339(),
            direction: entry.direction.as_str(),
            counterparty: entry.counterparty.as_deref().unwrap_or(""),
            counterparty_account: entry.counterparty_account.as_str(),
            amount: entry.amount,
            transaction_id: entry.transaction_id.to_string(),
        })?;
    }
    writer.flush()?;
    Ok(())
}

pub fn run(username: &str, json: bool, csv: bool) -> Result<()> {
    let ctx = get_context("history")?;
    let session = CliSession::login(&ctx, username)?;
    let entries = ctx
        .ledger_service
        .history(&session.principal)
        .map_err(user_error)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if csv {
        return write_csv(&entries);
    }

    if entries.is_empty() {
        println!("No transactions yet.");
        return Ok(());
    }

    println!("{}", "Transaction History".bold());
    let mut table = output::create_table();
    table.set_header(vec!["Date", "Type", "Counterparty", "Account", "Amount"]);

    for entry in &entries {
        let (label, amount_cell) = match entry.direction {
            Direction::Sent => (
                "Sent",
                Cell::new(format!("-{}", output::format_amount(entry.amount))).fg(Color::Red),
            ),
            Direction::Received => (
                "Received",
                Cell::new(format!("+{}", output::format_amount(entry.amount))).fg(Color::Green),
            ),
        };
        table.add_row(vec![
            Cell::new(entry.timestamp.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(label),
            Cell::new(entry.counterparty_display()),
            Cell::new(entry.counterparty_account.as_str()),
            amount_cell,
        ]);
    }

    println!("{}", table);
    Ok(())
}
