//! Doctor command - run ledger integrity checks

use anyhow::Result;
use colored::Colorize;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use serde_json::Value;

use super::get_context;

/// Format a detail JSON value as "key: value, key: value"
fn format_detail(value: &Value) -> String {
    match value {
        Value::Object(map) => map
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| match v {
                Value::String(s) => format!("{}: {}", k, s),
                _ => format!("{}: {}", k, v),
            })
            .collect::<Vec<_>>()
            .join(", "),
        Value::String(s) => s.clone(),
        _ => value.to_string(),
    }
}

pub fn run(verbose: bool, json: bool) -> Result<()> {
    let ctx = get_context("doctor")?;
    let result = ctx.doctor_service.run_checks()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("{}", "Ledger Integrity Check".bold());
    println!();

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Check", "Status", "Message"]);

    let mut names: Vec<&String> = result.checks.keys().collect();
    names.sort();
    for check_name in names {
        let check_result = &result.checks[check_name];
        let status_cell = match check_result.status.as_str() {
            "pass" => Cell::new("PASS").fg(Color::Green),
            "warning" => Cell::new("WARN").fg(Color::Yellow),
            "error" => Cell::new("ERROR").fg(Color::Red),
            _ => Cell::new(&check_result.status),
        };

        table.add_row(vec![
            Cell::new(check_name),
            status_cell,
            Cell::new(&check_result.message),
        ]);

        if verbose {
            for detail in check_result.details.iter().flatten() {
                table.add_row(vec![
                    Cell::new(""),
                    Cell::new(""),
                    Cell::new(format!("  - {}", format_detail(detail))),
                ]);
            }
        }
    }

    println!("{}", table);
    println!();

    println!(
        "Summary: {} passed, {} warnings, {} errors",
        result.summary.passed.to_string().green(),
        result.summary.warnings.to_string().yellow(),
        result.summary.errors.to_string().red(),
    );

    if result.summary.errors > 0 {
        std::process::exit(1);
    }

    Ok(())
}
