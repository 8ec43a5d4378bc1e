//! hwb - HelloWorld Bank in your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{balance, doctor, history, logs, register, reset_password, status, transfer, whoami};

/// HelloWorld Bank - accounts, transfers and password recovery
#[derive(Parser)]
#[command(name = "hwb", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a new account
    Register(register::RegisterArgs),

    /// Show the username and account number of a user
    Whoami {
        /// Username to log in as
        username: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the current balance
    Balance {
        /// Username to log in as
        username: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Send money to another account
    Transfer {
        /// Username to log in as
        username: String,
        /// Destination account number
        #[arg(long)]
        to: String,
        /// Amount to send
        #[arg(long, allow_negative_numbers = true)]
        amount: i64,
        /// Skip confirmation prompt
        #[arg(long, short)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List transfers, newest first
    History {
        /// Username to log in as
        username: String,
        /// Output as JSON
        #[arg(long, conflicts_with = "csv")]
        json: bool,
        /// Output as CSV
        #[arg(long)]
        csv: bool,
    },

    /// Reset a forgotten password with a one-time code sent by email
    ResetPassword {
        /// Email address of the account
        #[arg(long)]
        email: Option<String>,
    },

    /// Show bank-wide totals
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run ledger integrity checks
    Doctor {
        /// Show verbose output
        #[arg(long, short)]
        verbose: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// View and manage the event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Register(args) => register::run(args),
        Commands::Whoami { username, json } => whoami::run(&username, json),
        Commands::Balance { username, json } => balance::run(&username, json),
        Commands::Transfer { username, to, amount, yes, json } => {
            transfer::run(&username, &to, amount, yes, json)
        }
        Commands::History { username, json, csv } => history::run(&username, json, csv),
        Commands::ResetPassword { email } => reset_password::run(email),
        Commands::Status { json } => status::run(json),
        Commands::Doctor { verbose, json } => doctor::run(verbose, json),
        Commands::Logs { command } => logs::run(command),
    }
}
