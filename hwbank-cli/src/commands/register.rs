//! Register command - open a new account

use anyhow::Result;
use colored::Colorize;
use dialoguer::{Confirm, Input, Password};

use hwbank_core::{AccountProfile, OperationResult, RegistrationRequest};

use super::{get_context, user_error};
use crate::output;

#[derive(clap::Args)]
pub struct RegisterArgs {
    /// Username (prompted if omitted)
    #[arg(long)]
    pub username: Option<String>,
    /// Email address used for password recovery
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub full_name: Option<String>,
    /// National identity number
    #[arg(long)]
    pub national_id: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
    /// Date of birth (YYYY-MM-DD)
    #[arg(long)]
    pub date_of_birth: Option<String>,
    #[arg(long)]
    pub gender: Option<String>,
    /// Accept the terms and conditions without prompting
    #[arg(long)]
    pub accept_terms: bool,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

fn field(value: Option<String>, prompt: &str, required: bool) -> Result<String> {
    match value {
        Some(v) => Ok(v),
        None => Ok(Input::new()
            .with_prompt(prompt)
            .allow_empty(!required)
            .interact_text()?),
    }
}

pub fn run(args: RegisterArgs) -> Result<()> {
    let ctx = get_context("register")?;

    let username = field(args.username, "Username", true)?;
    let profile = AccountProfile {
        full_name: field(args.full_name, "Full name", false)?,
        national_id: field(args.national_id, "National ID", false)?,
        phone: field(args.phone, "Phone", false)?,
        email: field(args.email, "Email", true)?,
        date_of_birth: field(args.date_of_birth, "Date of birth (YYYY-MM-DD)", false)?,
        gender: field(args.gender, "Gender", false)?,
    };

    let (password, confirm_password) = match std::env::var("HWBANK_PASSWORD") {
        Ok(p) => (p.clone(), p),
        Err(_) => {
            let password = Password::new().with_prompt("Password").interact()?;
            let confirm = Password::new().with_prompt("Confirm password").interact()?;
            (password, confirm)
        }
    };

    let terms_accepted = args.accept_terms
        || Confirm::new()
            .with_prompt("Do you accept the terms and conditions?")
            .default(false)
            .interact()?;

    let request = RegistrationRequest {
        profile,
        username,
        password,
        confirm_password,
        terms_accepted,
    };
    let result = ctx.account_service.register(&request);

    if args.json {
        let envelope = OperationResult::from(result.map(|account| {
            serde_json::json!({
                "username": account.username,
                "accountNumber": account.account_number,
                "balance": account.balance,
            })
        }));
        println!("{}", serde_json::to_string_pretty(&envelope)?);
        return Ok(());
    }

    let account = result.map_err(user_error)?;
    output::success("Registration successful");
    println!("  Username:       {}", account.username.bold());
    println!("  Account number: {}", account.account_number.to_string().bold());
    println!("  Balance:        {}", output::format_amount(account.balance));
    Ok(())
}
