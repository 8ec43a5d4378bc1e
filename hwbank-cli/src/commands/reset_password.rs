//! Reset-password command - interactive OTP recovery flow

use anyhow::Result;
use dialoguer::{Input, Password};

use hwbank_core::OtpVerification;

use super::{get_context, user_error};
use crate::output;

pub fn run(email: Option<String>) -> Result<()> {
    let ctx = get_context("reset_password")?;
    let reset = &ctx.password_reset_service;
    let session = ctx.auth_service.open_session().map_err(user_error)?;

    let email = match email {
        Some(e) => e,
        None => Input::new().with_prompt("Email").interact_text()?,
    };

    let issued = reset.request_otp(&session, &email).map_err(user_error)?;
    output::info(&format!(
        "A one-time password has been sent to {}. It expires at {}.",
        email,
        issued.expires_at.format("%H:%M:%S UTC")
    ));

    loop {
        let code: String = Input::new().with_prompt("OTP").interact_text()?;
        match reset.verify_otp(&session, &code).map_err(user_error)? {
            OtpVerification::Verified { .. } => break,
            OtpVerification::Incorrect { remaining_attempts } => {
                output::warning(&format!(
                    "Incorrect OTP. Please try again. ({} attempt(s) left)",
                    remaining_attempts
                ));
            }
            other => {
                if let Err(e) = other.into_result() {
                    let _ = ctx.auth_service.logout(&session);
                    return Err(user_error(e.into()));
                }
                break;
            }
        }
    }

    let new_password = Password::new()
        .with_prompt("New password")
        .with_confirmation("Confirm new password", "Passwords do not match")
        .interact()?;
    let result = reset.reset_password(&session, &new_password, &new_password);
    let _ = ctx.auth_service.logout(&session);
    result.map_err(user_error)?;

    output::success("Password has been reset. You can now log in with the new password.");
    Ok(())
}
